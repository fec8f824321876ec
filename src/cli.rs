// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::default_plan_path;
use crate::types::OutputFormat;

/// Command-line arguments for `wavedag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wavedag",
    version,
    about = "Run a dependency graph of role-assigned tasks in bounded concurrent waves.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the plan file (TOML).
    #[arg(long, value_name = "PATH", default_value_os_t = default_plan_path())]
    pub plan: PathBuf,

    /// Maximum number of tasks running at once. Overrides `[config].concurrency`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub concurrency: Option<u32>,

    /// Report tasks running longer than this (e.g. "30m", "24h").
    #[arg(long, value_name = "DURATION")]
    pub stall_threshold: Option<String>,

    /// Allowed difference in active tasks between the busiest and idlest role.
    #[arg(long, value_name = "N")]
    pub imbalance_margin: Option<usize>,

    /// Validate the plan and print the waves it would run in, without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Format of the final report.
    #[arg(long, value_enum, value_name = "FORMAT", default_value = "text")]
    pub output: OutputFormat,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WAVEDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
