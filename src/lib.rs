// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod tracker;
pub mod types;

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{PlanFile, PlanSettings, load_and_validate, parse_duration};
use crate::dag::{StructuralError, TaskGraph};
use crate::engine::{CancelFlag, RunReport, Scheduler, preview_waves};
use crate::errors::WavedagError;
use crate::exec::{RoleRouter, SimulatedRunner, TaskRunner};
use crate::fs::RealFileSystem;
use crate::types::{OutputFormat, TaskState};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - plan loading and CLI overrides
/// - graph validation
/// - role routing (commands, simulated fallback)
/// - the wave scheduler
/// - Ctrl-C handling
///
/// Returns `Ok(true)` when every task completed.
pub async fn run(args: CliArgs) -> Result<bool> {
    let plan_path = &args.plan;
    let plan = load_and_validate(&RealFileSystem, plan_path)
        .with_context(|| format!("loading plan {}", plan_path.display()))?;
    let settings = apply_overrides(plan.settings(), &args)?;

    let graph = match TaskGraph::build(plan.task_specs()) {
        Ok(graph) => graph,
        Err(WavedagError::Structural(errors)) => {
            print_structural_errors(&errors, args.output)?;
            return Ok(false);
        }
        Err(err) => return Err(err.into()),
    };

    if args.dry_run {
        print!("{}", render_dry_run(&plan, &graph, &settings));
        debug!("dry-run complete (no execution)");
        return Ok(true);
    }

    let fallback: Arc<dyn TaskRunner> = Arc::new(SimulatedRunner::default());
    let router = RoleRouter::from_plan(&plan, settings.task_timeout, fallback);
    info!(
        command_roles = ?router.command_roles().collect::<Vec<_>>(),
        "roles without a command use the simulated runner"
    );

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("Ctrl+C received; finishing the current wave");
            cancel.cancel();
        });
    }

    let report = Scheduler::new(graph, Arc::new(router), settings.scheduler_options())
        .with_cancel_flag(cancel)
        .run()
        .await;

    match args.output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print!("{}", render_report(&report)),
    }

    Ok(report.is_success())
}

/// Apply CLI flags on top of the plan's `[config]` settings.
pub fn apply_overrides(mut settings: PlanSettings, args: &CliArgs) -> Result<PlanSettings> {
    if let Some(n) = args.concurrency {
        settings.concurrency = n as usize;
    }
    if let Some(ref s) = args.stall_threshold {
        settings.stall_threshold = parse_duration(s)
            .map_err(|e| anyhow::anyhow!("--stall-threshold: {e}"))?;
    }
    if let Some(margin) = args.imbalance_margin {
        settings.imbalance_margin = margin;
    }
    Ok(settings)
}

fn print_structural_errors(errors: &[StructuralError], output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => {
            let body = serde_json::json!({ "valid": false, "errors": errors });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            eprintln!("invalid task graph ({} problem(s)):", errors.len());
            for err in errors {
                eprintln!("  - {err}");
            }
        }
    }
    Ok(())
}

/// Plain-text dry-run listing: tasks, a topological order and the waves the
/// plan would run in if every task succeeded.
pub fn render_dry_run(plan: &PlanFile, graph: &TaskGraph, settings: &PlanSettings) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "wavedag dry-run");
    let _ = writeln!(out, "  concurrency = {}", settings.concurrency);
    let _ = writeln!(out, "  stall_threshold = {:?}", settings.stall_threshold);
    let _ = writeln!(out, "  imbalance_margin = {}", settings.imbalance_margin);
    if let Some(timeout) = settings.task_timeout {
        let _ = writeln!(out, "  task_timeout = {timeout:?}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "tasks ({}):", graph.len());
    for (task, (_, level)) in graph.tasks().iter().zip(graph.levels()) {
        let spec = &task.spec;
        let _ = writeln!(out, "  - {} ({})", spec.id, spec.title);
        let _ = writeln!(out, "      level: {level}");
        let runner = match plan.roles.get(&spec.role) {
            Some(role) => format!("cmd: {}", role.cmd),
            None => "simulated".to_string(),
        };
        let _ = writeln!(out, "      role: {} [{runner}]", spec.role);
        let _ = writeln!(out, "      effort: {}", spec.effort);
        if !spec.dependencies.is_empty() {
            let _ = writeln!(out, "      after: {}", spec.dependencies.join(", "));
        }
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "roots: {}", graph.roots().collect::<Vec<_>>().join(", "));
    let _ = writeln!(out, "topological order: {}", graph.topological_order().join(" -> "));
    let _ = writeln!(out, "waves:");
    for (i, wave) in preview_waves(graph, settings.concurrency).iter().enumerate() {
        let _ = writeln!(out, "  {}: {}", i + 1, wave.join(", "));
    }

    out
}

/// Plain-text summary of a finished run.
pub fn render_report(report: &RunReport) -> String {
    let snap = &report.snapshot;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "run {}: {} completed, {} failed, {} blocked, {} pending ({:.1}% complete)",
        report.run_id,
        snap.completed.len(),
        snap.failed.len(),
        snap.blocked.len(),
        snap.pending.len(),
        snap.completion_rate
    );
    if report.cancelled {
        let _ = writeln!(out, "run was cancelled before all waves were dispatched");
    }

    let _ = writeln!(out, "waves:");
    for (i, wave) in report.waves.iter().enumerate() {
        let _ = writeln!(out, "  {}: {}", i + 1, wave.join(", "));
    }

    let _ = writeln!(out, "tasks:");
    for task in &report.tasks {
        let duration = match (task.started_at, task.completed_at) {
            (Some(start), Some(end)) if task.state != TaskState::Blocked => {
                let secs = (end - start).num_milliseconds() as f64 / 1000.0;
                format!(" {secs:.1}s")
            }
            _ => String::new(),
        };
        let _ = write!(
            out,
            "  {} [{}] {}{}",
            task.id(),
            task.spec.role,
            task.state,
            duration
        );
        match &task.error {
            Some(error) => {
                let _ = writeln!(out, ": {error}");
            }
            None => {
                let _ = writeln!(out);
            }
        }
    }

    if !snap.roles.is_empty() {
        let _ = writeln!(out, "roles:");
        for (name, role) in &snap.roles {
            let avg = role
                .average_task_secs
                .map(|s| format!("{s:.1}s"))
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(
                out,
                "  {name}: {} completed, {} failed, avg {avg}",
                role.completed, role.failed
            );
        }
    }

    if !report.issues.is_empty() {
        let _ = writeln!(out, "issues:");
        for issue in &report.issues {
            let _ = writeln!(
                out,
                "  [{}] {} ({})",
                issue.severity, issue.message, issue.recommendation
            );
        }
    }

    out
}
