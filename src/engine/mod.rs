// src/engine/mod.rs

//! Scheduling engine for wavedag.
//!
//! The pure wave state machine lives in [`core`]; the async shell that feeds
//! waves to the executor and collects the final report is in [`scheduler`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::dag::Task;
use crate::tracker::{Issue, RunSnapshot, TrackerConfig};
use crate::types::TaskId;

pub mod core;
pub mod scheduler;

pub use self::core::{AppliedWave, SchedulerCore, WaveStep, preview_waves};
pub use self::scheduler::{Scheduler, run_id_for};

/// Outcome of executing one task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "lowercase")]
pub enum TaskOutcome {
    Success(serde_json::Value),
    Failure(String),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TaskOutcome::Success(_))
    }
}

/// Cooperative cancellation flag.
///
/// Checked by the scheduler before each wave; a wave that has already been
/// dispatched always runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options fixed for the duration of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Maximum number of tasks in progress at once (at least 1).
    pub concurrency: usize,
    pub tracker: TrackerConfig,
}

pub const DEFAULT_CONCURRENCY: usize = 3;

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            tracker: TrackerConfig::default(),
        }
    }
}

/// Everything a finished (or cancelled) run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub snapshot: RunSnapshot,
    pub issues: Vec<Issue>,
    /// Task ids dispatched in each wave, in dispatch order.
    pub waves: Vec<Vec<TaskId>>,
    pub cancelled: bool,
    /// Final state of every task, in declaration order.
    pub tasks: Vec<Task>,
}

impl RunReport {
    /// No task failed or was blocked and the run was not cancelled.
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.snapshot.is_success()
    }
}
