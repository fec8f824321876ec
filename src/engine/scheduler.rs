// src/engine/scheduler.rs

//! Async driver around [`SchedulerCore`].
//!
//! The core decides waves; this shell executes them through the
//! [`TaskRunner`], feeds the outcomes back and keeps the lifecycle tracker in
//! sync. It is the only place where scheduling and IO meet.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::dag::TaskGraph;
use crate::engine::core::{SchedulerCore, WaveStep};
use crate::engine::{CancelFlag, RunReport, SchedulerOptions};
use crate::exec::{TaskRunner, run_batch};
use crate::tracker::{Issue, LifecycleTracker, TrackerConfig, TrackerHandle, diagnose, merge_issues};

const MIN_ISSUE_POLL: Duration = Duration::from_millis(5);
const MAX_ISSUE_POLL: Duration = Duration::from_secs(1);

/// `workflow-YYYYmmdd-HHMMSS` for the given instant.
pub fn run_id_for(at: DateTime<Utc>) -> String {
    format!("workflow-{}", at.format("%Y%m%d-%H%M%S"))
}

pub struct Scheduler<R: TaskRunner + ?Sized + 'static> {
    core: SchedulerCore,
    runner: Arc<R>,
    tracker: TrackerHandle,
    options: SchedulerOptions,
    cancel: CancelFlag,
    run_id: String,
}

impl<R: TaskRunner + ?Sized + 'static> Scheduler<R> {
    pub fn new(graph: TaskGraph, runner: Arc<R>, options: SchedulerOptions) -> Self {
        let run_id = run_id_for(Utc::now());
        let tracker = new_tracker(&graph, &run_id, options.tracker);
        Self {
            core: SchedulerCore::new(graph, options.concurrency),
            runner,
            tracker,
            options,
            cancel: CancelFlag::new(),
            run_id,
        }
    }

    /// Rename the run. Handles obtained from [`tracker_handle`](Self::tracker_handle)
    /// stay attached and see the new id.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self.tracker.with(|t| t.set_run_id(self.run_id.clone()));
        self
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Handle for observing the run (snapshots, diagnostics) while it executes.
    pub fn tracker_handle(&self) -> TrackerHandle {
        self.tracker.clone()
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Run waves until every task is terminal, no progress is possible, or
    /// cancellation is requested.
    ///
    /// Never fails: task errors are recorded in the report.
    pub async fn run(mut self) -> RunReport {
        info!(
            run_id = %self.run_id,
            tasks = self.core.graph().len(),
            concurrency = self.core.concurrency(),
            "starting run"
        );

        let mut cancelled = false;
        let mut issues: Vec<Issue> = Vec::new();
        let poll_every = self
            .options
            .tracker
            .stall_threshold
            .clamp(MIN_ISSUE_POLL, MAX_ISSUE_POLL);

        loop {
            if self.cancel.is_cancelled() {
                warn!(
                    run_id = %self.run_id,
                    remaining = self.core.remaining().len(),
                    "cancellation requested; not dispatching further waves"
                );
                cancelled = true;
                break;
            }

            match self.core.next_step() {
                WaveStep::Dispatch { wave, tasks } => {
                    let batch =
                        run_batch(tasks, self.core.concurrency(), &self.runner, &self.tracker);
                    tokio::pin!(batch);

                    // Stall and imbalance only show while tasks are in flight.
                    let mut ticker = interval(poll_every);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    let results = loop {
                        tokio::select! {
                            results = &mut batch => break results,
                            _ = ticker.tick() => collect_issues(&self.tracker, &mut issues),
                        }
                    };
                    let applied = self.core.apply_outcomes(results);
                    info!(
                        run_id = %self.run_id,
                        wave,
                        completed = applied.completed.len(),
                        failed = applied.failed.len(),
                        remaining = self.core.remaining().len(),
                        "wave finished"
                    );
                }
                WaveStep::Stalled { unreachable } => {
                    warn!(
                        run_id = %self.run_id,
                        unreachable = ?unreachable,
                        "no task can become ready; blocking the rest"
                    );
                    let now = Utc::now();
                    for (id, reason) in self.core.block_remaining(now) {
                        self.tracker.on_blocked(&id, &reason, now);
                    }
                }
                WaveStep::Finished => break,
            }
        }

        let snapshot = self.tracker.snapshot();
        merge_issues(&mut issues, diagnose(&snapshot, &self.options.tracker));
        let waves = self.core.waves().to_vec();

        info!(
            run_id = %self.run_id,
            completed = snapshot.completed.len(),
            failed = snapshot.failed.len(),
            blocked = snapshot.blocked.len(),
            pending = snapshot.pending.len(),
            waves = waves.len(),
            cancelled,
            "run finished"
        );

        RunReport {
            run_id: self.run_id,
            snapshot,
            issues,
            waves,
            cancelled,
            tasks: self.core.into_tasks(),
        }
    }
}

fn collect_issues(tracker: &TrackerHandle, issues: &mut Vec<Issue>) {
    let fresh = tracker.check_for_issues();
    if !fresh.is_empty() {
        debug!(count = fresh.len(), "diagnostics raised during wave");
        merge_issues(issues, fresh);
    }
}

fn new_tracker(graph: &TaskGraph, run_id: &str, config: TrackerConfig) -> TrackerHandle {
    let mut tracker = LifecycleTracker::new(run_id, config);
    let now = Utc::now();
    for task in graph.tasks() {
        tracker.register(&task.spec, now);
    }
    TrackerHandle::new(tracker)
}
