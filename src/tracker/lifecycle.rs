// src/tracker/lifecycle.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::dag::TaskSpec;
use crate::engine::TaskOutcome;
use crate::tracker::TrackerConfig;
use crate::tracker::diagnostics::{Issue, diagnose};
use crate::tracker::snapshot::{RoleSummary, RunSnapshot, TaskSummary};
use crate::tracker::stats::WorkerRoleStats;
use crate::types::{RoleName, TaskId, TaskState};

/// One recorded state change of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub state: TaskState,
    pub at: DateTime<Utc>,
}

/// A progress message reported by a running task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub at: DateTime<Utc>,
    pub percentage: Option<u8>,
    pub message: String,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    id: TaskId,
    title: String,
    role: RoleName,
    effort: String,
    state: TaskState,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    elapsed: Option<Duration>,
    error: Option<String>,
    completion_percentage: Option<u8>,
    transitions: Vec<Transition>,
    progress: Vec<ProgressUpdate>,
}

impl TaskRecord {
    fn transition(&mut self, state: TaskState, at: DateTime<Utc>) {
        self.state = state;
        self.transitions.push(Transition { state, at });
    }

    fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            role: self.role.clone(),
            effort: self.effort.clone(),
            state: self.state,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_secs: self.elapsed.map(|d| d.as_secs_f64()),
            completion_percentage: self.completion_percentage,
            error: self.error.clone(),
        }
    }
}

/// Records task transitions and per-role statistics for one run.
///
/// The tracker only observes: its diagnostics never feed back into
/// scheduling decisions.
#[derive(Debug)]
pub struct LifecycleTracker {
    config: TrackerConfig,
    run_id: String,
    /// Task ids in registration (declaration) order.
    order: Vec<TaskId>,
    records: HashMap<TaskId, TaskRecord>,
    roles: BTreeMap<RoleName, WorkerRoleStats>,
}

impl LifecycleTracker {
    pub fn new(run_id: impl Into<String>, config: TrackerConfig) -> Self {
        Self {
            config,
            run_id: run_id.into(),
            order: Vec::new(),
            records: HashMap::new(),
            roles: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn set_run_id(&mut self, run_id: impl Into<String>) {
        self.run_id = run_id.into();
    }

    /// Add a task to the run in the `Pending` state.
    pub fn register(&mut self, spec: &TaskSpec, at: DateTime<Utc>) {
        if self.records.contains_key(&spec.id) {
            warn!(task = %spec.id, "task registered twice; ignoring");
            return;
        }

        self.order.push(spec.id.clone());
        self.records.insert(
            spec.id.clone(),
            TaskRecord {
                id: spec.id.clone(),
                title: spec.title.clone(),
                role: spec.role.clone(),
                effort: spec.effort.clone(),
                state: TaskState::Pending,
                started_at: None,
                completed_at: None,
                elapsed: None,
                error: None,
                completion_percentage: None,
                transitions: vec![Transition {
                    state: TaskState::Pending,
                    at,
                }],
                progress: Vec::new(),
            },
        );
    }

    pub fn on_start(&mut self, task_id: &str, role: &str, at: DateTime<Utc>) {
        let Some(record) = self.records.get_mut(task_id) else {
            warn!(task = %task_id, "start reported for unknown task; ignoring");
            return;
        };

        record.role = role.to_string();
        record.started_at = Some(at);
        record.transition(TaskState::InProgress, at);
        self.roles.entry(role.to_string()).or_default().record_start();

        debug!(task = %task_id, role = %role, "task started");
    }

    pub fn on_complete(
        &mut self,
        task_id: &str,
        outcome: &TaskOutcome,
        at: DateTime<Utc>,
        elapsed: Duration,
    ) {
        let Some(record) = self.records.get_mut(task_id) else {
            warn!(task = %task_id, "completion reported for unknown task; ignoring");
            return;
        };
        if record.state != TaskState::InProgress {
            warn!(
                task = %task_id,
                state = %record.state,
                "completion reported for task that is not in progress; ignoring"
            );
            return;
        }

        record.completed_at = Some(at);
        record.elapsed = Some(elapsed);
        let stats = self.roles.entry(record.role.clone()).or_default();

        match outcome {
            TaskOutcome::Success(_) => {
                record.completion_percentage = Some(100);
                record.transition(TaskState::Completed, at);
                stats.record_success(elapsed);
            }
            TaskOutcome::Failure(error) => {
                record.error = Some(error.clone());
                record.transition(TaskState::Failed, at);
                stats.record_failure();
            }
        }

        debug!(
            task = %task_id,
            state = %record.state,
            elapsed_ms = elapsed.as_millis() as u64,
            "task finished"
        );
    }

    pub fn on_blocked(&mut self, task_id: &str, reason: &str, at: DateTime<Utc>) {
        let Some(record) = self.records.get_mut(task_id) else {
            warn!(task = %task_id, "block reported for unknown task; ignoring");
            return;
        };

        record.error = Some(reason.to_string());
        record.transition(TaskState::Blocked, at);
    }

    /// Attach a progress message to a running task.
    pub fn record_progress(
        &mut self,
        task_id: &str,
        percentage: Option<u8>,
        message: &str,
        at: DateTime<Utc>,
    ) {
        let Some(record) = self.records.get_mut(task_id) else {
            warn!(task = %task_id, "progress for unknown task; ignoring");
            return;
        };
        if record.state != TaskState::InProgress {
            debug!(task = %task_id, "progress for task that is not running; ignoring");
            return;
        }

        let percentage = percentage.map(|p| p.min(100));
        if percentage.is_some() {
            record.completion_percentage = percentage;
        }
        record.progress.push(ProgressUpdate {
            at,
            percentage,
            message: message.to_string(),
        });
    }

    pub fn state_of(&self, task_id: &str) -> Option<TaskState> {
        self.records.get(task_id).map(|r| r.state)
    }

    /// Every transition of a task, oldest first.
    pub fn history(&self, task_id: &str) -> &[Transition] {
        self.records
            .get(task_id)
            .map(|r| r.transitions.as_slice())
            .unwrap_or(&[])
    }

    pub fn progress_updates(&self, task_id: &str) -> &[ProgressUpdate] {
        self.records
            .get(task_id)
            .map(|r| r.progress.as_slice())
            .unwrap_or(&[])
    }

    pub fn role_stats(&self, role: &str) -> Option<&WorkerRoleStats> {
        self.roles.get(role)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> RunSnapshot {
        let mut pending = Vec::new();
        let mut active = Vec::new();
        let mut completed = Vec::new();
        let mut failed = Vec::new();
        let mut blocked = Vec::new();

        for record in self.order.iter().filter_map(|id| self.records.get(id)) {
            let summary = record.summary();
            match record.state {
                TaskState::Pending => pending.push(summary),
                TaskState::InProgress => active.push(summary),
                TaskState::Completed => completed.push(summary),
                TaskState::Failed => failed.push(summary),
                TaskState::Blocked => blocked.push(summary),
            }
        }

        let total_tasks = self.order.len();
        let completion_rate = if total_tasks == 0 {
            0.0
        } else {
            completed.len() as f64 / total_tasks as f64 * 100.0
        };

        let total_elapsed: Duration = self.roles.values().map(|s| s.total_elapsed).sum();
        let completed_count: usize = self.roles.values().map(|s| s.completed).sum();
        let not_terminal = pending.len() + active.len();
        let estimated_remaining_secs = u32::try_from(completed_count)
            .ok()
            .filter(|c| *c > 0)
            .map(|c| (total_elapsed / c).as_secs_f64() * not_terminal as f64);

        RunSnapshot {
            run_id: self.run_id.clone(),
            generated_at: now,
            total_tasks,
            pending,
            active,
            completed,
            failed,
            blocked,
            roles: self
                .roles
                .iter()
                .map(|(name, stats)| (name.clone(), RoleSummary::from(stats)))
                .collect(),
            completion_rate,
            estimated_remaining_secs,
        }
    }

    pub fn check_for_issues(&self) -> Vec<Issue> {
        self.check_for_issues_at(Utc::now())
    }

    pub fn check_for_issues_at(&self, now: DateTime<Utc>) -> Vec<Issue> {
        diagnose(&self.snapshot_at(now), &self.config)
    }
}

/// Shared handle to a [`LifecycleTracker`].
///
/// Executing tasks report start/completion/progress through this handle; the
/// lock is only held for the duration of a single bookkeeping call.
#[derive(Debug, Clone)]
pub struct TrackerHandle {
    inner: Arc<Mutex<LifecycleTracker>>,
}

impl TrackerHandle {
    pub fn new(tracker: LifecycleTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LifecycleTracker> {
        // Poisoning is ignored.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `f` with exclusive access to the tracker.
    pub fn with<T>(&self, f: impl FnOnce(&mut LifecycleTracker) -> T) -> T {
        f(&mut self.lock())
    }

    pub fn on_start(&self, task_id: &str, role: &str, at: DateTime<Utc>) {
        self.lock().on_start(task_id, role, at);
    }

    pub fn on_complete(&self, task_id: &str, outcome: &TaskOutcome, at: DateTime<Utc>, elapsed: Duration) {
        self.lock().on_complete(task_id, outcome, at, elapsed);
    }

    pub fn on_blocked(&self, task_id: &str, reason: &str, at: DateTime<Utc>) {
        self.lock().on_blocked(task_id, reason, at);
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().snapshot()
    }

    pub fn check_for_issues(&self) -> Vec<Issue> {
        self.lock().check_for_issues()
    }

    /// Progress reporter bound to one task.
    pub fn progress_for(&self, task_id: &str) -> ProgressHandle {
        ProgressHandle {
            task_id: task_id.to_string(),
            tracker: self.clone(),
        }
    }
}

/// Lets a running task report progress without access to anything else.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    task_id: TaskId,
    tracker: TrackerHandle,
}

impl ProgressHandle {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn report(&self, percentage: Option<u8>, message: impl Into<String>) {
        let message = message.into();
        self.tracker
            .lock()
            .record_progress(&self.task_id, percentage, &message, Utc::now());
    }
}
