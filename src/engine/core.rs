// src/engine/core.rs

//! Pure wave state machine.
//!
//! [`SchedulerCore`] owns the `remaining` list and the `completed` set and
//! decides, one wave at a time, which tasks run next. It performs no IO and
//! has no Tokio types, so it can be stepped by hand in tests:
//!
//! ```text
//! loop {
//!     match core.next_step() {
//!         Dispatch { tasks, .. } => core.apply_outcomes(run(tasks)),
//!         Stalled { .. }         => { core.block_remaining(now); break }
//!         Finished               => break,
//!     }
//! }
//! ```
//!
//! Readiness is only evaluated after the previous wave's outcomes have been
//! applied, so a task can never start in the same wave as one of its
//! dependencies.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, Task, TaskGraph, readiness};
use crate::engine::TaskOutcome;
use crate::exec::TaskResult;
use crate::types::{TaskId, TaskState};

/// What the driver should do next.
#[derive(Debug, Clone)]
pub enum WaveStep {
    /// Run these tasks concurrently as wave number `wave` (1-based).
    Dispatch {
        wave: usize,
        tasks: Vec<ScheduledTask>,
    },
    /// Tasks remain but none can ever become ready.
    Stalled { unreachable: Vec<TaskId> },
    /// Every task has reached a terminal state.
    Finished,
}

/// Effect of applying one wave's outcomes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedWave {
    pub completed: Vec<TaskId>,
    pub failed: Vec<TaskId>,
    /// Dispatched tasks that produced no outcome; they are `Pending` again.
    pub requeued: Vec<TaskId>,
}

#[derive(Debug)]
pub struct SchedulerCore {
    graph: TaskGraph,
    concurrency: usize,
    /// Not-yet-terminal task ids, in declaration order.
    remaining: Vec<TaskId>,
    completed: HashSet<TaskId>,
    in_flight: Vec<TaskId>,
    waves: Vec<Vec<TaskId>>,
}

impl SchedulerCore {
    pub fn new(graph: TaskGraph, concurrency: usize) -> Self {
        if concurrency == 0 {
            warn!("concurrency of 0 requested; using 1");
        }
        let remaining = graph.ids().map(|s| s.to_string()).collect();
        Self {
            graph,
            concurrency: concurrency.max(1),
            remaining,
            completed: HashSet::new(),
            in_flight: Vec::new(),
            waves: Vec::new(),
        }
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn remaining(&self) -> &[TaskId] {
        &self.remaining
    }

    pub fn completed(&self) -> &HashSet<TaskId> {
        &self.completed
    }

    /// Task ids of every wave dispatched so far.
    pub fn waves(&self) -> &[Vec<TaskId>] {
        &self.waves
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn state_of(&self, id: &str) -> Option<TaskState> {
        self.graph.task(id).map(|t| t.state)
    }

    /// Decide the next wave.
    ///
    /// The outcomes of a dispatched wave must be applied before this is called
    /// again.
    pub fn next_step(&mut self) -> WaveStep {
        if !self.in_flight.is_empty() {
            warn!(
                in_flight = self.in_flight.len(),
                "next wave requested before previous outcomes were applied; dispatching nothing"
            );
            return WaveStep::Dispatch {
                wave: self.waves.len(),
                tasks: Vec::new(),
            };
        }

        if self.remaining.is_empty() {
            return WaveStep::Finished;
        }

        let ready = readiness::ready(&self.graph, &self.remaining, &self.completed);
        if ready.is_empty() {
            return WaveStep::Stalled {
                unreachable: self.remaining.clone(),
            };
        }

        let deferred = ready.len().saturating_sub(self.concurrency);
        let selected: Vec<TaskId> = ready.into_iter().take(self.concurrency).collect();
        let wave = self.waves.len() + 1;

        let mut tasks = Vec::with_capacity(selected.len());
        for id in &selected {
            let upstream = self.upstream_of(id);
            if let Some(task) = self.graph.task_mut(id) {
                task.state = TaskState::InProgress;
                tasks.push(ScheduledTask::from_task(task, upstream, wave));
            }
        }

        info!(wave, tasks = ?selected, deferred, "dispatching wave");

        self.in_flight = selected.clone();
        self.waves.push(selected);

        WaveStep::Dispatch { wave, tasks }
    }

    /// Record the outcomes of the wave in flight.
    pub fn apply_outcomes(&mut self, results: Vec<TaskResult>) -> AppliedWave {
        let mut applied = AppliedWave::default();

        for result in results {
            if !self.in_flight.contains(&result.id) {
                warn!(task = %result.id, "outcome for task not in flight; ignoring");
                continue;
            }
            self.in_flight.retain(|id| id != &result.id);
            self.remaining.retain(|id| id != &result.id);

            let Some(task) = self.graph.task_mut(&result.id) else {
                continue;
            };
            task.started_at = Some(result.started_at);
            task.completed_at = Some(result.finished_at);

            match result.outcome {
                TaskOutcome::Success(payload) => {
                    task.state = TaskState::Completed;
                    task.result = Some(payload);
                    self.completed.insert(result.id.clone());
                    applied.completed.push(result.id);
                }
                TaskOutcome::Failure(error) => {
                    warn!(task = %result.id, error = %error, "task failed");
                    task.state = TaskState::Failed;
                    task.error = Some(error);
                    debug!(
                        task = %result.id,
                        dependents = ?self.graph.dependents_of(&result.id),
                        "dependents of failed task can no longer run"
                    );
                    applied.failed.push(result.id);
                }
            }
        }

        for id in std::mem::take(&mut self.in_flight) {
            warn!(task = %id, "no outcome reported; returning task to pending");
            if let Some(task) = self.graph.task_mut(&id) {
                task.state = TaskState::Pending;
            }
            applied.requeued.push(id);
        }

        applied
    }

    /// Mark every remaining task `Blocked`. Returns `(id, reason)` pairs in
    /// declaration order.
    pub fn block_remaining(&mut self, at: DateTime<Utc>) -> Vec<(TaskId, String)> {
        let remaining = std::mem::take(&mut self.remaining);
        let mut blocked = Vec::with_capacity(remaining.len());

        for id in remaining {
            let reason = self.block_reason(&id);
            if let Some(task) = self.graph.task_mut(&id) {
                task.state = TaskState::Blocked;
                task.completed_at = Some(at);
                task.error = Some(reason.clone());
            }
            info!(task = %id, reason = %reason, "task blocked");
            blocked.push((id, reason));
        }

        blocked
    }

    fn block_reason(&self, id: &str) -> String {
        let unmet = self
            .graph
            .dependencies_of(id)
            .iter()
            .find(|dep| !self.completed.contains(*dep));

        match unmet {
            Some(dep) if self.state_of(dep) == Some(TaskState::Failed) => {
                format!("dependency '{dep}' failed")
            }
            Some(dep) => format!("dependency '{dep}' can never complete"),
            None => "no progress possible".to_string(),
        }
    }

    fn upstream_of(&self, id: &str) -> BTreeMap<TaskId, serde_json::Value> {
        self.graph
            .dependencies_of(id)
            .iter()
            .filter_map(|dep| {
                let result = self.graph.task(dep)?.result.clone()?;
                Some((dep.clone(), result))
            })
            .collect()
    }

    /// Final task states, in declaration order.
    pub fn into_tasks(self) -> Vec<Task> {
        self.graph.into_tasks()
    }
}

/// Waves the graph would run in if every task succeeded.
pub fn preview_waves(graph: &TaskGraph, concurrency: usize) -> Vec<Vec<TaskId>> {
    let mut core = SchedulerCore::new(graph.clone(), concurrency);

    while let WaveStep::Dispatch { tasks, .. } = core.next_step() {
        let now = Utc::now();
        let results = tasks
            .into_iter()
            .map(|t| TaskResult {
                id: t.id,
                outcome: TaskOutcome::Success(serde_json::Value::Null),
                started_at: now,
                finished_at: now,
                elapsed: Duration::ZERO,
            })
            .collect();
        core.apply_outcomes(results);
    }

    core.waves().to_vec()
}
