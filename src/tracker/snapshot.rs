// src/tracker/snapshot.rs

//! Immutable point-in-time views of a run.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::tracker::stats::WorkerRoleStats;
use crate::types::{RoleName, TaskId, TaskState};

/// Summary of one task inside a [`RunSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub role: RoleName,
    pub effort: String,
    pub state: TaskState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub completion_percentage: Option<u8>,
    /// Failure message, or the reason a task was blocked.
    pub error: Option<String>,
}

/// Serializable view of [`WorkerRoleStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSummary {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_elapsed_secs: f64,
    pub average_task_secs: Option<f64>,
}

impl From<&WorkerRoleStats> for RoleSummary {
    fn from(stats: &WorkerRoleStats) -> Self {
        Self {
            active: stats.active,
            completed: stats.completed,
            failed: stats.failed,
            total_elapsed_secs: stats.total_elapsed.as_secs_f64(),
            average_task_secs: stats.average().map(|d| d.as_secs_f64()),
        }
    }
}

/// Point-in-time view of a run. Never mutated after creation.
///
/// Task lists are in declaration order; roles are sorted by name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub generated_at: DateTime<Utc>,
    pub total_tasks: usize,
    pub pending: Vec<TaskSummary>,
    pub active: Vec<TaskSummary>,
    pub completed: Vec<TaskSummary>,
    pub failed: Vec<TaskSummary>,
    pub blocked: Vec<TaskSummary>,
    pub roles: BTreeMap<RoleName, RoleSummary>,
    /// Completed tasks as a percentage of all tasks (0.0 for an empty run).
    pub completion_rate: f64,
    /// Average completed-task duration times the number of tasks not yet
    /// terminal; `None` until some task has completed.
    pub estimated_remaining_secs: Option<f64>,
}

impl RunSnapshot {
    /// Ids of every task in a terminal state.
    pub fn terminal_ids(&self) -> Vec<&str> {
        self.completed
            .iter()
            .chain(self.failed.iter())
            .chain(self.blocked.iter())
            .map(|t| t.id.as_str())
            .collect()
    }

    /// All tasks completed successfully.
    pub fn is_success(&self) -> bool {
        self.completed.len() == self.total_tasks
    }

    pub fn state_of(&self, id: &str) -> Option<TaskState> {
        self.pending
            .iter()
            .chain(self.active.iter())
            .chain(self.completed.iter())
            .chain(self.failed.iter())
            .chain(self.blocked.iter())
            .find(|t| t.id == id)
            .map(|t| t.state)
    }
}
