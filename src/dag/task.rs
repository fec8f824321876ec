// src/dag/task.rs

//! Task metadata and per-run lifecycle fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{RoleName, TaskId, TaskState};

/// Static description of a task, as supplied by the planning layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub role: RoleName,
    /// Prerequisite task ids, in declaration order.
    pub dependencies: Vec<TaskId>,
    /// Opaque effort estimate (e.g. `"4h"`); never interpreted.
    pub effort: String,
}

impl TaskSpec {
    pub fn new(id: impl Into<TaskId>, role: impl Into<RoleName>) -> Self {
        let id = id.into();
        Self {
            title: id.clone(),
            id,
            description: String::new(),
            role: role.into(),
            dependencies: Vec::new(),
            effort: "unknown".to_string(),
        }
    }

    pub fn after(mut self, dep: impl Into<TaskId>) -> Self {
        self.dependencies.push(dep.into());
        self
    }
}

/// A task plus its mutable lifecycle fields for one run.
///
/// Owned by the scheduler core; only the core mutates it, and only between
/// waves.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    #[serde(flatten)]
    pub spec: TaskSpec,
    pub state: TaskState,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(spec: TaskSpec) -> Self {
        Self {
            spec,
            state: TaskState::Pending,
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn dependencies(&self) -> &[TaskId] {
        &self.spec.dependencies
    }
}

/// Description of a task that the scheduler wants a runner to execute now.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub role: RoleName,
    pub effort: String,
    pub dependencies: Vec<TaskId>,
    /// Result payloads of this task's (completed) dependencies.
    pub upstream: BTreeMap<TaskId, serde_json::Value>,
    /// 1-based wave number this task was dispatched in.
    pub wave: usize,
}

impl ScheduledTask {
    pub fn from_task(
        task: &Task,
        upstream: BTreeMap<TaskId, serde_json::Value>,
        wave: usize,
    ) -> Self {
        Self {
            id: task.spec.id.clone(),
            title: task.spec.title.clone(),
            description: task.spec.description.clone(),
            role: task.spec.role.clone(),
            effort: task.spec.effort.clone(),
            dependencies: task.spec.dependencies.clone(),
            upstream,
            wave,
        }
    }
}
