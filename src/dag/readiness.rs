// src/dag/readiness.rs

//! Readiness: which remaining tasks have every dependency completed.

use std::collections::HashSet;

use crate::dag::graph::TaskGraph;
use crate::types::TaskId;

/// Whether a task with these dependencies may start.
pub fn is_ready(dependencies: &[TaskId], completed: &HashSet<TaskId>) -> bool {
    dependencies.iter().all(|dep| completed.contains(dep))
}

/// Subset of `remaining` whose dependencies are all in `completed`.
///
/// The result keeps the order of `remaining`. The scheduler keeps `remaining`
/// in declaration order, so when concurrency is constrained the
/// earliest-declared ready tasks are picked first.
pub fn ready(graph: &TaskGraph, remaining: &[TaskId], completed: &HashSet<TaskId>) -> Vec<TaskId> {
    remaining
        .iter()
        .filter(|id| {
            graph
                .task(id)
                .map(|task| is_ready(task.dependencies(), completed))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
