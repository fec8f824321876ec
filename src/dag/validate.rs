// src/dag/validate.rs

//! Structural validation of a task set.
//!
//! All checks run to completion so a single pass yields every problem:
//! 1. duplicate ids (one error per extra occurrence)
//! 2. dependencies on unknown tasks (one error per owning task + missing id)
//! 3. dependency cycles, found by a depth-first walk that keeps the current
//!    path on an explicit stack; every node of each cycle is reported.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::dag::task::TaskSpec;
use crate::types::TaskId;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StructuralError {
    #[error("duplicate task id '{id}'")]
    DuplicateId { id: TaskId },

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    MissingDependency { task: TaskId, dependency: TaskId },

    /// `path` lists the cycle in dependency direction; the first node is
    /// repeated implicitly at the end.
    #[error("dependency cycle: {}", render_cycle(.path))]
    Cycle { path: Vec<TaskId> },
}

impl StructuralError {
    /// Task ids this error is about.
    pub fn task_ids(&self) -> Vec<&str> {
        match self {
            StructuralError::DuplicateId { id } => vec![id.as_str()],
            StructuralError::MissingDependency { task, .. } => vec![task.as_str()],
            StructuralError::Cycle { path } => path.iter().map(|s| s.as_str()).collect(),
        }
    }
}

fn render_cycle(path: &[TaskId]) -> String {
    let mut parts: Vec<&str> = path.iter().map(|s| s.as_str()).collect();
    if let Some(first) = path.first() {
        parts.push(first.as_str());
    }
    parts.join(" -> ")
}

/// Validate a task set. An empty result means the set may be scheduled.
pub fn validate(tasks: &[TaskSpec]) -> Vec<StructuralError> {
    let mut errors = Vec::new();

    // Unique ids, in first-declaration order.
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut nodes: Vec<&TaskSpec> = Vec::new();

    for task in tasks {
        if index.contains_key(task.id.as_str()) {
            errors.push(StructuralError::DuplicateId {
                id: task.id.clone(),
            });
        } else {
            index.insert(task.id.as_str(), nodes.len());
            nodes.push(task);
        }
    }

    for task in tasks {
        for dep in &task.dependencies {
            if !index.contains_key(dep.as_str()) {
                errors.push(StructuralError::MissingDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }

    // Edges point from a task to its (known) dependencies.
    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|task| {
            task.dependencies
                .iter()
                .filter_map(|dep| index.get(dep.as_str()).copied())
                .collect()
        })
        .collect();

    for cycle in find_cycles(&adjacency) {
        errors.push(StructuralError::Cycle {
            path: cycle.into_iter().map(|i| nodes[i].id.clone()).collect(),
        });
    }

    if !errors.is_empty() {
        debug!(count = errors.len(), "task graph failed validation");
    }

    errors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// Every distinct cycle reachable through a back edge, as node indices.
fn find_cycles(adjacency: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adjacency.len();
    let mut marks = vec![Mark::Unvisited; n];
    // Position of a node in `stack` while it is marked `OnStack`.
    let mut stack_pos: Vec<Option<usize>> = vec![None; n];
    let mut seen: HashSet<Vec<usize>> = HashSet::new();
    let mut cycles = Vec::new();

    for root in 0..n {
        if marks[root] != Mark::Unvisited {
            continue;
        }

        // (node, index of the next edge to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;
        stack_pos[root] = Some(0);

        while let Some(&(node, next_edge)) = stack.last() {
            if next_edge >= adjacency[node].len() {
                marks[node] = Mark::Done;
                stack_pos[node] = None;
                stack.pop();
                continue;
            }

            if let Some(frame) = stack.last_mut() {
                frame.1 += 1;
            }
            let child = adjacency[node][next_edge];

            match marks[child] {
                Mark::Unvisited => {
                    marks[child] = Mark::OnStack;
                    stack_pos[child] = Some(stack.len());
                    stack.push((child, 0));
                }
                Mark::OnStack => {
                    if let Some(start) = stack_pos[child] {
                        let cycle: Vec<usize> = stack[start..].iter().map(|f| f.0).collect();
                        if seen.insert(canonical(&cycle)) {
                            cycles.push(cycle);
                        }
                    }
                }
                Mark::Done => {}
            }
        }
    }

    cycles
}

/// Rotation of `cycle` starting at its smallest index, for de-duplication.
fn canonical(cycle: &[usize]) -> Vec<usize> {
    let Some(min_pos) = cycle
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| **v)
        .map(|(i, _)| i)
    else {
        return Vec::new();
    };
    cycle[min_pos..]
        .iter()
        .chain(cycle[..min_pos].iter())
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(id: &str, deps: &[&str]) -> TaskSpec {
        deps.iter()
            .fold(TaskSpec::new(id, "coder-backend"), |t, d| t.after(*d))
    }

    #[test]
    fn acyclic_graph_has_no_errors() {
        let tasks = vec![
            spec("A", &[]),
            spec("B", &[]),
            spec("C", &["A", "B"]),
            spec("D", &["C", "A"]),
        ];
        assert!(validate(&tasks).is_empty());
    }

    #[test]
    fn duplicate_ids_are_reported_once_per_duplicate() {
        let tasks = vec![spec("A", &[]), spec("A", &[]), spec("B", &[]), spec("A", &[])];
        let errors = validate(&tasks);
        assert_eq!(
            errors,
            vec![
                StructuralError::DuplicateId { id: "A".into() },
                StructuralError::DuplicateId { id: "A".into() },
            ]
        );
    }

    #[test]
    fn missing_dependencies_name_the_owning_task() {
        let tasks = vec![spec("A", &["ghost"]), spec("B", &["A", "phantom"])];
        let errors = validate(&tasks);
        assert_eq!(
            errors,
            vec![
                StructuralError::MissingDependency {
                    task: "A".into(),
                    dependency: "ghost".into()
                },
                StructuralError::MissingDependency {
                    task: "B".into(),
                    dependency: "phantom".into()
                },
            ]
        );
    }

    #[test]
    fn every_node_on_a_cycle_is_reported() {
        let tasks = vec![
            spec("A", &["C"]),
            spec("B", &["A"]),
            spec("C", &["B"]),
            spec("D", &["A"]),
        ];
        let errors = validate(&tasks);
        assert_eq!(errors.len(), 1);

        let mut ids = errors[0].task_ids();
        ids.sort();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let errors = validate(&[spec("A", &["A"])]);
        assert_eq!(
            errors,
            vec![StructuralError::Cycle {
                path: vec!["A".into()]
            }]
        );
        assert_eq!(errors[0].to_string(), "dependency cycle: A -> A");
    }

    #[test]
    fn disjoint_cycles_are_all_reported() {
        let tasks = vec![
            spec("A", &["B"]),
            spec("B", &["A"]),
            spec("X", &["Y"]),
            spec("Y", &["X"]),
        ];
        let errors = validate(&tasks);
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| matches!(e, StructuralError::Cycle { .. })));
    }

    #[test]
    fn all_checks_run_without_fail_fast() {
        let tasks = vec![
            spec("A", &["B"]),
            spec("B", &["A"]),
            spec("A", &[]),
            spec("C", &["nope"]),
        ];
        let errors = validate(&tasks);

        assert!(errors.contains(&StructuralError::DuplicateId { id: "A".into() }));
        assert!(errors.contains(&StructuralError::MissingDependency {
            task: "C".into(),
            dependency: "nope".into()
        }));
        assert!(errors.iter().any(|e| matches!(e, StructuralError::Cycle { .. })));
    }
}
