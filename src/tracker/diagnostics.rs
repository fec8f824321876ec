// src/tracker/diagnostics.rs

//! Advisory diagnostics derived from a [`RunSnapshot`].

use std::fmt;

use serde::Serialize;

use crate::tracker::TrackerConfig;
use crate::tracker::snapshot::RunSnapshot;
use crate::types::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IssueKind {
    /// A task has been in progress for longer than the stall threshold.
    LongRunningTask { task_id: TaskId, running_secs: u64 },
    /// Some tasks can never run because a dependency failed.
    BlockedTasks { count: usize },
    /// Active work is unevenly spread across roles.
    WorkloadImbalance { max_active: usize, min_active: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    #[serde(flatten)]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    pub recommendation: String,
}

/// Check a snapshot for stalled tasks, blocked tasks and workload imbalance.
///
/// "Now" is the snapshot's `generated_at`.
pub fn diagnose(snapshot: &RunSnapshot, config: &TrackerConfig) -> Vec<Issue> {
    let mut issues = Vec::new();

    for task in &snapshot.active {
        let Some(started_at) = task.started_at else {
            continue;
        };
        let running = (snapshot.generated_at - started_at)
            .to_std()
            .unwrap_or_default();

        if running > config.stall_threshold {
            let hours = running.as_secs_f64() / 3600.0;
            issues.push(Issue {
                kind: IssueKind::LongRunningTask {
                    task_id: task.id.clone(),
                    running_secs: running.as_secs(),
                },
                severity: Severity::Medium,
                message: format!("Task '{}' has been running for {hours:.1} hours", task.id),
                recommendation: "Check if task needs assistance or should be broken down"
                    .to_string(),
            });
        }
    }

    let blocked = snapshot.blocked.len();
    if blocked > 0 {
        issues.push(Issue {
            kind: IssueKind::BlockedTasks { count: blocked },
            severity: Severity::High,
            message: format!("{blocked} tasks are currently blocked"),
            recommendation: "Review and resolve blockers to maintain workflow velocity"
                .to_string(),
        });
    }

    let max_active = snapshot.roles.values().map(|r| r.active).max();
    let min_active = snapshot.roles.values().map(|r| r.active).min();
    if let (Some(max_active), Some(min_active)) = (max_active, min_active) {
        if max_active - min_active > config.imbalance_margin {
            issues.push(Issue {
                kind: IssueKind::WorkloadImbalance {
                    max_active,
                    min_active,
                },
                severity: Severity::Low,
                message: "Uneven workload distribution among roles".to_string(),
                recommendation: "Consider rebalancing task assignments".to_string(),
            });
        }
    }

    issues
}

/// Fold freshly diagnosed issues into those collected earlier in the run.
///
/// One entry is kept per stalled task and per issue type otherwise. Stall
/// durations and blocked counts take the latest value; imbalance keeps the
/// widest spread seen.
pub fn merge_issues(collected: &mut Vec<Issue>, fresh: Vec<Issue>) {
    for issue in fresh {
        let Some(existing) = collected.iter_mut().find(|i| i.kind.same_subject(&issue.kind)) else {
            collected.push(issue);
            continue;
        };
        let replace = match (&existing.kind, &issue.kind) {
            (
                IssueKind::WorkloadImbalance {
                    max_active: old_max,
                    min_active: old_min,
                },
                IssueKind::WorkloadImbalance {
                    max_active,
                    min_active,
                },
            ) => max_active - min_active > old_max - old_min,
            _ => true,
        };
        if replace {
            *existing = issue;
        }
    }
}

impl IssueKind {
    fn same_subject(&self, other: &IssueKind) -> bool {
        match (self, other) {
            (
                IssueKind::LongRunningTask { task_id: a, .. },
                IssueKind::LongRunningTask { task_id: b, .. },
            ) => a == b,
            (IssueKind::BlockedTasks { .. }, IssueKind::BlockedTasks { .. }) => true,
            (IssueKind::WorkloadImbalance { .. }, IssueKind::WorkloadImbalance { .. }) => true,
            _ => false,
        }
    }
}
