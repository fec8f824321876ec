// src/tracker/mod.rs

//! Lifecycle tracking for one scheduling run.
//!
//! - [`lifecycle`] records per-task transitions and per-role statistics and is
//!   shared with executing tasks through a [`TrackerHandle`].
//! - [`stats`] holds the running per-role aggregates.
//! - [`snapshot`] defines the immutable [`RunSnapshot`] view.
//! - [`diagnostics`] derives advisory [`Issue`]s (stalled tasks, blocked tasks,
//!   workload imbalance) from a snapshot. They never influence scheduling.

pub mod diagnostics;
pub mod lifecycle;
pub mod snapshot;
pub mod stats;

use std::time::Duration;

pub use diagnostics::{Issue, IssueKind, Severity, diagnose, merge_issues};
pub use lifecycle::{LifecycleTracker, ProgressHandle, ProgressUpdate, TrackerHandle, Transition};
pub use snapshot::{RoleSummary, RunSnapshot, TaskSummary};
pub use stats::WorkerRoleStats;

/// Thresholds for the advisory diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// A task in progress for longer than this is reported as stalled.
    pub stall_threshold: Duration,
    /// Imbalance is reported when the busiest role has more than this many
    /// active tasks above the least busy one.
    pub imbalance_margin: usize,
}

pub const DEFAULT_STALL_THRESHOLD: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_IMBALANCE_MARGIN: usize = 2;

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stall_threshold: DEFAULT_STALL_THRESHOLD,
            imbalance_margin: DEFAULT_IMBALANCE_MARGIN,
        }
    }
}
