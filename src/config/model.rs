// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::TaskSpec;
use crate::engine::{DEFAULT_CONCURRENCY, SchedulerOptions};
use crate::tracker::{DEFAULT_IMBALANCE_MARGIN, TrackerConfig};

/// Plan file exactly as deserialized from TOML, before validation.
///
/// ```toml
/// [config]
/// concurrency = 3
/// stall_threshold = "24h"
///
/// [role.coder-backend]
/// cmd = "scripts/agent.sh"
///
/// [[task]]
/// id = "api"
/// role = "coder-backend"
/// after = ["schema"]
/// ```
///
/// Tasks are an array so their declaration order (and any duplicate ids)
/// reach the graph validator unchanged.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPlanFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// `[role.<name>]` sections, keyed by role name.
    #[serde(default)]
    pub role: BTreeMap<String, RoleConfig>,

    #[serde(default)]
    pub task: Vec<TaskConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Maximum number of tasks in progress at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Duration string (`ms`, `s`, `m` or `h` suffix).
    #[serde(default = "default_stall_threshold")]
    pub stall_threshold: String,

    #[serde(default = "default_imbalance_margin")]
    pub imbalance_margin: usize,

    /// Per-task timeout applied to command runners. No timeout if absent.
    #[serde(default)]
    pub task_timeout: Option<String>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_stall_threshold() -> String {
    "24h".to_string()
}

fn default_imbalance_margin() -> usize {
    DEFAULT_IMBALANCE_MARGIN
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            stall_threshold: default_stall_threshold(),
            imbalance_margin: default_imbalance_margin(),
            task_timeout: None,
        }
    }
}

/// `[role.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RoleConfig {
    /// Shell command run once per task of this role.
    pub cmd: String,
}

/// One `[[task]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    pub id: String,

    /// Defaults to the id.
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: String,

    pub role: String,

    /// Prerequisite task ids.
    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub effort: Option<String>,
}

impl TaskConfig {
    pub fn to_spec(&self) -> TaskSpec {
        let mut spec = TaskSpec::new(self.id.clone(), self.role.clone());
        if let Some(title) = &self.title {
            spec.title = title.clone();
        }
        if let Some(effort) = &self.effort {
            spec.effort = effort.clone();
        }
        spec.description = self.description.clone();
        spec.dependencies = self.after.clone();
        spec
    }
}

/// Global settings with durations parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSettings {
    pub concurrency: usize,
    pub stall_threshold: Duration,
    pub imbalance_margin: usize,
    pub task_timeout: Option<Duration>,
}

impl PlanSettings {
    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            concurrency: self.concurrency,
            tracker: TrackerConfig {
                stall_threshold: self.stall_threshold,
                imbalance_margin: self.imbalance_margin,
            },
        }
    }
}

/// Validated plan file.
///
/// Only global settings and per-field sanity are checked here; graph structure
/// (duplicate ids, unknown dependencies, cycles) is checked when the
/// [`TaskGraph`](crate::dag::TaskGraph) is built from [`PlanFile::task_specs`].
#[derive(Debug, Clone)]
pub struct PlanFile {
    pub config: ConfigSection,
    pub roles: BTreeMap<String, RoleConfig>,
    pub tasks: Vec<TaskConfig>,
    settings: PlanSettings,
}

impl PlanFile {
    pub(crate) fn new_unchecked(raw: RawPlanFile, settings: PlanSettings) -> Self {
        Self {
            config: raw.config,
            roles: raw.role,
            tasks: raw.task,
            settings,
        }
    }

    pub fn settings(&self) -> PlanSettings {
        self.settings
    }

    /// Task specs in declaration order.
    pub fn task_specs(&self) -> Vec<TaskSpec> {
        self.tasks.iter().map(TaskConfig::to_spec).collect()
    }
}
