#![allow(dead_code)]

use std::collections::BTreeMap;

use wavedag::config::{ConfigSection, PlanFile, RawPlanFile, RoleConfig, TaskConfig};
use wavedag::dag::{TaskGraph, TaskSpec};

/// Builder for `PlanFile` to simplify test setup.
pub struct PlanBuilder {
    plan: RawPlanFile,
}

impl PlanBuilder {
    pub fn new() -> Self {
        Self {
            plan: RawPlanFile {
                config: ConfigSection::default(),
                role: BTreeMap::new(),
                task: Vec::new(),
            },
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.plan.config.concurrency = n;
        self
    }

    pub fn stall_threshold(mut self, s: &str) -> Self {
        self.plan.config.stall_threshold = s.to_string();
        self
    }

    pub fn imbalance_margin(mut self, n: usize) -> Self {
        self.plan.config.imbalance_margin = n;
        self
    }

    pub fn task_timeout(mut self, s: &str) -> Self {
        self.plan.config.task_timeout = Some(s.to_string());
        self
    }

    pub fn role_cmd(mut self, role: &str, cmd: &str) -> Self {
        self.plan.role.insert(
            role.to_string(),
            RoleConfig {
                cmd: cmd.to_string(),
            },
        );
        self
    }

    pub fn task(mut self, task: TaskBuilder) -> Self {
        self.plan.task.push(task.build());
        self
    }

    pub fn build_raw(self) -> RawPlanFile {
        self.plan
    }

    pub fn build(self) -> PlanFile {
        PlanFile::try_from(self.plan).expect("Failed to build valid plan from builder")
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for one `[[task]]` entry.
pub struct TaskBuilder {
    task: TaskConfig,
}

impl TaskBuilder {
    pub fn new(id: &str, role: &str) -> Self {
        Self {
            task: TaskConfig {
                id: id.to_string(),
                title: None,
                description: String::new(),
                role: role.to_string(),
                after: vec![],
                effort: None,
            },
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.task.title = Some(title.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.task.description = description.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn effort(mut self, effort: &str) -> Self {
        self.task.effort = Some(effort.to_string());
        self
    }

    pub fn spec(self) -> TaskSpec {
        self.task.to_spec()
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Build a validated graph from `(id, role, deps)` triples.
pub fn graph(tasks: &[(&str, &str, &[&str])]) -> TaskGraph {
    let specs = tasks
        .iter()
        .map(|(id, role, deps)| {
            deps.iter()
                .fold(TaskBuilder::new(id, role), |b, dep| b.after(dep))
                .spec()
        })
        .collect();
    TaskGraph::build(specs).expect("test graph should be valid")
}
