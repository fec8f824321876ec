// src/exec/backend.rs

//! Pluggable task runner abstraction.
//!
//! The scheduler never performs work itself; every task is handed to a
//! [`TaskRunner`]. Production code routes tasks to [`CommandRunner`]s by
//! role, falling back to another runner (e.g. [`SimulatedRunner`]) for roles
//! without a command. Tests provide their own scripted runners.
//!
//! [`SimulatedRunner`]: crate::exec::SimulatedRunner

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::PlanFile;
use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::exec::command::CommandRunner;
use crate::tracker::ProgressHandle;
use crate::types::RoleName;

/// Boxed future returned by [`TaskRunner::execute`].
pub type RunFuture<'a> = Pin<Box<dyn Future<Output = TaskOutcome> + Send + 'a>>;

/// Trait abstracting how a single task is executed.
///
/// Implementations must turn every error (including timeouts) into
/// [`TaskOutcome::Failure`]; the scheduler never inspects or interrupts a
/// task while it runs.
pub trait TaskRunner: Send + Sync {
    fn execute(&self, task: ScheduledTask, progress: ProgressHandle) -> RunFuture<'_>;
}

impl<R: TaskRunner + ?Sized> TaskRunner for Arc<R> {
    fn execute(&self, task: ScheduledTask, progress: ProgressHandle) -> RunFuture<'_> {
        (**self).execute(task, progress)
    }
}

/// Routes each task to the command configured for its role, or to a fallback.
pub struct RoleRouter {
    commands: HashMap<RoleName, CommandRunner>,
    fallback: Arc<dyn TaskRunner>,
}

impl RoleRouter {
    pub fn new(fallback: Arc<dyn TaskRunner>) -> Self {
        Self {
            commands: HashMap::new(),
            fallback,
        }
    }

    /// Build a router from the `[role.<name>]` sections of a plan.
    pub fn from_plan(plan: &PlanFile, timeout: Option<Duration>, fallback: Arc<dyn TaskRunner>) -> Self {
        let mut router = Self::new(fallback);
        for (role, cfg) in plan.roles.iter() {
            router = router.with_command(role.clone(), CommandRunner::new(cfg.cmd.clone(), timeout));
        }
        router
    }

    pub fn with_command(mut self, role: impl Into<RoleName>, runner: CommandRunner) -> Self {
        self.commands.insert(role.into(), runner);
        self
    }

    /// Roles that run a real command.
    pub fn command_roles(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(|s| s.as_str())
    }
}

impl TaskRunner for RoleRouter {
    fn execute(&self, task: ScheduledTask, progress: ProgressHandle) -> RunFuture<'_> {
        match self.commands.get(&task.role) {
            Some(runner) => runner.execute(task, progress),
            None => {
                debug!(task = %task.id, role = %task.role, "no command for role; using fallback runner");
                self.fallback.execute(task, progress)
            }
        }
    }
}
