// src/exec/mod.rs

//! Task execution layer.
//!
//! - [`backend`] defines the [`TaskRunner`] trait the scheduler executes tasks
//!   through, plus [`RoleRouter`] which picks a runner per worker role.
//! - [`batch`] runs one wave of tasks concurrently and collects every outcome.
//! - [`command`] runs a role's shell command for a task.
//! - [`simulated`] stands in for a real worker with a fixed delay and a canned
//!   payload.

pub mod backend;
pub mod batch;
pub mod command;
pub mod simulated;

pub use backend::{RoleRouter, RunFuture, TaskRunner};
pub use batch::{TaskResult, run_batch};
pub use command::CommandRunner;
pub use simulated::SimulatedRunner;
