// src/dag/mod.rs

//! Task graph representation, validation and readiness.
//!
//! - [`task`] holds the static task description and its per-run lifecycle fields.
//! - [`validate`] checks a task set for structural soundness before scheduling.
//! - [`graph`] is the validated, immutable graph with dependents adjacency.
//! - [`readiness`] decides which remaining tasks can run now.

pub mod graph;
pub mod readiness;
pub mod task;
pub mod validate;

pub use graph::TaskGraph;
pub use readiness::ready;
pub use task::{ScheduledTask, Task, TaskSpec};
pub use validate::{validate, StructuralError};
