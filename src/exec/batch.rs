// src/exec/batch.rs

//! Bounded concurrent execution of one wave.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::exec::backend::TaskRunner;
use crate::tracker::TrackerHandle;
use crate::types::TaskId;

/// Outcome of one task plus its wall-clock timing.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub id: TaskId,
    pub outcome: TaskOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed: Duration,
}

/// Run up to `limit` of `tasks` concurrently and wait for all of them.
///
/// Each task runs in its own Tokio task, so one task failing or panicking
/// never affects its batch-mates. Tasks beyond `limit` are not run; they are
/// left for the caller's next wave. Results are returned in dispatch order,
/// only after every task in the batch has produced an outcome.
///
/// The tracker's start/complete hooks are called around each execution.
pub async fn run_batch<R>(
    tasks: Vec<ScheduledTask>,
    limit: usize,
    runner: &Arc<R>,
    tracker: &TrackerHandle,
) -> Vec<TaskResult>
where
    R: TaskRunner + ?Sized + 'static,
{
    let limit = limit.max(1);
    if tasks.len() > limit {
        debug!(
            ready = tasks.len(),
            limit,
            "more tasks than the concurrency limit; excess waits for the next wave"
        );
    }

    let mut handles = Vec::with_capacity(limit.min(tasks.len()));

    for task in tasks.into_iter().take(limit) {
        let id = task.id.clone();
        let runner = Arc::clone(runner);
        let tracker = tracker.clone();
        let dispatched_at = Utc::now();
        let dispatched = Instant::now();

        let handle = tokio::spawn(async move {
            let started_at = Utc::now();
            let start = Instant::now();
            tracker.on_start(&task.id, &task.role, started_at);

            let id = task.id.clone();
            let progress = tracker.progress_for(&id);
            let outcome = runner.execute(task, progress).await;

            let elapsed = start.elapsed();
            let finished_at = Utc::now();
            tracker.on_complete(&id, &outcome, finished_at, elapsed);

            TaskResult {
                id,
                outcome,
                started_at,
                finished_at,
                elapsed,
            }
        });

        handles.push((id, dispatched_at, dispatched, handle));
    }

    let mut results = Vec::with_capacity(handles.len());

    for (id, dispatched_at, dispatched, handle) in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(err) => {
                error!(task = %id, error = %err, "task execution aborted");
                let outcome = TaskOutcome::Failure(format!("task execution aborted: {err}"));
                let elapsed = dispatched.elapsed();
                let finished_at = Utc::now();
                tracker.on_complete(&id, &outcome, finished_at, elapsed);
                results.push(TaskResult {
                    id,
                    outcome,
                    started_at: dispatched_at,
                    finished_at,
                    elapsed,
                });
            }
        }
    }

    results
}
