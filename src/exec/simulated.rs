// src/exec/simulated.rs

//! Placeholder runner for roles that have no command configured.

use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::dag::ScheduledTask;
use crate::engine::TaskOutcome;
use crate::exec::backend::{RunFuture, TaskRunner};
use crate::tracker::ProgressHandle;

pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_secs(1);

/// Waits a fixed delay and returns a canned payload naming the role.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedRunner {
    delay: Duration,
}

impl SimulatedRunner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_DELAY)
    }
}

impl TaskRunner for SimulatedRunner {
    fn execute(&self, task: ScheduledTask, progress: ProgressHandle) -> RunFuture<'_> {
        Box::pin(async move {
            info!(task = %task.id, role = %task.role, "simulating task");
            let start = Instant::now();
            tokio::time::sleep(self.delay).await;
            progress.report(Some(100), "simulated work finished");

            TaskOutcome::Success(json!({
                "status": "completed",
                "agent": task.role,
                "result": format!("Mock result from {}", task.role),
                "execution_time": start.elapsed().as_secs_f64(),
                "timestamp": Utc::now().to_rfc3339(),
            }))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::dag::TaskSpec;
    use crate::tracker::{LifecycleTracker, TrackerConfig, TrackerHandle};

    #[tokio::test]
    async fn returns_role_payload_and_reports_completion() {
        let mut t = LifecycleTracker::new("sim", TrackerConfig::default());
        t.register(&TaskSpec::new("docs", "writer"), Utc::now());
        t.on_start("docs", "writer", Utc::now());
        let tracker = TrackerHandle::new(t);

        let task = ScheduledTask {
            id: "docs".into(),
            title: "Docs".into(),
            description: String::new(),
            role: "writer".into(),
            effort: "1h".into(),
            dependencies: Vec::new(),
            upstream: BTreeMap::new(),
            wave: 1,
        };

        let outcome = SimulatedRunner::new(Duration::from_millis(5))
            .execute(task, tracker.progress_for("docs"))
            .await;

        let TaskOutcome::Success(payload) = outcome else {
            panic!("simulated runner should succeed");
        };
        assert_eq!(payload["agent"], "writer");
        assert_eq!(payload["result"], "Mock result from writer");
        assert_eq!(
            tracker.with(|t| t.progress_updates("docs")[0].percentage),
            Some(100)
        );
    }
}
