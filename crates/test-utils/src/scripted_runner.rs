use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use wavedag::dag::ScheduledTask;
use wavedag::engine::{CancelFlag, TaskOutcome};
use wavedag::exec::{RunFuture, TaskRunner};
use wavedag::tracker::ProgressHandle;

/// One task execution as seen by the [`ScriptedRunner`].
#[derive(Debug, Clone)]
pub struct Execution {
    pub id: String,
    pub role: String,
    pub wave: usize,
    /// Ids whose results were handed to this task.
    pub upstream: Vec<String>,
    pub started: Instant,
    pub finished: Instant,
}

/// A fake runner that:
/// - sleeps for a per-task (or default) delay
/// - fails or panics for the tasks it was told to
/// - records every execution with its start/finish instants
/// - tracks peak concurrency
#[derive(Default)]
pub struct ScriptedRunner {
    failing: HashSet<String>,
    panicking: HashSet<String>,
    delays: HashMap<String, Duration>,
    default_delay: Duration,
    payloads: HashMap<String, Value>,
    progress: HashMap<String, u8>,
    cancel_on: Option<(String, CancelFlag)>,
    records: Mutex<Vec<Execution>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(mut self, id: &str) -> Self {
        self.failing.insert(id.to_string());
        self
    }

    pub fn panic_on(mut self, id: &str) -> Self {
        self.panicking.insert(id.to_string());
        self
    }

    pub fn delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }

    pub fn with_default_delay(mut self, delay: Duration) -> Self {
        self.default_delay = delay;
        self
    }

    pub fn payload(mut self, id: &str, value: Value) -> Self {
        self.payloads.insert(id.to_string(), value);
        self
    }

    /// Report this percentage through the progress handle while `id` runs.
    pub fn report_progress(mut self, id: &str, pct: u8) -> Self {
        self.progress.insert(id.to_string(), pct);
        self
    }

    /// Trip `flag` as soon as `id` starts.
    pub fn cancel_when_started(mut self, id: &str, flag: CancelFlag) -> Self {
        self.cancel_on = Some((id.to_string(), flag));
        self
    }

    pub fn records(&self) -> Vec<Execution> {
        self.records.lock().unwrap().clone()
    }

    pub fn record(&self, id: &str) -> Option<Execution> {
        self.records().into_iter().find(|e| e.id == id)
    }

    /// Executed ids, ordered by start time.
    pub fn started_ids(&self) -> Vec<String> {
        let mut records = self.records();
        records.sort_by_key(|e| e.started);
        records.into_iter().map(|e| e.id).collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl TaskRunner for ScriptedRunner {
    fn execute(&self, task: ScheduledTask, progress: ProgressHandle) -> RunFuture<'_> {
        Box::pin(async move {
            let started = Instant::now();
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            if let Some((id, flag)) = &self.cancel_on {
                if *id == task.id {
                    flag.cancel();
                }
            }
            if let Some(pct) = self.progress.get(&task.id) {
                progress.report(Some(*pct), format!("{} at {pct}%", task.id));
            }

            let delay = self
                .delays
                .get(&task.id)
                .copied()
                .unwrap_or(self.default_delay);
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.records.lock().unwrap().push(Execution {
                id: task.id.clone(),
                role: task.role.clone(),
                wave: task.wave,
                upstream: task.upstream.keys().cloned().collect(),
                started,
                finished: Instant::now(),
            });

            if self.panicking.contains(&task.id) {
                panic!("scripted panic in task {}", task.id);
            }
            if self.failing.contains(&task.id) {
                return TaskOutcome::Failure(format!("scripted failure of {}", task.id));
            }
            let payload = self
                .payloads
                .get(&task.id)
                .cloned()
                .unwrap_or_else(|| json!({ "task": task.id, "role": task.role }));
            TaskOutcome::Success(payload)
        })
    }
}
