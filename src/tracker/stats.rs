// src/tracker/stats.rs

use std::time::Duration;

/// Running aggregate for one worker role.
///
/// The sum and count are retained and the average is derived on demand, so
/// repeated updates never accumulate rounding error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerRoleStats {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    /// Total elapsed time of successfully completed tasks.
    pub total_elapsed: Duration,
}

impl WorkerRoleStats {
    pub fn record_start(&mut self) {
        self.active += 1;
    }

    pub fn record_success(&mut self, elapsed: Duration) {
        self.active = self.active.saturating_sub(1);
        self.completed += 1;
        self.total_elapsed += elapsed;
    }

    pub fn record_failure(&mut self) {
        self.active = self.active.saturating_sub(1);
        self.failed += 1;
    }

    /// Average duration of completed tasks, `None` before the first completion.
    pub fn average(&self) -> Option<Duration> {
        let count = u32::try_from(self.completed).ok().filter(|c| *c > 0)?;
        Some(self.total_elapsed / count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_is_derived_from_sum_and_count() {
        let mut stats = WorkerRoleStats::default();
        assert_eq!(stats.average(), None);

        stats.record_start();
        stats.record_start();
        stats.record_start();
        assert_eq!(stats.active, 3);

        stats.record_success(Duration::from_millis(100));
        stats.record_success(Duration::from_millis(300));
        stats.record_failure();

        assert_eq!(stats.active, 0);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total_elapsed, Duration::from_millis(400));
        assert_eq!(stats.average(), Some(Duration::from_millis(200)));
    }

    #[test]
    fn active_count_never_underflows() {
        let mut stats = WorkerRoleStats::default();
        stats.record_failure();
        assert_eq!(stats.active, 0);
    }
}
