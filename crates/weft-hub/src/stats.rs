//! Point-in-time scheduler statistics

use crate::mode::SchedulingMode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use weft_core::Counter;

/// Snapshot returned by `Scheduler::stats`
///
/// Counters reset with every `start`. A stopped scheduler reports the
/// default (all zero, `running == false`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub running: bool,
    pub mode: Option<SchedulingMode>,
    pub worker_count: usize,
    pub idle_workers: usize,
    /// Tasks in the ready queue
    pub ready: usize,
    /// Tasks in the waiting set (precompute mode)
    pub waiting: usize,
    /// Tasks handed to a worker and not yet finished
    pub in_flight: usize,
    pub submitted: u64,
    pub executed: u64,
    pub retried: u64,
    pub waited: u64,
    pub faulted: u64,
}

impl fmt::Display for SchedulerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Some(mode) => write!(
                f,
                "{} x{} (idle {}): ready={} waiting={} in_flight={} executed={} retried={} waited={} faulted={}",
                mode,
                self.worker_count,
                self.idle_workers,
                self.ready,
                self.waiting,
                self.in_flight,
                self.executed,
                self.retried,
                self.waited,
                self.faulted
            ),
            None => f.write_str("stopped"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    submitted: AtomicU64,
    executed: AtomicU64,
    retried: AtomicU64,
    waited: AtomicU64,
    faulted: AtomicU64,
}

impl Counters {
    pub fn bump_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bump(&self, counter: Counter) {
        let slot = match counter {
            Counter::Executed => &self.executed,
            Counter::Retried => &self.retried,
            Counter::Waited => &self.waited,
            Counter::Faulted => &self.faulted,
        };
        slot.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            waited: self.waited.load(Ordering::Relaxed),
            faulted: self.faulted.load(Ordering::Relaxed),
            ..SchedulerStats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.bump_submitted();
        counters.bump(Counter::Executed);
        counters.bump(Counter::Executed);
        counters.bump(Counter::Faulted);

        let stats = counters.snapshot();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.executed, 2);
        assert_eq!(stats.faulted, 1);
        assert_eq!(stats.retried, 0);
        assert!(!stats.running);
    }

    #[test]
    fn test_stopped_display() {
        assert_eq!(SchedulerStats::default().to_string(), "stopped");
    }
}
