//! Write-only telemetry reported by the execution layer
//!
//! The scheduler never stores statistics itself beyond a few global counters;
//! it reports what happened to an injected [`TelemetrySink`] and forgets it.

use crate::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One executed generation of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSample {
    /// Task name (telemetry groups by name, not id)
    pub task: String,
    /// Clock reading when the run started
    pub start: Timestamp,
    /// Run duration in nanoseconds
    pub duration: u64,
}

impl TaskSample {
    pub fn new(task: impl Into<String>, start: Timestamp, duration: u64) -> Self {
        Self {
            task: task.into(),
            start,
            duration,
        }
    }
}

/// Monotonic counters the scheduler bumps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Counter {
    /// A generation ran to completion
    Executed,
    /// Dequeued while not ready and pushed back (retry mode)
    Retried,
    /// Parked in the waiting set at submission (precompute mode)
    Waited,
    /// The run returned an error or panicked
    Faulted,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Counter::Executed => "executed",
            Counter::Retried => "retried",
            Counter::Waited => "waited",
            Counter::Faulted => "faulted",
        };
        f.write_str(name)
    }
}

/// Receiver for scheduler telemetry
///
/// Called from worker threads on the hot path; implementations should be
/// cheap and must not block for long.
pub trait TelemetrySink: Send + Sync {
    fn record_sample(&self, sample: TaskSample);

    fn record_counter(&self, task: &str, counter: Counter);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn record_sample(&self, _sample: TaskSample) {}

    fn record_counter(&self, _task: &str, _counter: Counter) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_display() {
        assert_eq!(Counter::Executed.to_string(), "executed");
        assert_eq!(Counter::Faulted.to_string(), "faulted");
    }

    #[test]
    fn test_noop_accepts_everything() {
        let sink: &dyn TelemetrySink = &NoopTelemetry;
        sink.record_sample(TaskSample::new("a", 1, 2));
        sink.record_counter("a", Counter::Retried);
    }
}
