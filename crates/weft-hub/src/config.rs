//! Scheduler Configuration - Worker count, scheduling mode and idle backoff
//!
//! The configuration is fixed for one running period: `Scheduler::start`
//! takes a copy, and changing it requires a stop/start cycle.
//!
//! Configurations can be written in RON, the same format used for the rest
//! of a session's data files:
//!
//! ```
//! use weft_hub::{SchedulerConfig, SchedulingMode};
//!
//! let config = SchedulerConfig::from_ron_str(
//!     "(mode: OrderedRetry, worker_count: 2, idle_backoff_us: 500)",
//! ).unwrap();
//! assert_eq!(config.mode(), SchedulingMode::OrderedRetry);
//! assert_eq!(config.worker_count(), 2.min(weft_hub::max_workers()));
//! ```

use crate::error::{Error, Result};
use crate::mode::SchedulingMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_IDLE_BACKOFF_US: u64 = 200;

/// Configuration for one scheduler session
///
/// # Example
///
/// ```
/// use weft_hub::{SchedulerConfig, SchedulingMode};
///
/// let config = SchedulerConfig::new(SchedulingMode::Unordered, 4);
/// assert_eq!(config.worker_count(), 4.min(weft_hub::max_workers()));
/// assert_eq!(config.mode(), SchedulingMode::Unordered);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Readiness policy for the session
    mode: SchedulingMode,
    /// Number of worker threads, clamped to `[1, max_workers()]`
    worker_count: usize,
    /// How long an idle (minimum priority) worker parks between polls
    idle_backoff_us: u64,
}

impl SchedulerConfig {
    /// Create a configuration with the given mode and worker count
    ///
    /// The worker count is clamped to `[1, max_workers()]`.
    pub fn new(mode: SchedulingMode, worker_count: usize) -> Self {
        Self {
            mode,
            worker_count: clamp_workers(worker_count),
            idle_backoff_us: DEFAULT_IDLE_BACKOFF_US,
        }
    }

    /// Parse a RON configuration; missing fields take their defaults
    pub fn from_ron_str(content: &str) -> Result<Self> {
        let config: SchedulerConfig =
            ron::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        Ok(config.normalized())
    }

    /// Render as pretty RON
    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))
    }

    pub fn with_mode(mut self, mode: SchedulingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_worker_count(mut self, n: usize) -> Self {
        self.worker_count = clamp_workers(n);
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff_us = u64::try_from(backoff.as_micros()).unwrap_or(u64::MAX);
        self
    }

    pub fn mode(&self) -> SchedulingMode {
        self.mode
    }

    /// Get the configured worker count
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Set the number of workers
    ///
    /// The value is clamped to `[1, max_workers()]`.
    pub fn set_worker_count(&mut self, n: usize) {
        self.worker_count = clamp_workers(n);
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_micros(self.idle_backoff_us)
    }

    /// Returns true when `worker_count == 1`
    pub fn is_single_worker(&self) -> bool {
        self.worker_count == 1
    }

    fn normalized(mut self) -> Self {
        self.worker_count = clamp_workers(self.worker_count);
        self
    }
}

impl Default for SchedulerConfig {
    /// Precompute mode with one worker per logical CPU
    fn default() -> Self {
        Self {
            mode: SchedulingMode::default(),
            worker_count: max_workers(),
            idle_backoff_us: DEFAULT_IDLE_BACKOFF_US,
        }
    }
}

fn clamp_workers(n: usize) -> usize {
    n.clamp(1, max_workers())
}

/// Get the maximum number of workers on this system
///
/// This uses the `num_cpus` crate to detect the number of logical CPUs.
///
/// # Example
///
/// ```
/// use weft_hub::max_workers;
///
/// assert!(max_workers() >= 1);
/// ```
pub fn max_workers() -> usize {
    num_cpus::get().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.mode(), SchedulingMode::OrderedPrecompute);
        assert_eq!(config.worker_count(), max_workers());
        assert_eq!(config.idle_backoff(), Duration::from_micros(200));
    }

    #[test]
    fn test_worker_count_clamped_minimum() {
        let config = SchedulerConfig::new(SchedulingMode::Unordered, 0);
        assert_eq!(config.worker_count(), 1);
        assert!(config.is_single_worker());
    }

    #[test]
    fn test_worker_count_clamped_maximum() {
        let config = SchedulerConfig::default().with_worker_count(10_000);
        assert_eq!(config.worker_count(), max_workers());
    }

    #[test]
    fn test_set_worker_count() {
        let mut config = SchedulerConfig::new(SchedulingMode::Unordered, 1);
        config.set_worker_count(4);
        let expected = 4.min(max_workers());
        assert_eq!(config.worker_count(), expected);
        assert_eq!(config.is_single_worker(), expected == 1);
    }

    #[test]
    fn test_from_ron_partial() {
        let config = SchedulerConfig::from_ron_str("(mode: Unordered)").unwrap();
        assert_eq!(config.mode(), SchedulingMode::Unordered);
        assert_eq!(config.worker_count(), max_workers());
    }

    #[test]
    fn test_from_ron_clamps() {
        let config = SchedulerConfig::from_ron_str("(worker_count: 0)").unwrap();
        assert_eq!(config.worker_count(), 1);
    }

    #[test]
    fn test_from_ron_rejects_unknown_mode() {
        let err = SchedulerConfig::from_ron_str("(mode: Sideways)").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_ron_output_parses_back() {
        let config = SchedulerConfig::new(SchedulingMode::OrderedRetry, 1)
            .with_idle_backoff(Duration::from_millis(1));
        let text = config.to_ron_string().unwrap();
        assert!(text.contains("OrderedRetry"));
        assert_eq!(SchedulerConfig::from_ron_str(&text).unwrap(), config);
    }
}
