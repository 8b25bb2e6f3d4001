//! Monotonic time for signal stamping
//!
//! All timestamps are nanoseconds on a process-wide monotonic clock:
//! - `Timestamp` - A clock reading
//! - `now()` - Read the clock
//! - `Stopwatch` - Measure a run body for telemetry

use std::sync::OnceLock;
use std::time::Instant;

/// A monotonic clock reading in nanoseconds since the process anchor
pub type Timestamp = u64;

/// Tolerance used by behaviours that do not configure their own (100 µs)
pub const DEFAULT_DELTA_THRESHOLD: u64 = 100_000;

fn anchor() -> Instant {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    *ANCHOR.get_or_init(Instant::now)
}

/// Read the monotonic clock
///
/// Readings are never zero, so a zero timestamp can only come from an
/// explicit `write_at(_, 0)`.
pub fn now() -> Timestamp {
    let nanos = anchor().elapsed().as_nanos();
    u64::try_from(nanos).unwrap_or(u64::MAX).max(1)
}

/// Measures one run of a task
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start: Timestamp,
}

impl Stopwatch {
    /// Start measuring
    pub fn start() -> Self {
        Self { start: now() }
    }

    /// When the measurement started
    pub fn started_at(&self) -> Timestamp {
        self.start
    }

    /// Nanoseconds since `start()`
    pub fn elapsed(&self) -> u64 {
        now().saturating_sub(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_now_is_monotonic() {
        let a = now();
        let b = now();
        assert!(b >= a);
        assert!(a > 0);
    }

    #[test]
    fn test_stopwatch() {
        let sw = Stopwatch::start();
        std::thread::sleep(Duration::from_millis(2));
        assert!(sw.elapsed() >= 2_000_000);
        assert!(sw.started_at() <= now());
    }
}
