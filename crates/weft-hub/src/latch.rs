//! Generation latch for external drivers
//!
//! A driver that wants "tick N+1 only after every tick-N task finished"
//! wraps each task in [`Latched`] and blocks on the shared
//! [`GenerationLatch`] instead of polling `is_busy`.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};
use weft_core::{Continuation, NodeId, Result, Task, TaskBox};

/// Countdown that releases waiters when it reaches zero
#[derive(Debug, Default)]
pub struct GenerationLatch {
    remaining: Mutex<usize>,
    zero: Condvar,
}

impl GenerationLatch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            zero: Condvar::new(),
        }
    }

    /// Re-arm for the next generation
    pub fn reset(&self, count: usize) {
        let mut remaining = self.remaining.lock();
        *remaining = count;
        if count == 0 {
            self.zero.notify_all();
        }
    }

    /// Record one completion; saturates at zero
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock();
        if *remaining == 0 {
            return;
        }
        *remaining -= 1;
        if *remaining == 0 {
            self.zero.notify_all();
        }
    }

    pub fn count(&self) -> usize {
        *self.remaining.lock()
    }

    /// Block until the count reaches zero; false on timeout
    pub fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut remaining = self.remaining.lock();
        while *remaining > 0 {
            if self.zero.wait_until(&mut remaining, deadline).timed_out() {
                return *remaining == 0;
            }
        }
        true
    }
}

/// A task that counts a latch down after every run, including faulted ones
pub struct Latched {
    inner: TaskBox,
    latch: Arc<GenerationLatch>,
}

impl Latched {
    pub fn new(inner: TaskBox, latch: Arc<GenerationLatch>) -> Self {
        Self { inner, latch }
    }

    pub fn boxed(inner: TaskBox, latch: Arc<GenerationLatch>) -> TaskBox {
        Box::new(Self::new(inner, latch))
    }
}

struct CountDownOnDrop<'a>(&'a GenerationLatch);

impl Drop for CountDownOnDrop<'_> {
    fn drop(&mut self) {
        self.0.count_down();
    }
}

impl Task for Latched {
    fn id(&self) -> NodeId {
        self.inner.id()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    fn run(&mut self) -> Result<Continuation> {
        let _guard = CountDownOnDrop(&self.latch);
        self.inner.run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use weft_core::{Behaviour, Error, Signal};

    #[test]
    fn test_count_down_saturates() {
        let latch = GenerationLatch::new(2);
        latch.count_down();
        latch.count_down();
        latch.count_down();
        assert_eq!(latch.count(), 0);
        assert!(latch.wait(Duration::ZERO));
    }

    #[test]
    fn test_wait_times_out() {
        let latch = GenerationLatch::new(1);
        assert!(!latch.wait(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_released_from_other_thread() {
        let latch = Arc::new(GenerationLatch::new(3));
        let workers: Vec<_> = (0..3)
            .map(|_| {
                let latch = Arc::clone(&latch);
                thread::spawn(move || latch.count_down())
            })
            .collect();
        assert!(latch.wait(Duration::from_secs(5)));
        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn test_latched_counts_failed_runs() {
        let latch = Arc::new(GenerationLatch::new(2));
        let ok = Behaviour::builder("ok", Signal::new(0u8)).step(|_| Ok(Continuation::Terminate));
        let bad = Behaviour::builder("bad", Signal::new(0u8))
            .step(|step| Err(Error::fault(step.name(), "nope")));

        let mut ok = Latched::new(Box::new(ok), Arc::clone(&latch));
        let mut bad = Latched::new(Box::new(bad), Arc::clone(&latch));
        assert_eq!(ok.name(), "ok");
        assert!(ok.run().is_ok());
        assert!(bad.run().is_err());
        assert_eq!(latch.count(), 0);
    }

    #[test]
    fn test_reset_rearms() {
        let latch = GenerationLatch::new(0);
        latch.reset(1);
        assert_eq!(latch.count(), 1);
        latch.count_down();
        assert!(latch.wait(Duration::ZERO));
    }
}
