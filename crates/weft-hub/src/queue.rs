//! Shared task queues of one scheduler session
//!
//! - `ReadyQueue` - lock-free FIFO of runnable tasks
//! - `WaitingSet` - tasks that were stale at submission (precompute mode)

use crossbeam_queue::SegQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use weft_core::TaskBox;

/// FIFO of tasks eligible to run
#[derive(Default)]
pub(crate) struct ReadyQueue {
    tasks: SegQueue<TaskBox>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, task: TaskBox) {
        self.tasks.push(task);
    }

    pub fn pop(&self) -> Option<TaskBox> {
        self.tasks.pop()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop everything queued, returning how many tasks were discarded
    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.tasks.pop().is_some() {
            dropped += 1;
        }
        dropped
    }
}

/// Tasks that failed their readiness check at submission
///
/// Submitters never contend with a rescan: they push onto an unsorted
/// inbox, and whichever worker wins the `try_lock` folds the inbox into the
/// parked list and promotes whatever has become ready.
#[derive(Default)]
pub(crate) struct WaitingSet {
    inbox: SegQueue<TaskBox>,
    parked: Mutex<Vec<TaskBox>>,
    parked_len: AtomicUsize,
}

impl WaitingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn park(&self, task: TaskBox) {
        self.inbox.push(task);
    }

    /// Move every task that is now ready into `ready`
    ///
    /// Returns `None` without blocking if another worker holds the scan lock,
    /// otherwise the number of promoted tasks.
    pub fn try_promote(&self, ready: &ReadyQueue) -> Option<usize> {
        let mut parked = self.parked.try_lock()?;
        while let Some(task) = self.inbox.pop() {
            parked.push(task);
        }

        let mut promoted = 0;
        for task in std::mem::take(&mut *parked) {
            if task.is_ready() {
                ready.push(task);
                promoted += 1;
            } else {
                parked.push(task);
            }
        }
        self.parked_len.store(parked.len(), Ordering::Release);
        Some(promoted)
    }

    /// Tasks waiting, including ones not yet folded in from the inbox
    pub fn len(&self) -> usize {
        self.inbox.len() + self.parked_len.load(Ordering::Acquire)
    }

    pub fn clear(&self) -> usize {
        let mut dropped = 0;
        while self.inbox.pop().is_some() {
            dropped += 1;
        }
        let mut parked = self.parked.lock();
        dropped += parked.len();
        parked.clear();
        self.parked_len.store(0, Ordering::Release);
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use weft_core::{Behaviour, Continuation, NodeId, Result, Signal, Task};

    struct Gate {
        id: NodeId,
        open: Arc<AtomicBool>,
    }

    impl Task for Gate {
        fn id(&self) -> NodeId {
            self.id
        }

        fn name(&self) -> &str {
            "gate"
        }

        fn is_ready(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn run(&mut self) -> Result<Continuation> {
            Ok(Continuation::Terminate)
        }
    }

    fn gate(open: &Arc<AtomicBool>) -> TaskBox {
        Box::new(Gate {
            id: NodeId::next(),
            open: Arc::clone(open),
        })
    }

    #[test]
    fn test_ready_queue_is_fifo() {
        let open = Arc::new(AtomicBool::new(true));
        let queue = ReadyQueue::new();
        let first = gate(&open);
        let first_id = first.id();
        queue.push(first);
        queue.push(gate(&open));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop().unwrap().id(), first_id);
        assert_eq!(queue.clear(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_promotion_waits_for_readiness() {
        let open = Arc::new(AtomicBool::new(false));
        let ready = ReadyQueue::new();
        let waiting = WaitingSet::new();

        waiting.park(gate(&open));
        assert_eq!(waiting.len(), 1);

        assert_eq!(waiting.try_promote(&ready), Some(0));
        assert!(ready.is_empty());
        assert_eq!(waiting.len(), 1);

        open.store(true, Ordering::SeqCst);
        assert_eq!(waiting.try_promote(&ready), Some(1));
        assert_eq!(ready.len(), 1);
        assert_eq!(waiting.len(), 0);
    }

    #[test]
    fn test_promotion_skips_when_contended() {
        let open = Arc::new(AtomicBool::new(true));
        let ready = ReadyQueue::new();
        let waiting = WaitingSet::new();
        waiting.park(gate(&open));

        let guard = waiting.parked.lock();
        assert_eq!(waiting.try_promote(&ready), None);
        drop(guard);

        assert_eq!(waiting.try_promote(&ready), Some(1));
    }

    #[test]
    fn test_stale_behaviour_promoted_after_producer_advances() {
        let mut producer = Signal::with_timestamp(0i64, 1_000);
        let consumer = Behaviour::builder("consumer", Signal::with_timestamp(0i64, 1_300))
            .depends_on(producer.reader())
            .delta_threshold(100)
            .step(|_| Ok(Continuation::Terminate));

        let ready = ReadyQueue::new();
        let waiting = WaitingSet::new();
        waiting.park(Box::new(consumer));

        assert_eq!(waiting.try_promote(&ready), Some(0));

        producer.write_at(1, 1_250);
        assert_eq!(waiting.try_promote(&ready), Some(1));
        assert_eq!(ready.pop().unwrap().name(), "consumer");
    }

    #[test]
    fn test_clear_counts_inbox_and_parked() {
        let open = Arc::new(AtomicBool::new(false));
        let ready = ReadyQueue::new();
        let waiting = WaitingSet::new();
        waiting.park(gate(&open));
        waiting.try_promote(&ready);
        waiting.park(gate(&open));

        assert_eq!(waiting.len(), 2);
        assert_eq!(waiting.clear(), 2);
        assert_eq!(waiting.len(), 0);
    }
}
