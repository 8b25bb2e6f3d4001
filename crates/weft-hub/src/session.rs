//! One running period of the scheduler
//!
//! Everything a session owns (queues, idle registry, counters) is created
//! by `start` and discarded by `stop`, so nothing leaks across restarts.

use crate::config::SchedulerConfig;
use crate::mode::SchedulingMode;
use crate::queue::{ReadyQueue, WaitingSet};
use crate::stats::{Counters, SchedulerStats};
use crate::worker::{Priority, WorkerHandle};
use crossbeam_queue::SegQueue;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use weft_core::{Counter, TaskBox, TaskSample, TelemetrySink};

pub(crate) struct Session {
    mode: SchedulingMode,
    idle_backoff: Duration,
    ready: ReadyQueue,
    waiting: WaitingSet,
    idle: SegQueue<Arc<WorkerHandle>>,
    idle_count: AtomicUsize,
    workers: Vec<Arc<WorkerHandle>>,
    in_flight: AtomicUsize,
    shutdown: AtomicBool,
    counters: Counters,
    telemetry: Arc<dyn TelemetrySink>,
}

impl Session {
    pub fn new(config: &SchedulerConfig, telemetry: Arc<dyn TelemetrySink>) -> Self {
        let workers = (0..config.worker_count())
            .map(|i| Arc::new(WorkerHandle::new(i)))
            .collect();
        Self {
            mode: config.mode(),
            idle_backoff: config.idle_backoff(),
            ready: ReadyQueue::new(),
            waiting: WaitingSet::new(),
            idle: SegQueue::new(),
            idle_count: AtomicUsize::new(0),
            workers,
            in_flight: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            counters: Counters::default(),
            telemetry,
        }
    }

    pub fn mode(&self) -> SchedulingMode {
        self.mode
    }

    pub fn workers(&self) -> &[Arc<WorkerHandle>] {
        &self.workers
    }

    pub fn idle_backoff(&self) -> Duration {
        self.idle_backoff
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Ask every worker to exit at its next loop boundary
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in &self.workers {
            worker.unpark();
        }
    }

    /// Queue a task according to the session's mode
    pub fn submit(&self, task: TaskBox) {
        self.counters.bump_submitted();
        if self.mode.uses_waiting_set() && !task.is_ready() {
            self.note(task.name(), Counter::Waited);
            trace!(task = %task.id(), name = task.name(), "parked in waiting set");
            self.waiting.park(task);
        } else {
            self.ready.push(task);
        }
    }

    /// Resubmission of a task that asked to continue
    pub fn resubmit(&self, task: TaskBox) {
        if self.is_shutting_down() {
            trace!(task = %task.id(), "dropping continuation during shutdown");
            return;
        }
        self.submit(task);
    }

    /// One scheduling slice for `worker`
    ///
    /// Hands tasks to idle workers while both exist, then keeps one task
    /// for the caller. A caller that finds nothing goes idle unless it is
    /// the last non-idle worker or still holds handed-off work.
    pub fn slice(&self, worker: &Arc<WorkerHandle>) {
        if self.is_shutting_down() {
            return;
        }

        let mut task = self.next_task();
        while task.is_some() && self.idle_count.load(Ordering::Acquire) > 0 {
            let Some(idle) = self.idle.pop() else {
                break;
            };
            if !idle.claim() {
                // stale registration; the worker woke up on its own
                continue;
            }
            self.idle_count.fetch_sub(1, Ordering::AcqRel);
            if Arc::ptr_eq(&idle, worker) {
                // our own registration; the task stays with us
                break;
            }
            if let Some(t) = task.take() {
                trace!(from = worker.index(), to = idle.index(), "handing task to idle worker");
                self.dispatch(&idle, t);
            }
            task = self.next_task();
        }

        match task {
            Some(t) => {
                if worker.claim() {
                    self.idle_count.fetch_sub(1, Ordering::AcqRel);
                }
                self.dispatch(worker, t);
            }
            None if worker.has_local() => worker.set_priority(Priority::Normal),
            None => {
                if self.idle_count.load(Ordering::Acquire) + 1 < self.workers.len() {
                    worker.set_priority(Priority::Minimum);
                    if worker.mark_idle() {
                        self.idle_count.fetch_add(1, Ordering::AcqRel);
                        self.idle.push(Arc::clone(worker));
                    }
                }
            }
        }
    }

    /// `task` already counts as in flight since it left the ready queue
    fn dispatch(&self, worker: &WorkerHandle, task: TaskBox) {
        worker.hand(task);
    }

    /// A dispatched task has been run (or discarded)
    pub fn finish_dispatch(&self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    /// Pop a ready task, counting it in flight before it leaves the queue
    fn take_ready(&self) -> Option<TaskBox> {
        if self.ready.is_empty() {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let task = self.ready.pop();
        if task.is_none() {
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        task
    }

    /// Put a taken task back at the tail and release its in-flight count
    fn requeue(&self, task: TaskBox) {
        self.ready.push(task);
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }

    fn next_task(&self) -> Option<TaskBox> {
        match self.mode {
            SchedulingMode::Unordered => self.take_ready(),
            SchedulingMode::OrderedRetry => self.next_retry(),
            SchedulingMode::OrderedPrecompute => self.next_precompute(),
        }
    }

    /// Dequeue the first ready task, cycling stale ones to the tail
    ///
    /// Bounded to one pass over the queue so a queue of stale tasks yields
    /// back to the worker loop (and its shutdown check) between passes.
    fn next_retry(&self) -> Option<TaskBox> {
        let mut budget = self.ready.len() + 1;
        while budget > 0 {
            let task = self.take_ready()?;
            if task.is_ready() {
                return Some(task);
            }
            self.note(task.name(), Counter::Retried);
            self.requeue(task);
            budget -= 1;
        }
        None
    }

    fn next_precompute(&self) -> Option<TaskBox> {
        let task = self.take_ready();
        if let Some(promoted) = self.waiting.try_promote(&self.ready) {
            if promoted > 0 {
                trace!(promoted, "promoted waiting tasks");
            }
        }
        task.or_else(|| self.take_ready())
    }

    /// Whether work is queued or a task taken off the queue has not finished
    pub fn is_busy(&self) -> bool {
        !self.ready.is_empty() || self.in_flight.load(Ordering::Acquire) > 0
    }

    pub fn record_sample(&self, sample: TaskSample) {
        self.telemetry.record_sample(sample);
    }

    pub fn note_executed(&self, task: &str) {
        self.note(task, Counter::Executed);
    }

    pub fn note_faulted(&self, task: &str) {
        self.note(task, Counter::Faulted);
    }

    fn note(&self, task: &str, counter: Counter) {
        self.counters.bump(counter);
        self.telemetry.record_counter(task, counter);
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: true,
            mode: Some(self.mode),
            worker_count: self.workers.len(),
            idle_workers: self.idle_count.load(Ordering::Acquire),
            ready: self.ready.len(),
            waiting: self.waiting.len(),
            in_flight: self.in_flight.load(Ordering::Acquire),
            ..self.counters.snapshot()
        }
    }

    /// Drop all queued work; called once the workers have exited
    pub fn discard(&self) -> usize {
        let local: usize = self.workers.iter().map(|w| w.clear_local()).sum();
        let dropped = self.ready.clear() + self.waiting.clear() + local;
        while self.idle.pop().is_some() {}
        self.idle_count.store(0, Ordering::Release);
        self.in_flight.store(0, Ordering::Release);
        if dropped > 0 {
            debug!(dropped, "discarded queued tasks");
        }
        dropped
    }
}
