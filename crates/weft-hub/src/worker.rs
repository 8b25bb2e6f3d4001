//! Worker threads and their handles
//!
//! A worker repeatedly drains its local queue, then takes a scheduling
//! slice. A worker that found nothing to do drops to minimum priority and
//! backs off by parking with a timeout; a handoff restores normal priority
//! and unparks it.

use crate::session::Session;
use crossbeam_queue::SegQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, Thread};
use tracing::{debug, trace, warn};
use weft_core::{Continuation, Error, Stopwatch, TaskBox, TaskSample};

/// Execution priority of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Priority {
    /// Idle; backs off between polls
    Minimum,
    /// Working or just handed work
    Normal,
}

impl Priority {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Priority::Minimum,
            _ => Priority::Normal,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Priority::Minimum => 0,
            Priority::Normal => 1,
        }
    }
}

/// Shared view of one worker thread
pub(crate) struct WorkerHandle {
    index: usize,
    local: SegQueue<TaskBox>,
    idle: AtomicBool,
    priority: AtomicU8,
    thread: OnceLock<Thread>,
}

impl WorkerHandle {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            local: SegQueue::new(),
            idle: AtomicBool::new(false),
            priority: AtomicU8::new(Priority::Normal.as_u8()),
            thread: OnceLock::new(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn priority(&self) -> Priority {
        Priority::from_u8(self.priority.load(Ordering::Acquire))
    }

    pub fn set_priority(&self, priority: Priority) {
        self.priority.store(priority.as_u8(), Ordering::Release);
    }

    /// Flag the worker idle; false if it already was
    pub fn mark_idle(&self) -> bool {
        self.idle
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Take the worker out of the idle state; false if someone else already did
    pub fn claim(&self) -> bool {
        self.idle
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Queue a task for this worker and wake it
    pub fn hand(&self, task: TaskBox) {
        self.set_priority(Priority::Normal);
        self.local.push(task);
        self.unpark();
    }

    pub fn unpark(&self) {
        if let Some(thread) = self.thread.get() {
            thread.unpark();
        }
    }

    pub fn has_local(&self) -> bool {
        !self.local.is_empty()
    }

    pub fn clear_local(&self) -> usize {
        let mut dropped = 0;
        while self.local.pop().is_some() {
            dropped += 1;
        }
        dropped
    }

    fn bind_current_thread(&self) {
        let _ = self.thread.set(thread::current());
    }
}

/// Body of a worker thread
pub(crate) fn run(session: Arc<Session>, handle: Arc<WorkerHandle>) {
    handle.bind_current_thread();
    debug!(worker = handle.index(), "worker started");

    while !session.is_shutting_down() {
        drain_local(&session, &handle);
        session.slice(&handle);
        match handle.priority() {
            Priority::Minimum => thread::park_timeout(session.idle_backoff()),
            Priority::Normal => thread::yield_now(),
        }
    }

    debug!(worker = handle.index(), "worker stopped");
}

fn drain_local(session: &Session, handle: &WorkerHandle) {
    while let Some(task) = handle.local.pop() {
        if session.is_shutting_down() {
            // remaining local work is discarded with the session
            session.finish_dispatch();
            return;
        }
        execute(session, handle.index(), task);
    }
}

/// Run one generation of `task`, containing any fault to this task
fn execute(session: &Session, worker: usize, mut task: TaskBox) {
    let watch = Stopwatch::start();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.run()));
    session.record_sample(TaskSample::new(
        task.name(),
        watch.started_at(),
        watch.elapsed(),
    ));

    match outcome {
        Ok(Ok(Continuation::Continue)) => {
            session.note_executed(task.name());
            session.resubmit(task);
        }
        Ok(Ok(Continuation::Terminate)) => {
            session.note_executed(task.name());
            trace!(worker, task = %task.id(), name = task.name(), "task terminated");
        }
        Ok(Err(err)) => fault(session, worker, task, err),
        Err(payload) => {
            let err = Error::from_panic(task.name(), payload.as_ref());
            fault(session, worker, task, err);
        }
    }
    session.finish_dispatch();
}

fn fault(session: &Session, worker: usize, task: TaskBox, err: Error) {
    warn!(worker, task = %task.id(), name = task.name(), error = %err, "task faulted; dropping it");
    session.note_faulted(task.name());
}
