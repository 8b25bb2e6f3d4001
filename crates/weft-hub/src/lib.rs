//! Weft Hub - Worker-pool scheduler for weft behaviours
//!
//! This crate runs `weft-core` tasks on a pool of worker threads.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler (stopped | running)
//!  │
//!  └── Session (one per start)
//!       ├── ReadyQueue      ← runnable tasks, FIFO
//!       ├── WaitingSet      ← stale at submission (precompute mode)
//!       ├── idle registry   ← workers with nothing to do
//!       └── Worker[]        ← local queue + slice loop
//! ```
//!
//! ## Key Components
//!
//! - [`Scheduler`]: start/stop lifecycle, submission, `is_busy`, stats
//! - [`SchedulingMode`]: how (and whether) readiness is enforced
//! - [`SchedulerConfig`]: mode, worker count and idle backoff, loadable from RON
//! - [`GenerationLatch`] / [`Latched`]: blocking end-of-generation barrier
//!
//! ## Guarantees
//!
//! 1. **A task is never run by two workers at once** - tasks move by value
//! 2. **A task faults alone** - errors and panics drop that task only
//! 3. **Restarts start clean** - every queue belongs to the session
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::time::Duration;
//! use weft_core::{Behaviour, Continuation, Signal};
//! use weft_hub::{Scheduler, SchedulingMode};
//!
//! let scheduler = Scheduler::new();
//! scheduler.start_with(SchedulingMode::OrderedPrecompute, 2).unwrap();
//!
//! let runs = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&runs);
//! let ticker = Behaviour::builder("ticker", Signal::new(0u32)).step(move |step| {
//!     let next = step.current() + 1;
//!     step.write(next);
//!     counter.fetch_add(1, Ordering::SeqCst);
//!     Ok((next < 3).into())
//! });
//! scheduler.submit(Box::new(ticker)).unwrap();
//!
//! while runs.load(Ordering::SeqCst) < 3 {
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! assert!(scheduler.wait_idle(Duration::from_secs(5)));
//! scheduler.stop();
//! ```

mod config;
mod error;
mod latch;
mod mode;
mod queue;
mod scheduler;
mod session;
mod stats;
mod worker;

pub use config::{max_workers, SchedulerConfig};
pub use error::{Error, Result};
pub use latch::{GenerationLatch, Latched};
pub use mode::SchedulingMode;
pub use scheduler::Scheduler;
pub use stats::SchedulerStats;
