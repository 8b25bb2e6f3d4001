//! Weft Journal - Per-task execution statistics and export
//!
//! This crate plugs into the scheduler's telemetry hooks to provide:
//!
//! - **StatsJournal**: a `TelemetrySink` aggregating counts and runtime moments per task name
//! - **SessionReport**: the frozen result of one recorded session
//! - **Exporter**: render a report as RON, JSON, CSV or text
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft_hub::{Scheduler, SchedulingMode};
//! use weft_journal::{Exporter, ExportFormat, JournalConfig, JournalMode, StatsJournal};
//!
//! let journal = Arc::new(StatsJournal::new(JournalConfig::new(JournalMode::Sample)));
//! let scheduler = Scheduler::with_telemetry(journal.clone());
//!
//! journal.start_session("convoy", Some(4));
//! scheduler.start_with(SchedulingMode::OrderedRetry, 4)?;
//! // ... submit behaviours, drive ticks ...
//! scheduler.stop();
//!
//! let report = journal.finish_session()?;
//! println!("{}", Exporter::new(&report).export(ExportFormat::Text)?);
//! ```

mod error;
mod exporter;
mod journal;
mod stats;

pub use error::{Error, Result};
pub use exporter::{ExportFormat, Exporter};
pub use journal::{JournalConfig, JournalMode, SessionReport, SessionTotals, StatsJournal};
pub use stats::TaskStats;

// Re-export core telemetry types for convenience
pub use weft_core::{Counter, TaskSample, TelemetrySink};
