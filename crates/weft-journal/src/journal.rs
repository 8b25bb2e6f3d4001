//! StatsJournal - a `TelemetrySink` that aggregates per-task statistics
//!
//! Record a scheduler session:
//!
//! ```
//! use std::sync::Arc;
//! use weft_core::{Counter, TaskSample, TelemetrySink};
//! use weft_journal::{JournalConfig, JournalMode, StatsJournal};
//!
//! let journal = Arc::new(StatsJournal::new(JournalConfig::new(JournalMode::Detailed)));
//! journal.start_session("smoke", Some(2));
//!
//! journal.record_sample(TaskSample::new("walker", 10, 250));
//! journal.record_counter("walker", Counter::Executed);
//!
//! let report = journal.finish_session().unwrap();
//! assert_eq!(report.tasks["walker"].executed, 1);
//! assert_eq!(report.samples.len(), 1);
//! ```

use crate::error::{Error, Result};
use crate::stats::TaskStats;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tracing::{debug, info};
use weft_core::{Counter, TaskSample, TelemetrySink};

/// How much the journal keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JournalMode {
    /// Counters only
    #[default]
    Basic,
    /// Counters, runtime moments and every `sample_every`-th raw sample
    Sample,
    /// Counters, runtime moments and every raw sample
    Detailed,
}

/// Journal configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub mode: JournalMode,
    /// Keep one raw sample out of this many in `Sample` mode
    pub sample_every: u64,
    /// Upper bound on retained raw samples (0 = unlimited)
    pub max_samples: usize,
}

impl JournalConfig {
    pub fn new(mode: JournalMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            mode: JournalMode::Basic,
            sample_every: 100,
            max_samples: 1_000_000,
        }
    }
}

/// Totals across every task of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionTotals {
    pub executed: u64,
    pub retried: u64,
    pub waited: u64,
    pub faulted: u64,
    pub runtime_ns: u64,
}

/// Everything recorded between `start_session` and `finish_session`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub description: String,
    pub workers: Option<usize>,
    /// Scheduling policy the session ran under, e.g. `ORDERED_RETRY`
    #[serde(default)]
    pub scheduling_mode: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub mode: JournalMode,
    pub totals: SessionTotals,
    /// Per task name, in first-seen order
    pub tasks: IndexMap<String, TaskStats>,
    /// Retained raw samples ordered by start time
    pub samples: Vec<TaskSample>,
}

impl SessionReport {
    /// Base file name for exports: `<yyyymmddThhmmss>[_<description>][_<MODE>]`
    pub fn file_stem(&self) -> String {
        let mut stem = self.started_at.format("%Y%m%dT%H%M%S").to_string();
        for part in [Some(self.description.as_str()), self.scheduling_mode.as_deref()]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
        {
            stem.push('_');
            stem.push_str(part);
        }
        stem
    }
}

#[derive(Debug)]
struct SessionInfo {
    description: String,
    workers: Option<usize>,
    scheduling_mode: Option<String>,
    started_at: DateTime<Utc>,
    started: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    session: Option<SessionInfo>,
    tasks: IndexMap<String, TaskStats>,
    samples: Vec<TaskSample>,
    samples_seen: u64,
}

impl Inner {
    fn stats_mut(&mut self, task: &str) -> &mut TaskStats {
        if !self.tasks.contains_key(task) {
            self.tasks.insert(task.to_string(), TaskStats::new());
        }
        &mut self.tasks[task]
    }

    fn clear(&mut self) {
        self.tasks.clear();
        self.samples.clear();
        self.samples_seen = 0;
    }
}

/// Thread-safe statistics collector
#[derive(Debug)]
pub struct StatsJournal {
    config: JournalConfig,
    inner: Mutex<Inner>,
}

impl StatsJournal {
    pub fn new(config: JournalConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Begin a session, discarding anything recorded so far
    pub fn start_session(&self, description: impl Into<String>, workers: Option<usize>) {
        let description = description.into();
        let mut inner = self.inner.lock();
        inner.clear();
        info!(%description, ?workers, "journal session started");
        inner.session = Some(SessionInfo {
            description,
            workers,
            scheduling_mode: None,
            started_at: Utc::now(),
            started: Instant::now(),
        });
    }

    /// Tag the current session with the scheduler's mode; false without a session
    pub fn set_scheduling_mode(&self, mode: impl fmt::Display) -> bool {
        match self.inner.lock().session.as_mut() {
            Some(info) => {
                info.scheduling_mode = Some(mode.to_string());
                true
            }
            None => false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.inner.lock().session.is_some()
    }

    /// End the session and hand back its report
    pub fn finish_session(&self) -> Result<SessionReport> {
        let mut inner = self.inner.lock();
        let info = inner.session.take().ok_or(Error::NoSession)?;
        let report = build_report(&self.config, &inner, info);
        inner.clear();
        info!(
            description = %report.description,
            executed = report.totals.executed,
            duration_secs = report.duration_secs,
            "journal session finished"
        );
        Ok(report)
    }

    /// Stats for one task so far
    pub fn task(&self, name: &str) -> Option<TaskStats> {
        self.inner.lock().tasks.get(name).cloned()
    }

    pub fn task_count(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn sample_count(&self) -> usize {
        self.inner.lock().samples.len()
    }

    /// Fold `other` into this journal and empty it
    pub fn merge(&self, other: &StatsJournal) {
        if std::ptr::eq(self, other) {
            return;
        }
        let (tasks, samples) = {
            let mut theirs = other.inner.lock();
            theirs.samples_seen = 0;
            (
                std::mem::take(&mut theirs.tasks),
                std::mem::take(&mut theirs.samples),
            )
        };

        let mut ours = self.inner.lock();
        for (name, stats) in &tasks {
            ours.stats_mut(name).merge(stats);
        }
        ours.samples.extend(samples);
        ours.samples.sort_by_key(|s| s.start);
        debug!(tasks = tasks.len(), "merged journal");
    }

    fn keeps_sample(&self, seen: u64) -> bool {
        match self.config.mode {
            JournalMode::Basic => false,
            JournalMode::Sample => seen % self.config.sample_every.max(1) == 0,
            JournalMode::Detailed => true,
        }
    }
}

impl Default for StatsJournal {
    fn default() -> Self {
        Self::new(JournalConfig::default())
    }
}

impl TelemetrySink for StatsJournal {
    fn record_sample(&self, sample: TaskSample) {
        if self.config.mode == JournalMode::Basic {
            return;
        }
        let mut inner = self.inner.lock();
        inner.stats_mut(&sample.task).record_runtime(sample.duration);

        let seen = inner.samples_seen;
        inner.samples_seen += 1;
        let full = self.config.max_samples != 0 && inner.samples.len() >= self.config.max_samples;
        if self.keeps_sample(seen) && !full {
            inner.samples.push(sample);
        }
    }

    fn record_counter(&self, task: &str, counter: Counter) {
        let mut inner = self.inner.lock();
        let stats = inner.stats_mut(task);
        match counter {
            Counter::Executed => stats.executed += 1,
            Counter::Retried => stats.retried += 1,
            Counter::Waited => stats.waited += 1,
            Counter::Faulted => stats.faulted += 1,
        }
    }
}

fn build_report(config: &JournalConfig, inner: &Inner, info: SessionInfo) -> SessionReport {
    let totals = inner
        .tasks
        .values()
        .fold(SessionTotals::default(), |mut acc, s| {
            acc.executed += s.executed;
            acc.retried += s.retried;
            acc.waited += s.waited;
            acc.faulted += s.faulted;
            acc.runtime_ns = acc.runtime_ns.saturating_add(s.total_runtime_ns);
            acc
        });

    let mut samples = inner.samples.clone();
    samples.sort_by_key(|s| s.start);

    SessionReport {
        description: info.description,
        workers: info.workers,
        scheduling_mode: info.scheduling_mode,
        started_at: info.started_at,
        duration_secs: info.started.elapsed().as_secs_f64(),
        mode: config.mode,
        totals,
        tasks: inner.tasks.clone(),
        samples,
    }
}
