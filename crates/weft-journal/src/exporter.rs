//! Export session reports to various formats

use crate::journal::SessionReport;
use crate::{Error, Result};
use std::fmt::Write as _;
use std::io::Write;

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// RON format (Rust Object Notation)
    Ron,
    /// JSON format (requires serde_json feature)
    Json,
    /// CSV format (one row per task)
    Csv,
    /// Human-readable text format
    Text,
}

impl ExportFormat {
    /// Conventional file extension
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Ron => "ron",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Text => "log",
        }
    }
}

/// Exporter for a finished session
pub struct Exporter<'a> {
    report: &'a SessionReport,
}

impl<'a> Exporter<'a> {
    /// Create a new exporter
    pub fn new(report: &'a SessionReport) -> Self {
        Self { report }
    }

    /// Export to a string in the specified format
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Ron => self.to_ron(),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Text => Ok(self.to_text()),
        }
    }

    /// Export to a writer
    pub fn export_to<W: Write>(&self, writer: &mut W, format: ExportFormat) -> Result<()> {
        let content = self.export(format)?;
        writer.write_all(content.as_bytes())?;
        Ok(())
    }

    /// Suggested file name: `<stem>.<ext>`
    pub fn file_name(&self, format: ExportFormat) -> String {
        format!("{}.{}", self.report.file_stem(), format.extension())
    }

    /// Export to RON format
    pub fn to_ron(&self) -> Result<String> {
        ron::ser::to_string_pretty(self.report, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Export to JSON format
    #[cfg(feature = "serde_json")]
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self.report).map_err(|e| Error::Serialization(e.to_string()))
    }

    #[cfg(not(feature = "serde_json"))]
    pub fn to_json(&self) -> Result<String> {
        Err(Error::ExportError(
            "JSON export requires the 'serde_json' feature".to_string(),
        ))
    }

    /// Per-task statistics, one row per task name
    pub fn to_csv(&self) -> String {
        let mut output = String::new();
        output.push_str(
            "task,executed,retried,waited,faulted,total_runtime_ns,mean_runtime_ns,std_dev_ns\n",
        );

        for (name, stats) in &self.report.tasks {
            let std_dev = stats
                .std_dev()
                .map(|s| format!("{:.1}", s))
                .unwrap_or_default();
            let _ = writeln!(
                output,
                "{},{},{},{},{},{},{:.1},{}",
                csv_field(name),
                stats.executed,
                stats.retried,
                stats.waited,
                stats.faulted,
                stats.total_runtime_ns,
                stats.mean_runtime_ns,
                std_dev
            );
        }

        output
    }

    /// Raw samples: name, start, runtime
    pub fn samples_csv(&self) -> String {
        let mut output = String::from("task,start_ns,runtime_ns\n");
        for sample in &self.report.samples {
            let _ = writeln!(
                output,
                "{},{},{}",
                csv_field(&sample.task),
                sample.start,
                sample.duration
            );
        }
        output
    }

    /// Export to human-readable text format
    pub fn to_text(&self) -> String {
        let report = self.report;
        let totals = &report.totals;
        let mut output = String::new();

        output.push_str("=== Session Report ===\n\n");
        let _ = writeln!(output, "Description: {}", report.description);
        if let Some(mode) = &report.scheduling_mode {
            let _ = writeln!(output, "Scheduling: {}", mode);
        }
        let _ = writeln!(output, "Started: {}", report.started_at.to_rfc3339());
        match report.workers {
            Some(n) => {
                let _ = writeln!(output, "Workers: {}", n);
            }
            None => output.push_str("Workers: unknown\n"),
        }
        let _ = writeln!(output, "Duration: {:.3}s", report.duration_secs);
        let _ = writeln!(output, "Tasks executed: {}", totals.executed);
        let _ = writeln!(output, "Not ready when retrieved: {}", totals.retried);
        let _ = writeln!(output, "Not ready for immediate rerun: {}", totals.waited);
        let _ = writeln!(output, "Faulted: {}", totals.faulted);
        let _ = writeln!(output, "Combined runtime: {}ns", totals.runtime_ns);

        output.push_str("\n=== Tasks ===\n\n");
        for (name, stats) in &report.tasks {
            let _ = write!(output, "  {} x{}", name, stats.executed);
            if stats.retried > 0 {
                let _ = write!(output, " retried={}", stats.retried);
            }
            if stats.waited > 0 {
                let _ = write!(output, " waited={}", stats.waited);
            }
            if stats.faulted > 0 {
                let _ = write!(output, " faulted={}", stats.faulted);
            }
            if stats.timed_runs > 0 {
                let _ = write!(output, " mean={:.0}ns", stats.mean_runtime_ns);
            }
            output.push('\n');
        }

        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
