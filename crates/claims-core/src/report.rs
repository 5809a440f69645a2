//! Audit report and its sinks
//!
//! The report is written once at the end of a run. The file layout is:
//!
//! ```json
//! {
//!   "runId": "...",
//!   "timestamp": "2026-01-31T10:15:00.123+01:00",
//!   "mode": "apply",
//!   "cancelled": false,
//!   "stats": { "total": 3, "migrated": 1, "already_has_claims": 1, "no_store": 1, "errors": 0 },
//!   "results": [ { "userId": "u1", "email": "a@x.com", "status": "migrated", "storeId": "S1", "role": "owner" } ]
//! }
//! ```

use crate::config::{MigrationConfig, RunMode};
use crate::error::ReportError;
use crate::types::{MigrationOutcome, RunId, RunStats};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Durable record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Run identifier
    pub run_id: RunId,
    /// When the run started
    pub timestamp: DateTime<Local>,
    /// Dry run or apply
    pub mode: RunMode,
    /// Stopped early by cancellation
    pub cancelled: bool,
    /// Counts per status
    pub stats: RunStats,
    /// Outcomes in processing order
    pub results: Vec<MigrationOutcome>,
}

impl RunReport {
    /// Build a report; counts are derived from `results`
    #[must_use]
    pub fn new(
        run_id: RunId,
        timestamp: DateTime<Local>,
        mode: RunMode,
        cancelled: bool,
        results: Vec<MigrationOutcome>,
    ) -> Self {
        Self {
            run_id,
            timestamp,
            mode,
            cancelled,
            stats: RunStats::from_outcomes(&results),
            results,
        }
    }

    /// Stored counts match a recount of `results`
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stats == RunStats::from_outcomes(&self.results) && self.stats.total == self.results.len()
    }
}

/// Destination for finished reports
pub trait ReportSink: Send + Sync {
    /// Persist `report`, returning where it went
    ///
    /// # Errors
    /// Any serialization or storage failure.
    fn persist(&self, report: &RunReport) -> Result<String, ReportError>;
}

const MAX_NAME_SUFFIX: u32 = 99;

/// Writes `<prefix>_<YYYYmmdd_HHMMSS>.json` into a directory
#[derive(Debug, Clone)]
pub struct JsonFileReportSink {
    dir: PathBuf,
    prefix: String,
}

impl JsonFileReportSink {
    /// Sink writing into `dir`
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Sink configured from a [`MigrationConfig`]
    #[must_use]
    pub fn from_config(config: &MigrationConfig) -> Self {
        Self::new(&config.report_dir, &config.report_prefix)
    }

    /// Target directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for a run started at `timestamp`
    #[must_use]
    pub fn file_name(&self, timestamp: &DateTime<Local>) -> String {
        format!("{}_{}.json", self.prefix, timestamp.format("%Y%m%d_%H%M%S"))
    }

    /// Full path for a run started at `timestamp`
    #[must_use]
    pub fn path_for(&self, timestamp: &DateTime<Local>) -> PathBuf {
        self.dir.join(self.file_name(timestamp))
    }

    /// `path_for` with `_<attempt>` before the extension when `attempt > 0`
    fn candidate(&self, timestamp: &DateTime<Local>, attempt: u32) -> PathBuf {
        if attempt == 0 {
            return self.path_for(timestamp);
        }
        self.dir.join(format!(
            "{}_{}_{attempt}.json",
            self.prefix,
            timestamp.format("%Y%m%d_%H%M%S")
        ))
    }
}

impl ReportSink for JsonFileReportSink {
    fn persist(&self, report: &RunReport) -> Result<String, ReportError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ReportError::io_error(&self.dir, e))?;

        // Write-once: never clobber an earlier run's audit trail. Runs started
        // within the same second get a numeric suffix.
        let mut attempt = 0;
        let (file, path) = loop {
            let path = self.candidate(&report.timestamp, attempt);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break (file, path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_SUFFIX => {
                    tracing::debug!(path = %path.display(), "report name taken");
                    attempt += 1;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    return Err(ReportError::AlreadyExists(path));
                }
                Err(e) => return Err(ReportError::io_error(&path, e)),
            }
        };

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer
            .write_all(b"\n")
            .map_err(|e| ReportError::io_error(&path, e))?;
        writer.flush().map_err(|e| ReportError::io_error(&path, e))?;

        tracing::info!(path = %path.display(), "report written");
        Ok(path.display().to_string())
    }
}
