//! Types for collection import jobs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::import::{BatchReport, ImportOptions};

/// Item-level failures kept on a job for the detail view.
pub const MAX_RECORDED_FAILURES: usize = 200;

/// Lifecycle of a collection import job.
///
/// `Queued -> Running -> {Completed, Failed}`. Terminal states are frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// One failed item inside a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFailure {
    pub source_id: String,
    pub reason: String,
}

/// A background import of a whole collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportJob {
    pub id: String,
    pub collection_key: String,
    pub status: JobStatus,
    /// 0-100, never decreases.
    pub progress_percent: u8,
    pub imported_count: u64,
    pub skipped_count: u64,
    pub failed_count: u64,
    pub requested_limit: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Why the job failed, for fatal errors only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub failures: Vec<JobFailure>,
    pub options: ImportOptions,
}

impl ImportJob {
    pub fn new(collection_key: &str, requested_limit: u32, options: ImportOptions) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            collection_key: collection_key.to_string(),
            status: JobStatus::Queued,
            progress_percent: 0,
            imported_count: 0,
            skipped_count: 0,
            failed_count: 0,
            requested_limit,
            started_at: Utc::now(),
            finished_at: None,
            error: None,
            failures: Vec::new(),
            options,
        }
    }

    /// Items accounted for so far.
    pub fn processed(&self) -> u64 {
        self.imported_count + self.skipped_count + self.failed_count
    }

    /// Fold one page report into the counters and recompute progress.
    pub fn apply_report(&mut self, report: &BatchReport) {
        self.imported_count += report.imported.len() as u64;
        self.skipped_count += report.skipped.len() as u64;
        self.failed_count += report.failed.len() as u64;

        let room = MAX_RECORDED_FAILURES.saturating_sub(self.failures.len());
        self.failures
            .extend(report.failed.iter().take(room).map(|f| JobFailure {
                source_id: f.source_id.clone(),
                reason: f.error.to_string(),
            }));

        let progress = progress_percent(self.processed(), self.requested_limit);
        self.progress_percent = self.progress_percent.max(progress);
    }

    pub fn complete(&mut self) {
        self.status = JobStatus::Completed;
        self.progress_percent = 100;
        self.finished_at = Some(Utc::now());
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(reason.into());
        self.finished_at = Some(Utc::now());
    }
}

/// `min(100, round(100 * processed / limit))`
pub fn progress_percent(processed: u64, limit: u32) -> u8 {
    if limit == 0 {
        return 100;
    }
    let limit = limit as u64;
    let rounded = (200 * processed + limit) / (2 * limit);
    rounded.min(100) as u8
}

/// Errors for job operations.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    /// The job already reached a terminal state and can no longer change.
    #[error("Job {0} is already finished")]
    Terminal(String),

    #[error("limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: u32, max: u32 },

    #[error("Collection key cannot be empty")]
    InvalidCollection,

    #[error("Job history error: {0}")]
    History(String),
}
