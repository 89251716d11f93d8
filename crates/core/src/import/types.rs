//! Types for the import pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::VideoCatalogEntry;

/// Per-request import options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    /// Skip items already in the catalog instead of failing on the duplicate.
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    /// Verify subtitle tracks with the archive before flagging an entry.
    #[serde(default)]
    pub sync_subtitles: bool,
    /// Category override. Collection jobs set this to the collection's name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            skip_existing: true,
            sync_subtitles: false,
            category: None,
        }
    }
}

/// Why a single item failed to import.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Already in catalog: {0}")]
    DuplicateKey(String),

    #[error("Persistence error: {0}")]
    PersistenceError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ImportError {
    /// Stable snake_case code for metrics and API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            ImportError::SourceUnavailable(_) => "source_unavailable",
            ImportError::ItemNotFound(_) => "item_not_found",
            ImportError::InvalidMetadata(_) => "invalid_metadata",
            ImportError::DuplicateKey(_) => "duplicate_key",
            ImportError::PersistenceError(_) => "persistence_error",
            ImportError::Internal(_) => "internal_error",
        }
    }
}

/// Result of importing one item.
#[derive(Debug, Clone, PartialEq)]
pub enum ImportOutcome {
    Imported { entry: VideoCatalogEntry },
    Skipped { source_id: String, reason: String },
    Failed { source_id: String, error: ImportError },
}

impl ImportOutcome {
    pub fn source_id(&self) -> &str {
        match self {
            ImportOutcome::Imported { entry } => &entry.source_id,
            ImportOutcome::Skipped { source_id, .. } => source_id,
            ImportOutcome::Failed { source_id, .. } => source_id,
        }
    }

    /// Metric labels: (result, reason).
    pub(crate) fn labels(&self) -> (&'static str, &'static str) {
        match self {
            ImportOutcome::Imported { .. } => ("imported", ""),
            ImportOutcome::Skipped { .. } => ("skipped", "already_imported"),
            ImportOutcome::Failed { error, .. } => ("failed", error.code()),
        }
    }
}

/// An item skipped by the deduplicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedItem {
    pub source_id: String,
    pub reason: String,
}

/// An item that failed to import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub source_id: String,
    pub error: ImportError,
}

/// Partitioned outcomes of a batch, in completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub imported: Vec<VideoCatalogEntry>,
    pub skipped: Vec<SkippedItem>,
    pub failed: Vec<FailedItem>,
}

impl BatchReport {
    pub fn push(&mut self, outcome: ImportOutcome) {
        match outcome {
            ImportOutcome::Imported { entry } => self.imported.push(entry),
            ImportOutcome::Skipped { source_id, reason } => {
                self.skipped.push(SkippedItem { source_id, reason })
            }
            ImportOutcome::Failed { source_id, error } => {
                self.failed.push(FailedItem { source_id, error })
            }
        }
    }

    /// Number of items accounted for.
    pub fn total(&self) -> usize {
        self.imported.len() + self.skipped.len() + self.failed.len()
    }
}

impl FromIterator<ImportOutcome> for BatchReport {
    fn from_iter<I: IntoIterator<Item = ImportOutcome>>(iter: I) -> Self {
        let mut report = BatchReport::default();
        for outcome in iter {
            report.push(outcome);
        }
        report
    }
}
