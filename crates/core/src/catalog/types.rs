//! Types for the local VOD catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A movie materialized into the platform catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoCatalogEntry {
    /// Catalog-local id, assigned on insert.
    pub id: i64,
    /// Archive identifier. Unique across the catalog.
    pub source_id: String,
    pub title: String,
    pub category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub duration_seconds: u32,
    pub language: String,
    pub has_subtitles: bool,
    pub video_url: String,
    pub thumbnail_url: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the importer; the catalog assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCatalogEntry {
    pub source_id: String,
    pub title: String,
    pub category: String,
    pub year: Option<i32>,
    pub duration_seconds: u32,
    pub language: String,
    pub has_subtitles: bool,
    pub video_url: String,
    pub thumbnail_url: String,
}

/// Entry count for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub name: String,
    pub count: u64,
}

/// Catalog statistics for the admin dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStats {
    pub total: u64,
    pub with_subtitles: u64,
    pub without_subtitles: u64,
    /// Largest categories first.
    pub categories: Vec<CategoryCount>,
    /// Newest entries first.
    pub recent_imports: Vec<VideoCatalogEntry>,
}

/// Errors for catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Insert rejected by the unique constraint on `source_id`.
    #[error("Duplicate source id: {0}")]
    DuplicateKey(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
