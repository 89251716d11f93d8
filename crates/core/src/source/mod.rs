//! External archive integration.
//!
//! The [`SourceClient`] trait is the only way the pipeline talks to the
//! archive. [`ArchiveClient`] implements it against the Internet Archive's
//! search and metadata APIs, behind a client-side token bucket and a bounded
//! retry loop for transient failures.

mod archive;
mod rate_limiter;
mod retry;
mod types;

pub use archive::{parse_runtime, ArchiveClient};
pub use rate_limiter::{RateLimiter, TokenBucket};
pub use retry::with_retry;
pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when talking to the archive.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Network failure, timeout, 5xx or 429. Retryable.
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// The item identifier is unknown to the archive.
    #[error("Item not found: {0}")]
    NotFound(String),

    /// The collection key is unknown to the archive.
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// The archive answered with something we could not understand.
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl SourceError {
    /// Whether retrying the same request might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }

    /// Short label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            SourceError::Unavailable(_) => "unavailable",
            SourceError::NotFound(_) => "not_found",
            SourceError::CollectionNotFound(_) => "collection_not_found",
            SourceError::Parse(_) => "parse_error",
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Parse(e.to_string())
        } else {
            SourceError::Unavailable(e.to_string())
        }
    }
}

/// Read access to the external archive.
#[async_trait]
pub trait SourceClient: Send + Sync {
    /// Free-text search over movie items.
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<ItemDescriptor>, SourceError>;

    /// List one page of a collection, most downloaded first.
    async fn list_collection(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<CollectionPage, SourceError>;

    /// Full metadata for one item, including its streamable URL.
    async fn fetch_item(&self, source_id: &str) -> Result<ItemDescriptor, SourceError>;

    /// Approximate number of movie items in a collection.
    async fn collection_count(&self, key: &str) -> Result<u64, SourceError>;

    /// Subtitle files attached to an item.
    async fn fetch_subtitles(&self, source_id: &str) -> Result<Vec<SubtitleTrack>, SourceError>;
}
