//! VOD catalog - the platform-side store of imported movies.
//!
//! Rows are keyed by the archive's `source_id`, which is unique. The import
//! pipeline only ever inserts; admin endpoints may delete or toggle rows.

mod sqlite;
mod types;

pub use sqlite::SqliteCatalog;
pub use types::*;

use std::collections::HashSet;

/// Trait for catalog storage.
pub trait VideoCatalog: Send + Sync {
    /// Check if an entry with this archive identifier exists.
    fn exists(&self, source_id: &str) -> Result<bool, CatalogError>;

    /// Subset of `source_ids` that already exist in the catalog.
    fn existing_source_ids(&self, source_ids: &[String]) -> Result<HashSet<String>, CatalogError>;

    /// Insert a new entry.
    ///
    /// Returns `CatalogError::DuplicateKey` when `source_id` is already present.
    fn insert(&self, entry: NewCatalogEntry) -> Result<VideoCatalogEntry, CatalogError>;

    /// Get an entry by catalog id.
    fn get(&self, id: i64) -> Result<VideoCatalogEntry, CatalogError>;

    /// Delete an entry by catalog id.
    fn delete(&self, id: i64) -> Result<(), CatalogError>;

    /// Set the visibility flag of an entry.
    fn set_active(&self, id: i64, active: bool) -> Result<VideoCatalogEntry, CatalogError>;

    /// Flip the visibility flag of an entry.
    fn toggle_active(&self, id: i64) -> Result<VideoCatalogEntry, CatalogError>;

    /// Get catalog statistics.
    fn stats(&self) -> Result<CatalogStats, CatalogError>;
}
