//! Testing utilities and mock implementations.
//!
//! Lets the import pipeline and the HTTP surface be exercised end to end
//! without reaching the real archive.
//!
//! # Example
//!
//! ```rust,ignore
//! use vodingest_core::testing::{fixtures, MockSourceClient};
//!
//! let source = MockSourceClient::new();
//! source.add_item(fixtures::movie("detour_1945", "Detour")).await;
//!
//! // Use in AppState...
//! ```

mod mock_source;

pub use mock_source::{MockSourceClient, RecordedCall};

use std::collections::HashSet;

use crate::catalog::{CatalogError, CatalogStats, NewCatalogEntry, VideoCatalog, VideoCatalogEntry};

/// A catalog whose storage is always unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCatalog;

impl UnavailableCatalog {
    fn error() -> CatalogError {
        CatalogError::Database("database is locked".to_string())
    }
}

impl VideoCatalog for UnavailableCatalog {
    fn exists(&self, _source_id: &str) -> Result<bool, CatalogError> {
        Err(Self::error())
    }

    fn existing_source_ids(&self, _source_ids: &[String]) -> Result<HashSet<String>, CatalogError> {
        Err(Self::error())
    }

    fn insert(&self, _entry: NewCatalogEntry) -> Result<VideoCatalogEntry, CatalogError> {
        Err(Self::error())
    }

    fn get(&self, _id: i64) -> Result<VideoCatalogEntry, CatalogError> {
        Err(Self::error())
    }

    fn delete(&self, _id: i64) -> Result<(), CatalogError> {
        Err(Self::error())
    }

    fn set_active(&self, _id: i64, _active: bool) -> Result<VideoCatalogEntry, CatalogError> {
        Err(Self::error())
    }

    fn toggle_active(&self, _id: i64) -> Result<VideoCatalogEntry, CatalogError> {
        Err(Self::error())
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        Err(Self::error())
    }
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::catalog::NewCatalogEntry;
    use crate::source::{ItemDescriptor, SubtitleTrack};

    /// A complete, importable movie.
    pub fn movie(source_id: &str, title: &str) -> ItemDescriptor {
        ItemDescriptor {
            source_id: source_id.to_string(),
            title: title.to_string(),
            year: Some(1948),
            duration_seconds: Some(5400),
            language: Some("English".to_string()),
            downloads: 1000,
            thumbnail_url: Some(format!("https://archive.org/services/img/{}", source_id)),
            video_url: Some(format!(
                "https://archive.org/download/{0}/{0}.mp4",
                source_id
            )),
            has_subtitles: false,
            description: Some(format!("{} - a public domain classic", title)),
            subjects: vec!["drama".to_string()],
            collections: Vec::new(),
        }
    }

    /// `count` movies with ids `{prefix}-0 .. {prefix}-{count-1}`, most downloaded first.
    pub fn movies(prefix: &str, count: usize) -> Vec<ItemDescriptor> {
        (0..count)
            .map(|i| {
                let mut item = movie(&format!("{}-{}", prefix, i), &format!("{} {}", prefix, i));
                item.downloads = (count - i) as u64 * 100;
                item
            })
            .collect()
    }

    pub fn subtitle(source_id: &str, language: &str) -> SubtitleTrack {
        let file_name = format!("{}.{}.srt", source_id, language);
        SubtitleTrack {
            url: format!("https://archive.org/download/{}/{}", source_id, file_name),
            file_name,
            format: "srt".to_string(),
            language: Some(language.to_string()),
        }
    }

    /// A catalog row ready for `VideoCatalog::insert`.
    pub fn catalog_entry(source_id: &str) -> NewCatalogEntry {
        NewCatalogEntry {
            source_id: source_id.to_string(),
            title: format!("Imported {}", source_id),
            category: "Feature Films".to_string(),
            year: Some(1948),
            duration_seconds: 5400,
            language: "English".to_string(),
            has_subtitles: false,
            video_url: format!("https://archive.org/download/{0}/{0}.mp4", source_id),
            thumbnail_url: format!("https://archive.org/services/img/{}", source_id),
        }
    }
}
