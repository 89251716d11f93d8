//! Types returned by the external archive.

use serde::{Deserialize, Serialize};

/// Metadata for a single archive item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDescriptor {
    /// Archive identifier (the dedup key).
    pub source_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub downloads: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    /// Streamable media URL. Only present on full item lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(default)]
    pub has_subtitles: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub subjects: Vec<String>,
    /// Archive collections this item belongs to.
    #[serde(default)]
    pub collections: Vec<String>,
}

impl ItemDescriptor {
    /// Minimal descriptor with only an id and title.
    pub fn new(source_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            year: None,
            duration_seconds: None,
            language: None,
            downloads: 0,
            thumbnail_url: None,
            video_url: None,
            has_subtitles: false,
            description: None,
            subjects: Vec::new(),
            collections: Vec::new(),
        }
    }

    /// Whether this descriptor carries everything needed to build a catalog entry.
    pub fn is_complete(&self) -> bool {
        self.video_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// One page of a collection listing. Pages are 1-indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionPage {
    pub items: Vec<ItemDescriptor>,
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

impl CollectionPage {
    /// Whether no page follows this one.
    pub fn is_last(&self) -> bool {
        self.items.is_empty() || self.page >= self.pages
    }
}

/// Subtitle file attached to an archive item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleTrack {
    pub file_name: String,
    pub url: String,
    /// "srt" or "vtt".
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}
