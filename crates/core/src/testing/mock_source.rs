//! Mock archive client for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::source::{CollectionPage, ItemDescriptor, SourceClient, SourceError, SubtitleTrack};

/// A recorded call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Search { query: String, limit: u32 },
    ListCollection { key: String, page: u32, page_size: u32 },
    FetchItem(String),
    CollectionCount(String),
    FetchSubtitles(String),
}

/// Mock implementation of the [`SourceClient`] trait.
///
/// Provides controllable behavior for testing:
/// - In-memory items and collections
/// - Recorded calls
/// - Per-item, per-page and per-collection error injection
/// - Per-item panics
/// - Artificial latency and peak concurrency tracking for `fetch_item`
///
/// Collection listings mirror the real archive: listed descriptors carry no
/// video URL, so importing them requires a `fetch_item` per item.
///
/// # Example
///
/// ```rust,ignore
/// use vodingest_core::testing::{fixtures, MockSourceClient};
///
/// let source = MockSourceClient::new();
/// source.add_collection("feature_films", fixtures::movies("ff", 25)).await;
/// source.set_item_error("ff-3", SourceError::Unavailable("503".into())).await;
///
/// // ... run imports ...
///
/// assert!(source.max_in_flight() <= 4);
/// ```
#[derive(Debug, Default)]
pub struct MockSourceClient {
    items: Arc<RwLock<HashMap<String, ItemDescriptor>>>,
    /// Collection key -> ordered item ids.
    collections: Arc<RwLock<HashMap<String, Vec<String>>>>,
    subtitles: Arc<RwLock<HashMap<String, Vec<SubtitleTrack>>>>,
    calls: Arc<RwLock<Vec<RecordedCall>>>,
    item_errors: Arc<RwLock<HashMap<String, SourceError>>>,
    /// Ids whose `fetch_item` panics.
    panicking_items: Arc<RwLock<HashSet<String>>>,
    page_errors: Arc<RwLock<HashMap<(String, u32), SourceError>>>,
    count_errors: Arc<RwLock<HashMap<String, SourceError>>>,
    subtitle_error: Arc<RwLock<Option<SourceError>>>,
    /// If set, the next call of any kind fails with this error.
    next_error: Arc<RwLock<Option<SourceError>>>,
    latency: Arc<RwLock<Duration>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockSourceClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a single item.
    pub async fn add_item(&self, item: ItemDescriptor) {
        self.items
            .write()
            .await
            .insert(item.source_id.clone(), item);
    }

    /// Append items to a collection (created if missing).
    pub async fn add_collection(&self, key: &str, items: Vec<ItemDescriptor>) {
        let mut collections = self.collections.write().await;
        let members = collections.entry(key.to_string()).or_default();
        let mut store = self.items.write().await;
        for mut item in items {
            if !item.collections.iter().any(|c| c == key) {
                item.collections.push(key.to_string());
            }
            members.push(item.source_id.clone());
            store.insert(item.source_id.clone(), item);
        }
    }

    pub async fn set_subtitles(&self, source_id: &str, tracks: Vec<SubtitleTrack>) {
        self.subtitles
            .write()
            .await
            .insert(source_id.to_string(), tracks);
    }

    /// Make every `fetch_item` for this id fail.
    pub async fn set_item_error(&self, source_id: &str, error: SourceError) {
        self.item_errors
            .write()
            .await
            .insert(source_id.to_string(), error);
    }

    /// Make every `fetch_item` for this id panic.
    pub async fn set_item_panic(&self, source_id: &str) {
        self.panicking_items
            .write()
            .await
            .insert(source_id.to_string());
    }

    /// Make listing `page` of `key` fail.
    pub async fn set_page_error(&self, key: &str, page: u32, error: SourceError) {
        self.page_errors
            .write()
            .await
            .insert((key.to_string(), page), error);
    }

    pub async fn set_count_error(&self, key: &str, error: SourceError) {
        self.count_errors
            .write()
            .await
            .insert(key.to_string(), error);
    }

    /// Make every `fetch_subtitles` fail.
    pub async fn set_subtitle_error(&self, error: SourceError) {
        *self.subtitle_error.write().await = Some(error);
    }

    pub async fn set_next_error(&self, error: SourceError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay applied to every call.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.write().await = latency;
    }

    pub async fn recorded_calls(&self) -> Vec<RecordedCall> {
        self.calls.read().await.clone()
    }

    pub async fn clear_recorded(&self) {
        self.calls.write().await.clear();
    }

    /// Number of `list_collection` calls so far.
    pub async fn list_calls(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, RecordedCall::ListCollection { .. }))
            .count()
    }

    /// Number of `fetch_item` calls so far.
    pub async fn fetch_calls(&self) -> usize {
        self.calls
            .read()
            .await
            .iter()
            .filter(|c| matches!(c, RecordedCall::FetchItem(_)))
            .count()
    }

    /// Highest number of concurrent `fetch_item` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn begin(&self, call: RecordedCall) -> Result<(), SourceError> {
        self.calls.write().await.push(call);

        let latency = *self.latency.read().await;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match self.next_error.write().await.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Listing descriptor: what the search API returns for an item.
    fn listed(item: &ItemDescriptor) -> ItemDescriptor {
        ItemDescriptor {
            video_url: None,
            has_subtitles: false,
            ..item.clone()
        }
    }
}

#[async_trait]
impl SourceClient for MockSourceClient {
    async fn search(&self, query: &str, limit: u32) -> Result<Vec<ItemDescriptor>, SourceError> {
        self.begin(RecordedCall::Search {
            query: query.to_string(),
            limit,
        })
        .await?;

        let needle = query.to_lowercase();
        let items = self.items.read().await;
        let mut matches: Vec<ItemDescriptor> = items
            .values()
            .filter(|i| i.title.to_lowercase().contains(&needle))
            .map(Self::listed)
            .collect();
        matches.sort_by(|a, b| b.downloads.cmp(&a.downloads).then(a.source_id.cmp(&b.source_id)));
        matches.truncate(limit as usize);
        Ok(matches)
    }

    async fn list_collection(
        &self,
        key: &str,
        page: u32,
        page_size: u32,
    ) -> Result<CollectionPage, SourceError> {
        self.begin(RecordedCall::ListCollection {
            key: key.to_string(),
            page,
            page_size,
        })
        .await?;

        if let Some(error) = self.page_errors.read().await.get(&(key.to_string(), page)) {
            return Err(error.clone());
        }

        let collections = self.collections.read().await;
        let members = collections
            .get(key)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| SourceError::CollectionNotFound(key.to_string()))?;

        let page = page.max(1);
        let page_size = page_size.max(1) as usize;
        let total = members.len();
        let pages = total.div_ceil(page_size) as u32;

        let items = self.items.read().await;
        let page_items = members
            .iter()
            .skip((page as usize - 1) * page_size)
            .take(page_size)
            .filter_map(|id| items.get(id))
            .map(Self::listed)
            .collect();

        Ok(CollectionPage {
            items: page_items,
            page,
            pages,
            total: total as u64,
        })
    }

    async fn fetch_item(&self, source_id: &str) -> Result<ItemDescriptor, SourceError> {
        if self.panicking_items.read().await.contains(source_id) {
            panic!("malformed archive record for {}", source_id);
        }

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let result = async {
            self.begin(RecordedCall::FetchItem(source_id.to_string()))
                .await?;

            if let Some(error) = self.item_errors.read().await.get(source_id) {
                return Err(error.clone());
            }

            self.items
                .read()
                .await
                .get(source_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(source_id.to_string()))
        }
        .await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn collection_count(&self, key: &str) -> Result<u64, SourceError> {
        self.begin(RecordedCall::CollectionCount(key.to_string()))
            .await?;

        if let Some(error) = self.count_errors.read().await.get(key) {
            return Err(error.clone());
        }

        Ok(self
            .collections
            .read()
            .await
            .get(key)
            .map(|m| m.len() as u64)
            .unwrap_or(0))
    }

    async fn fetch_subtitles(&self, source_id: &str) -> Result<Vec<SubtitleTrack>, SourceError> {
        self.begin(RecordedCall::FetchSubtitles(source_id.to_string()))
            .await?;

        if let Some(error) = self.subtitle_error.read().await.clone() {
            return Err(error);
        }

        Ok(self
            .subtitles
            .read()
            .await
            .get(source_id)
            .cloned()
            .unwrap_or_default())
    }
}
