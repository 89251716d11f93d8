use std::sync::Arc;

use tracing::{debug, info, warn};

use super::dedup::{DedupDecision, Deduplicator};
use super::types::{ImportError, ImportOptions, ImportOutcome};
use crate::catalog::{CatalogError, NewCatalogEntry, VideoCatalog};
use crate::collections::CollectionRegistry;
use crate::metrics;
use crate::source::{ItemDescriptor, SourceClient, SourceError};

pub const UNCATEGORIZED: &str = "Uncategorized";

/// Imports one archive item into the catalog.
///
/// Every path ends in an [`ImportOutcome`]; nothing here panics or aborts
/// a surrounding batch.
pub struct ImportExecutor {
    source: Arc<dyn SourceClient>,
    catalog: Arc<dyn VideoCatalog>,
    dedup: Deduplicator,
    registry: Arc<CollectionRegistry>,
}

impl ImportExecutor {
    pub fn new(
        source: Arc<dyn SourceClient>,
        catalog: Arc<dyn VideoCatalog>,
        registry: Arc<CollectionRegistry>,
    ) -> Self {
        Self {
            source,
            dedup: Deduplicator::new(catalog.clone()),
            catalog,
            registry,
        }
    }

    /// Import by identifier, fetching full metadata from the archive.
    pub async fn import_one(&self, source_id: &str, options: &ImportOptions) -> ImportOutcome {
        let outcome = self.run(source_id, None, options).await;
        record(&outcome);
        outcome
    }

    /// Import an item that was already listed. The descriptor is reused
    /// when it carries a video URL; otherwise full metadata is fetched.
    pub async fn import_item(&self, item: ItemDescriptor, options: &ImportOptions) -> ImportOutcome {
        let source_id = item.source_id.clone();
        let prefetched = item.is_complete().then_some(item);
        let outcome = self.run(&source_id, prefetched, options).await;
        record(&outcome);
        outcome
    }

    async fn run(
        &self,
        source_id: &str,
        prefetched: Option<ItemDescriptor>,
        options: &ImportOptions,
    ) -> ImportOutcome {
        if let DedupDecision::Skip { reason } = self.dedup.decide(source_id, options.skip_existing) {
            debug!("Skipping {}: {}", source_id, reason);
            return ImportOutcome::Skipped {
                source_id: source_id.to_string(),
                reason,
            };
        }

        match self.try_import(source_id, prefetched, options).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!("Import of {} failed: {}", source_id, error);
                ImportOutcome::Failed {
                    source_id: source_id.to_string(),
                    error,
                }
            }
        }
    }

    async fn try_import(
        &self,
        source_id: &str,
        prefetched: Option<ItemDescriptor>,
        options: &ImportOptions,
    ) -> Result<ImportOutcome, ImportError> {
        let item = match prefetched {
            Some(item) => item,
            None => self
                .source
                .fetch_item(source_id)
                .await
                .map_err(|e| match e {
                    SourceError::NotFound(_) => ImportError::ItemNotFound(source_id.to_string()),
                    other => ImportError::SourceUnavailable(other.to_string()),
                })?,
        };

        let mut entry = build_entry(&item, options, &self.registry)?;

        if options.sync_subtitles && item.has_subtitles {
            entry.has_subtitles = self.verify_subtitles(source_id).await;
        }

        let entry = self.catalog.insert(entry).map_err(|e| match e {
            CatalogError::DuplicateKey(id) => ImportError::DuplicateKey(id),
            other => ImportError::PersistenceError(other.to_string()),
        })?;

        info!(
            "Imported {} as video {} ({})",
            entry.source_id, entry.id, entry.category
        );
        Ok(ImportOutcome::Imported { entry })
    }

    /// Best effort: any failure leaves the entry without subtitles.
    async fn verify_subtitles(&self, source_id: &str) -> bool {
        match self.source.fetch_subtitles(source_id).await {
            Ok(tracks) if !tracks.is_empty() => {
                debug!("{} has {} subtitle track(s)", source_id, tracks.len());
                true
            }
            Ok(_) => {
                warn!("{} advertised subtitles but has no tracks", source_id);
                false
            }
            Err(e) => {
                warn!("Subtitle sync failed for {}: {}", source_id, e);
                false
            }
        }
    }
}

fn record(outcome: &ImportOutcome) {
    let (result, reason) = outcome.labels();
    metrics::IMPORT_OUTCOMES
        .with_label_values(&[result, reason])
        .inc();
}

/// Map archive metadata to a catalog row.
///
/// Category precedence: explicit option, first known collection, first
/// subject, then [`UNCATEGORIZED`].
pub fn build_entry(
    item: &ItemDescriptor,
    options: &ImportOptions,
    registry: &CollectionRegistry,
) -> Result<NewCatalogEntry, ImportError> {
    let title = item.title.trim();
    if title.is_empty() {
        return Err(ImportError::InvalidMetadata(format!(
            "{} has no title",
            item.source_id
        )));
    }

    let video_url = item
        .video_url
        .as_deref()
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            ImportError::InvalidMetadata(format!("{} has no playable video file", item.source_id))
        })?;

    let category = options
        .category
        .clone()
        .filter(|c| !c.trim().is_empty())
        .or_else(|| registry.category_for(&item.collections))
        .or_else(|| {
            item.subjects
                .iter()
                .map(|s| s.trim())
                .find(|s| !s.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNCATEGORIZED.to_string());

    Ok(NewCatalogEntry {
        source_id: item.source_id.clone(),
        title: title.to_string(),
        category,
        year: item.year,
        duration_seconds: item.duration_seconds.unwrap_or(0),
        language: item.language.clone().unwrap_or_default(),
        has_subtitles: item.has_subtitles,
        video_url: video_url.to_string(),
        thumbnail_url: item.thumbnail_url.clone().unwrap_or_default(),
    })
}
