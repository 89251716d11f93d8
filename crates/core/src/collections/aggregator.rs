use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{CollectionDescriptor, CollectionRegistry};
use crate::source::SourceClient;

#[derive(Debug, Default)]
struct CountCache {
    counts: HashMap<String, u64>,
    refreshed_at: Option<Instant>,
}

/// Collects approximate sizes for every registered collection.
///
/// Counts are cached for `ttl`; a failed count keeps the previous value.
pub struct CollectionStatsAggregator {
    source: Arc<dyn SourceClient>,
    registry: Arc<CollectionRegistry>,
    ttl: Duration,
    cache: RwLock<CountCache>,
    refresh_lock: Mutex<()>,
}

impl CollectionStatsAggregator {
    pub fn new(source: Arc<dyn SourceClient>, registry: Arc<CollectionRegistry>, ttl: Duration) -> Self {
        Self {
            source,
            registry,
            ttl,
            cache: RwLock::new(CountCache::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &CollectionRegistry {
        &self.registry
    }

    /// Descriptors with counts, refreshing from the archive if the cache is stale.
    pub async fn get_collection_stats(&self) -> Vec<CollectionDescriptor> {
        if !self.is_fresh().await {
            let _guard = self.refresh_lock.lock().await;
            // Another caller may have refreshed while we waited.
            if !self.is_fresh().await {
                self.refresh().await;
            }
        }
        self.cached().await
    }

    /// Descriptors with the last known counts. Never touches the archive.
    pub async fn cached(&self) -> Vec<CollectionDescriptor> {
        let cache = self.cache.read().await;
        self.registry
            .all()
            .iter()
            .map(|c| {
                let mut descriptor = c.clone();
                if let Some(count) = cache.counts.get(&c.key) {
                    descriptor.approximate_count = Some(*count);
                }
                descriptor
            })
            .collect()
    }

    /// Query every collection count concurrently and update the cache.
    pub async fn refresh(&self) {
        let source = &self.source;
        let results = join_all(self.registry.all().iter().map(|c| async move {
            (c.key.clone(), source.collection_count(&c.key).await)
        }))
        .await;

        let mut cache = self.cache.write().await;
        let mut updated = 0;
        for (key, result) in results {
            match result {
                Ok(count) => {
                    cache.counts.insert(key, count);
                    updated += 1;
                }
                Err(e) => {
                    warn!("Failed to count collection {}: {}", key, e);
                }
            }
        }
        cache.refreshed_at = Some(Instant::now());

        debug!(
            "Collection stats refreshed: {}/{} counts updated",
            updated,
            self.registry.all().len()
        );
    }

    async fn is_fresh(&self) -> bool {
        self.cache
            .read()
            .await
            .refreshed_at
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Refresh counts every `interval` in the background.
    pub fn spawn_refresh(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!(
            "Collection stats refresh scheduled every {}s",
            interval.as_secs()
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.refresh().await;
            }
        })
    }
}
