use std::sync::Arc;
use std::time::Duration;

use vodingest_core::{
    Authenticator, BatchCoordinator, CollectionRegistry, CollectionStatsAggregator, Config,
    ImportExecutor, JobStore, JobTracker, SanitizedConfig, SourceClient, VideoCatalog, WorkerPool,
};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    source: Arc<dyn SourceClient>,
    catalog: Arc<dyn VideoCatalog>,
    coordinator: Arc<BatchCoordinator>,
    tracker: Arc<JobTracker>,
    aggregator: Arc<CollectionStatsAggregator>,
}

impl AppState {
    /// Wire the import pipeline around a source, a catalog and a job store.
    ///
    /// One worker pool of `import.workers` permits is shared by single,
    /// batch and collection imports.
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        source: Arc<dyn SourceClient>,
        catalog: Arc<dyn VideoCatalog>,
        jobs: Arc<JobStore>,
    ) -> Self {
        let registry = Arc::new(CollectionRegistry::new(&config.collections));

        let executor = Arc::new(ImportExecutor::new(
            Arc::clone(&source),
            Arc::clone(&catalog),
            Arc::clone(&registry),
        ));
        let coordinator = Arc::new(BatchCoordinator::new(
            executor,
            WorkerPool::new(config.import.workers),
        ));
        let tracker = Arc::new(JobTracker::new(
            Arc::clone(&source),
            Arc::clone(&coordinator),
            jobs,
            Arc::clone(&registry),
            config.import.page_size,
            config.import.max_collection_limit,
        ));
        let aggregator = Arc::new(CollectionStatsAggregator::new(
            Arc::clone(&source),
            registry,
            Duration::from_secs(config.import.stats_cache_ttl_secs),
        ));

        Self {
            config,
            authenticator,
            source,
            catalog,
            coordinator,
            tracker,
            aggregator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn source(&self) -> &dyn SourceClient {
        self.source.as_ref()
    }

    pub fn catalog(&self) -> &Arc<dyn VideoCatalog> {
        &self.catalog
    }

    pub fn coordinator(&self) -> &BatchCoordinator {
        &self.coordinator
    }

    pub fn tracker(&self) -> &JobTracker {
        &self.tracker
    }

    pub fn aggregator(&self) -> &Arc<CollectionStatsAggregator> {
        &self.aggregator
    }

    pub fn registry(&self) -> &CollectionRegistry {
        self.aggregator.registry()
    }
}
