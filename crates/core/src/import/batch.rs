use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use super::executor::ImportExecutor;
use super::types::{BatchReport, ImportError, ImportOptions, ImportOutcome};
use crate::metrics;
use crate::source::ItemDescriptor;

/// Status of the shared worker pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolStatus {
    pub active: u64,
    pub queued: u64,
    pub max_concurrent: usize,
    pub total_processed: u64,
}

#[derive(Default)]
struct PoolStats {
    active: AtomicU64,
    queued: AtomicU64,
    total_processed: AtomicU64,
}

/// Permits for item imports, shared by every batch and every job so the
/// archive never sees more than `size` concurrent imports.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
    stats: Arc<PoolStats>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
            stats: Arc::new(PoolStats::default()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn status(&self) -> PoolStatus {
        PoolStatus {
            active: self.stats.active.load(Ordering::Relaxed),
            queued: self.stats.queued.load(Ordering::Relaxed),
            max_concurrent: self.size,
            total_processed: self.stats.total_processed.load(Ordering::Relaxed),
        }
    }

    /// Run `task` for `source_id` while holding one permit.
    ///
    /// A panic inside `task` is turned into a failed outcome, so siblings in
    /// the same batch keep running.
    async fn run<F>(&self, source_id: &str, task: F) -> ImportOutcome
    where
        F: Future<Output = ImportOutcome>,
    {
        let queued = GaugeGuard::enter(&self.stats.queued);
        let permit = self.semaphore.acquire().await;
        drop(queued);
        let Ok(_permit) = permit else {
            return failed(source_id, "worker pool closed".to_string());
        };

        let _active = GaugeGuard::enter(&self.stats.active);
        let outcome = match AssertUnwindSafe(task).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!("Import of {} panicked: {}", source_id, message);
                let outcome = failed(source_id, format!("import panicked: {}", message));
                let (result, reason) = outcome.labels();
                metrics::IMPORT_OUTCOMES
                    .with_label_values(&[result, reason])
                    .inc();
                outcome
            }
        };
        self.stats.total_processed.fetch_add(1, Ordering::Relaxed);
        outcome
    }
}

/// Increments a pool gauge and decrements it on drop, including when the
/// owning future is cancelled.
struct GaugeGuard<'a>(&'a AtomicU64);

impl<'a> GaugeGuard<'a> {
    fn enter(gauge: &'a AtomicU64) -> Self {
        gauge.fetch_add(1, Ordering::Relaxed);
        Self(gauge)
    }
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Fans a list of items out over the worker pool and partitions the outcomes.
pub struct BatchCoordinator {
    executor: Arc<ImportExecutor>,
    pool: WorkerPool,
}

impl BatchCoordinator {
    pub fn new(executor: Arc<ImportExecutor>, pool: WorkerPool) -> Self {
        Self { executor, pool }
    }

    pub fn executor(&self) -> &Arc<ImportExecutor> {
        &self.executor
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Import a single identifier through the shared pool.
    pub async fn import_single(&self, source_id: &str, options: &ImportOptions) -> ImportOutcome {
        self.pool
            .run(source_id, self.executor.import_one(source_id, options))
            .await
    }

    /// Import identifiers with bounded concurrency.
    ///
    /// Outcomes appear in completion order; every input is accounted for
    /// exactly once, duplicates included.
    pub async fn import_batch(&self, source_ids: &[String], options: &ImportOptions) -> BatchReport {
        if source_ids.is_empty() {
            return BatchReport::default();
        }

        let start = Instant::now();
        let executor = &self.executor;
        let pool = &self.pool;

        let tasks: Vec<_> = source_ids
            .iter()
            .map(|id| pool.run(id, executor.import_one(id, options)))
            .collect();
        let report: BatchReport = stream::iter(tasks)
            .buffer_unordered(self.pool.size())
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        finish("batch", &report, start);
        report
    }

    /// Import already-listed items (one collection page) with bounded concurrency.
    pub async fn import_items(&self, items: Vec<ItemDescriptor>, options: &ImportOptions) -> BatchReport {
        if items.is_empty() {
            return BatchReport::default();
        }

        let start = Instant::now();
        let executor = &self.executor;
        let pool = &self.pool;

        let report: BatchReport = stream::iter(items)
            .map(|item| async move {
                let source_id = item.source_id.clone();
                pool.run(&source_id, executor.import_item(item, options)).await
            })
            .buffer_unordered(self.pool.size())
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .collect();

        finish("page", &report, start);
        report
    }
}

fn failed(source_id: &str, reason: String) -> ImportOutcome {
    ImportOutcome::Failed {
        source_id: source_id.to_string(),
        error: ImportError::Internal(reason),
    }
}

fn finish(kind: &str, report: &BatchReport, start: Instant) {
    let elapsed = start.elapsed();
    metrics::BATCH_DURATION
        .with_label_values(&[kind])
        .observe(elapsed.as_secs_f64());

    let summary = format!(
        "{} finished in {:?}: {} imported, {} skipped, {} failed",
        kind,
        elapsed,
        report.imported.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if kind == "batch" {
        info!("Batch {}", summary);
    } else {
        debug!("Collection {}", summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SqliteCatalog, VideoCatalog};
    use crate::collections::CollectionRegistry;
    use crate::testing::{fixtures, MockSourceClient};
    use std::time::Duration;

    struct Harness {
        source: Arc<MockSourceClient>,
        catalog: Arc<SqliteCatalog>,
        coordinator: BatchCoordinator,
    }

    fn harness(workers: usize) -> Harness {
        let source = Arc::new(MockSourceClient::new());
        let catalog = Arc::new(SqliteCatalog::in_memory().unwrap());
        let executor = Arc::new(ImportExecutor::new(
            source.clone(),
            catalog.clone(),
            Arc::new(CollectionRegistry::default()),
        ));
        Harness {
            source,
            catalog,
            coordinator: BatchCoordinator::new(executor, WorkerPool::new(workers)),
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_batch_with_existing_item() {
        let h = harness(4);
        for id in ["a", "b", "c"] {
            h.source.add_item(fixtures::movie(id, &id.to_uppercase())).await;
        }
        h.catalog.insert(fixtures::catalog_entry("b")).unwrap();

        let report = h
            .coordinator
            .import_batch(&ids(&["a", "b", "c"]), &ImportOptions::default())
            .await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].source_id, "b");
        assert!(report.failed.is_empty());

        let mut imported: Vec<_> = report.imported.iter().map(|e| e.source_id.as_str()).collect();
        imported.sort();
        assert_eq!(imported, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let h = harness(2);
        h.source.add_item(fixtures::movie("good1", "Good One")).await;
        h.source.add_item(fixtures::movie("good2", "Good Two")).await;

        let report = h
            .coordinator
            .import_batch(&ids(&["good1", "missing", "good2"]), &ImportOptions::default())
            .await;

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source_id, "missing");
        assert!(matches!(report.failed[0].error, ImportError::ItemNotFound(_)));
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_its_item() {
        let h = harness(2);
        for id in ["a", "b", "c"] {
            h.source.add_item(fixtures::movie(id, &id.to_uppercase())).await;
        }
        h.source.set_item_panic("b").await;

        let report = h
            .coordinator
            .import_batch(&ids(&["a", "b", "c"]), &ImportOptions::default())
            .await;

        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].source_id, "b");
        assert!(matches!(report.failed[0].error, ImportError::Internal(_)));
        assert_eq!(report.failed[0].error.code(), "internal_error");

        let status = h.coordinator.pool().status();
        assert_eq!(status.active, 0);
        assert_eq!(status.total_processed, 3);
    }

    #[tokio::test]
    async fn test_cancelled_batch_releases_pool_counters() {
        let h = harness(2);
        let items = fixtures::movies("slow", 6);
        for item in &items {
            h.source.add_item(item.clone()).await;
        }
        h.source.set_latency(Duration::from_millis(200)).await;

        let source_ids: Vec<String> = items.iter().map(|i| i.source_id.clone()).collect();
        let options = ImportOptions::default();
        let batch = h.coordinator.import_batch(&source_ids, &options);
        assert!(tokio::time::timeout(Duration::from_millis(50), batch)
            .await
            .is_err());

        let status = h.coordinator.pool().status();
        assert_eq!(status.active, 0);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test]
    async fn test_duplicate_ids_in_one_batch() {
        let h = harness(4);
        h.source.add_item(fixtures::movie("dup", "Dup")).await;

        let report = h
            .coordinator
            .import_batch(&ids(&["dup", "dup"]), &ImportOptions::default())
            .await;

        assert_eq!(report.total(), 2);
        assert_eq!(report.imported.len(), 1);
        let other_is_skip_or_duplicate = report.skipped.len() == 1
            || matches!(
                report.failed.as_slice(),
                [failed] if matches!(failed.error, ImportError::DuplicateKey(_))
            );
        assert!(other_is_skip_or_duplicate);
        assert_eq!(h.catalog.stats().unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let h = harness(4);
        let report = h.coordinator.import_batch(&[], &ImportOptions::default()).await;
        assert_eq!(report, BatchReport::default());
        assert_eq!(h.coordinator.pool().status().total_processed, 0);
    }

    #[tokio::test]
    async fn test_concurrency_bounded_by_pool() {
        let h = harness(3);
        let items = fixtures::movies("m", 12);
        for item in &items {
            h.source.add_item(item.clone()).await;
        }
        h.source.set_latency(Duration::from_millis(20)).await;

        let source_ids: Vec<String> = items.iter().map(|i| i.source_id.clone()).collect();
        let report = h
            .coordinator
            .import_batch(&source_ids, &ImportOptions::default())
            .await;

        assert_eq!(report.imported.len(), 12);
        assert!(h.source.max_in_flight() <= 3);
        assert!(h.source.max_in_flight() >= 2);

        let status = h.coordinator.pool().status();
        assert_eq!(status.total_processed, 12);
        assert_eq!(status.active, 0);
        assert_eq!(status.queued, 0);
    }

    #[tokio::test]
    async fn test_import_items_partition() {
        let h = harness(4);
        h.catalog.insert(fixtures::catalog_entry("m-1")).unwrap();

        let report = h
            .coordinator
            .import_items(fixtures::movies("m", 5), &ImportOptions::default())
            .await;

        assert_eq!(report.total(), 5);
        assert_eq!(report.imported.len(), 4);
        assert_eq!(report.skipped.len(), 1);
    }
}
