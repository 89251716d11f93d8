use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info};

use super::{ImportJob, JobError, JobStatus, JobStore};
use crate::collections::CollectionRegistry;
use crate::import::{BatchCoordinator, ImportOptions};
use crate::metrics;
use crate::source::{SourceClient, SourceError};

const JOB_PANICKED: &str = "job task panicked";

/// Starts collection imports in the background and answers progress queries.
pub struct JobTracker {
    runner: JobRunner,
    registry: Arc<CollectionRegistry>,
    max_limit: u32,
}

impl JobTracker {
    pub fn new(
        source: Arc<dyn SourceClient>,
        coordinator: Arc<BatchCoordinator>,
        store: Arc<JobStore>,
        registry: Arc<CollectionRegistry>,
        page_size: u32,
        max_limit: u32,
    ) -> Self {
        Self {
            runner: JobRunner {
                source,
                coordinator,
                store,
                page_size: page_size.max(1),
            },
            registry,
            max_limit,
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.runner.store
    }

    /// Create a job for `key` and start it. Returns the job id immediately.
    ///
    /// Items are categorized under the collection's display name unless the
    /// options already carry a category.
    pub async fn import_from_collection(
        &self,
        key: &str,
        limit: u32,
        mut options: ImportOptions,
    ) -> Result<String, JobError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(JobError::InvalidCollection);
        }
        if limit == 0 || limit > self.max_limit {
            return Err(JobError::InvalidLimit {
                limit,
                max: self.max_limit,
            });
        }

        if options.category.is_none() {
            options.category = self.registry.get(key).map(|c| c.display_name.clone());
        }

        let job = ImportJob::new(key, limit, options.clone());
        let job_id = job.id.clone();
        self.runner.store.insert(job).await;
        metrics::JOB_TRANSITIONS
            .with_label_values(&[JobStatus::Queued.as_str()])
            .inc();

        info!(
            "Queued import job {} for collection {} (limit {})",
            job_id, key, limit
        );

        let runner = self.runner.clone();
        let id = job_id.clone();
        let key = key.to_string();
        tokio::spawn(async move {
            let supervisor = runner.clone();
            let run = runner.run(id.clone(), key, limit, options);
            if AssertUnwindSafe(run).catch_unwind().await.is_err() {
                error!("Import job {} panicked", id);
                supervisor
                    .transition(&id, JobStatus::Failed, |j| j.fail(JOB_PANICKED))
                    .await;
            }
        });

        Ok(job_id)
    }

    pub async fn get_job(&self, id: &str) -> Result<ImportJob, JobError> {
        self.runner
            .store
            .get(id)
            .await
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// All jobs, newest first.
    pub async fn list_jobs(&self) -> Vec<ImportJob> {
        self.runner.store.list().await
    }
}

/// State owned by one spawned job task. The task is the job's only writer.
#[derive(Clone)]
struct JobRunner {
    source: Arc<dyn SourceClient>,
    coordinator: Arc<BatchCoordinator>,
    store: Arc<JobStore>,
    page_size: u32,
}

impl JobRunner {
    async fn run(self, id: String, key: String, limit: u32, options: ImportOptions) {
        if !self.transition(&id, JobStatus::Running, |j| j.status = JobStatus::Running).await {
            return;
        }

        match self.import_pages(&id, &key, limit, &options).await {
            Ok(()) => {
                if self.transition(&id, JobStatus::Completed, |j| j.complete()).await {
                    info!("Import job {} for {} completed", id, key);
                }
            }
            Err(PageError::Source(e)) => {
                error!("Import job {} for {} failed: {}", id, key, e);
                let reason = e.to_string();
                self.transition(&id, JobStatus::Failed, |j| j.fail(reason)).await;
            }
            Err(PageError::Store(e)) => {
                error!("Import job {} lost its record: {}", id, e);
            }
        }
    }

    async fn import_pages(
        &self,
        id: &str,
        key: &str,
        limit: u32,
        options: &ImportOptions,
    ) -> Result<(), PageError> {
        let limit_items = limit as u64;
        let mut processed: u64 = 0;
        let mut page = 1;

        while processed < limit_items {
            let listing = self
                .source
                .list_collection(key, page, self.page_size)
                .await
                .map_err(PageError::Source)?;
            let is_last = listing.is_last();

            let mut items = listing.items;
            items.truncate((limit_items - processed) as usize);
            if items.is_empty() {
                break;
            }

            let report = self.coordinator.import_items(items, options).await;
            processed += report.total() as u64;

            let job = self
                .store
                .update(id, |j| j.apply_report(&report))
                .await
                .map_err(PageError::Store)?;
            info!(
                "Import job {}: page {} done, {}/{} processed ({}%)",
                id, page, processed, limit, job.progress_percent
            );

            if is_last {
                break;
            }
            page += 1;
        }

        Ok(())
    }

    /// Returns false if the write was rejected.
    async fn transition<F>(&self, id: &str, to: JobStatus, f: F) -> bool
    where
        F: FnOnce(&mut ImportJob),
    {
        match self.store.update(id, f).await {
            Ok(_) => {
                metrics::JOB_TRANSITIONS
                    .with_label_values(&[to.as_str()])
                    .inc();
                true
            }
            Err(e) => {
                error!("Import job {} could not move to {}: {}", id, to.as_str(), e);
                false
            }
        }
    }
}

enum PageError {
    Source(SourceError),
    Store(JobError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{SqliteCatalog, VideoCatalog};
    use crate::import::{ImportExecutor, WorkerPool};
    use crate::testing::{fixtures, MockSourceClient};
    use std::time::Duration;

    struct Harness {
        source: Arc<MockSourceClient>,
        catalog: Arc<SqliteCatalog>,
        tracker: JobTracker,
    }

    fn harness(page_size: u32) -> Harness {
        let source = Arc::new(MockSourceClient::new());
        let catalog = Arc::new(SqliteCatalog::in_memory().unwrap());
        let registry = Arc::new(CollectionRegistry::default());
        let executor = Arc::new(ImportExecutor::new(
            source.clone(),
            catalog.clone(),
            registry.clone(),
        ));
        let coordinator = Arc::new(BatchCoordinator::new(executor, WorkerPool::new(4)));
        let tracker = JobTracker::new(
            source.clone(),
            coordinator,
            Arc::new(JobStore::new()),
            registry,
            page_size,
            5000,
        );
        Harness {
            source,
            catalog,
            tracker,
        }
    }

    async fn wait_for_terminal(tracker: &JobTracker, id: &str) -> ImportJob {
        for _ in 0..500 {
            let job = tracker.get_job(id).await.unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", id);
    }

    #[tokio::test]
    async fn test_limit_validation() {
        let h = harness(50);
        let err = h
            .tracker
            .import_from_collection("feature_films", 0, ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidLimit { limit: 0, max: 5000 }));

        let err = h
            .tracker
            .import_from_collection("feature_films", 5001, ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidLimit { .. }));

        let err = h
            .tracker
            .import_from_collection("  ", 10, ImportOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidCollection));

        assert!(h.tracker.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_limit_reached_across_pages() {
        let h = harness(4);
        h.source
            .add_collection("feature_films", fixtures::movies("ff", 25))
            .await;

        let id = h
            .tracker
            .import_from_collection("feature_films", 10, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress_percent, 100);
        assert_eq!(job.processed(), 10);
        assert_eq!(job.imported_count, 10);
        assert!(job.finished_at.is_some());
        assert_eq!(h.catalog.stats().unwrap().total, 10);
        // 4 + 4 + 2: the third page is truncated.
        assert_eq!(h.source.list_calls().await, 3);
    }

    #[tokio::test]
    async fn test_collection_exhausted_before_limit() {
        let h = harness(50);
        h.source
            .add_collection("film_noir", fixtures::movies("noir", 7))
            .await;

        let id = h
            .tracker
            .import_from_collection("film_noir", 100, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed(), 7);
        assert_eq!(job.progress_percent, 100);
    }

    #[tokio::test]
    async fn test_unknown_collection_fails_job() {
        let h = harness(50);

        let id = h
            .tracker
            .import_from_collection("no_such_collection", 10, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("no_such_collection"));
        assert_eq!(job.processed(), 0);
    }

    #[tokio::test]
    async fn test_page_failure_fails_job_but_keeps_counts() {
        let h = harness(5);
        h.source
            .add_collection("feature_films", fixtures::movies("ff", 20))
            .await;
        h.source
            .set_page_error(
                "feature_films",
                2,
                SourceError::Unavailable("502 after retries".to_string()),
            )
            .await;

        let id = h
            .tracker
            .import_from_collection("feature_films", 20, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.imported_count, 5);
        assert_eq!(job.progress_percent, 25);
        assert!(job.error.as_deref().unwrap().contains("502"));
    }

    #[tokio::test]
    async fn test_item_failures_are_not_fatal() {
        let h = harness(10);
        h.source
            .add_collection("feature_films", fixtures::movies("ff", 6))
            .await;
        h.source
            .set_item_error("ff-2", SourceError::NotFound("ff-2".to_string()))
            .await;

        let id = h
            .tracker
            .import_from_collection("feature_films", 6, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.imported_count, 5);
        assert_eq!(job.failed_count, 1);
        assert_eq!(job.failures[0].source_id, "ff-2");
    }

    #[tokio::test]
    async fn test_panicking_item_does_not_stall_job() {
        let h = harness(10);
        h.source
            .add_collection("feature_films", fixtures::movies("p", 3))
            .await;
        h.source.set_item_panic("p-1").await;

        let id = h
            .tracker
            .import_from_collection("feature_films", 3, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.imported_count, 2);
        assert_eq!(job.failed_count, 1);
        assert_eq!(job.failures[0].source_id, "p-1");
        assert_eq!(h.catalog.stats().unwrap().total, 2);
    }

    #[tokio::test]
    async fn test_collection_name_used_as_category() {
        let h = harness(10);
        h.source
            .add_collection("film_noir", fixtures::movies("noir", 2))
            .await;

        let id = h
            .tracker
            .import_from_collection("film_noir", 2, ImportOptions::default())
            .await
            .unwrap();
        let job = wait_for_terminal(&h.tracker, &id).await;

        assert_eq!(job.options.category.as_deref(), Some("Film Noir"));
        let stats = h.catalog.stats().unwrap();
        assert_eq!(stats.categories[0].name, "Film Noir");
        assert_eq!(stats.categories[0].count, 2);
    }

    #[tokio::test]
    async fn test_unknown_job() {
        let h = harness(10);
        assert!(matches!(
            h.tracker.get_job("nope").await,
            Err(JobError::NotFound(_))
        ));
    }
}
