use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::history::JobHistory;
use super::{ImportJob, JobError, JobStatus};

pub const INTERRUPTED_BY_RESTART: &str = "interrupted by restart";

/// Default number of jobs kept in memory.
pub const DEFAULT_RETAINED_JOBS: usize = 500;

/// Registry of collection import jobs.
///
/// Keeps at most `retained` jobs in memory, evicting the oldest finished
/// ones first. Active jobs are never evicted. When a [`JobHistory`] is
/// attached, each accepted write is mirrored to it.
pub struct JobStore {
    jobs: RwLock<HashMap<String, ImportJob>>,
    history: Option<Arc<dyn JobHistory>>,
    retained: usize,
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore {
    /// In-memory only store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            history: None,
            retained: DEFAULT_RETAINED_JOBS,
        }
    }

    /// Store seeded from `history`. Jobs that were still queued or running
    /// when the previous process stopped are marked failed.
    pub fn with_history(history: Arc<dyn JobHistory>) -> Result<Self, JobError> {
        let mut jobs = HashMap::new();
        let mut interrupted = 0;

        for mut job in history.load_all()? {
            if !job.status.is_terminal() {
                job.fail(INTERRUPTED_BY_RESTART);
                history.save(&job)?;
                interrupted += 1;
            }
            jobs.insert(job.id.clone(), job);
        }

        info!(
            "Loaded {} import job(s) from history ({} interrupted)",
            jobs.len(),
            interrupted
        );

        let retained = DEFAULT_RETAINED_JOBS;
        evict_finished(&mut jobs, retained);

        Ok(Self {
            jobs: RwLock::new(jobs),
            history: Some(history),
            retained,
        })
    }

    /// Cap the number of jobs held in memory (at least one).
    pub fn with_retention(self, retained: usize) -> Self {
        let retained = retained.max(1);
        let mut jobs = self.jobs.into_inner();
        evict_finished(&mut jobs, retained);
        Self {
            jobs: RwLock::new(jobs),
            history: self.history,
            retained,
        }
    }

    pub async fn insert(&self, job: ImportJob) {
        self.mirror(&job);
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job);
        evict_finished(&mut jobs, self.retained);
    }

    pub async fn get(&self, id: &str) -> Option<ImportJob> {
        self.jobs.read().await.get(id).cloned()
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<ImportJob> {
        let mut jobs: Vec<ImportJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    /// Apply `f` to a job and return the new snapshot.
    ///
    /// Rejected with [`JobError::Terminal`] once the job has completed or failed.
    pub async fn update<F>(&self, id: &str, f: F) -> Result<ImportJob, JobError>
    where
        F: FnOnce(&mut ImportJob),
    {
        let snapshot = {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .get_mut(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()))?;
            if job.status.is_terminal() {
                return Err(JobError::Terminal(id.to_string()));
            }
            f(job);
            job.clone()
        };

        self.mirror(&snapshot);
        Ok(snapshot)
    }

    /// Number of jobs not yet in a terminal state.
    pub async fn active_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| matches!(j.status, JobStatus::Queued | JobStatus::Running))
            .count()
    }

    fn mirror(&self, job: &ImportJob) {
        if let Some(history) = &self.history {
            if let Err(e) = history.save(job) {
                warn!("Failed to persist job {}: {}", job.id, e);
            }
        }
    }
}

/// Drop the oldest terminal jobs until at most `retained` remain.
fn evict_finished(jobs: &mut HashMap<String, ImportJob>, retained: usize) {
    if jobs.len() <= retained {
        return;
    }

    let mut finished: Vec<(chrono::DateTime<chrono::Utc>, String)> = jobs
        .values()
        .filter(|j| j.status.is_terminal())
        .map(|j| (j.started_at, j.id.clone()))
        .collect();
    finished.sort();

    let excess = jobs.len() - retained;
    for (_, id) in finished.into_iter().take(excess) {
        jobs.remove(&id);
    }
    debug!("Job store holds {} job(s) after eviction", jobs.len());
}
