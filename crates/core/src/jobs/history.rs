//! Durable mirror of the job registry.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, Connection};

use super::{ImportJob, JobError};

/// Persistent storage for job snapshots.
pub trait JobHistory: Send + Sync {
    /// Insert or replace the snapshot of a job.
    fn save(&self, job: &ImportJob) -> Result<(), JobError>;

    /// All stored jobs, newest first.
    fn load_all(&self) -> Result<Vec<ImportJob>, JobError>;
}

/// SQLite-backed job history. Each row stores the full job as JSON.
pub struct SqliteJobHistory {
    conn: Mutex<Connection>,
}

impl SqliteJobHistory {
    pub fn new(path: &Path) -> Result<Self, JobError> {
        let conn = Connection::open(path).map_err(|e| JobError::History(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| JobError::History(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, JobError> {
        let conn = Connection::open_in_memory().map_err(|e| JobError::History(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS import_jobs (
                id TEXT PRIMARY KEY,
                collection_key TEXT NOT NULL,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                payload TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_import_jobs_started ON import_jobs(started_at);
            "#,
        )
        .map_err(|e| JobError::History(e.to_string()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobError> {
        self.conn
            .lock()
            .map_err(|_| JobError::History("job history lock poisoned".to_string()))
    }
}

impl JobHistory for SqliteJobHistory {
    fn save(&self, job: &ImportJob) -> Result<(), JobError> {
        let payload = serde_json::to_string(job).map_err(|e| JobError::History(e.to_string()))?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO import_jobs (id, collection_key, status, started_at, payload)
             VALUES (?, ?, ?, ?, ?)",
            params![
                &job.id,
                &job.collection_key,
                job.status.as_str(),
                job.started_at.to_rfc3339(),
                payload,
            ],
        )
        .map_err(|e| JobError::History(e.to_string()))?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<ImportJob>, JobError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT payload FROM import_jobs")
            .map_err(|e| JobError::History(e.to_string()))?;
        let payloads = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| JobError::History(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::History(e.to_string()))?;

        let mut jobs = payloads
            .iter()
            .map(|p| serde_json::from_str::<ImportJob>(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| JobError::History(format!("corrupt job snapshot: {}", e)))?;
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(jobs)
    }
}
