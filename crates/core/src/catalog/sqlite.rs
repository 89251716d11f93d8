//! SQLite-backed VOD catalog implementation.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{ffi, params, params_from_iter, Connection, Row};

use super::{CatalogError, CatalogStats, CategoryCount, NewCatalogEntry, VideoCatalog, VideoCatalogEntry};

/// Number of entries returned in `CatalogStats::recent_imports`.
const RECENT_IMPORTS: u32 = 10;

const ENTRY_COLUMNS: &str = "id, source_id, title, category, year, duration_seconds, language, \
     has_subtitles, video_url, thumbnail_url, is_active, created_at";

/// SQLite-backed VOD catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS vod_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                category TEXT NOT NULL,
                year INTEGER,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                language TEXT NOT NULL DEFAULT '',
                has_subtitles INTEGER NOT NULL DEFAULT 0,
                video_url TEXT NOT NULL,
                thumbnail_url TEXT NOT NULL DEFAULT '',
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_vod_entries_category ON vod_entries(category);
            CREATE INDEX IF NOT EXISTS idx_vod_entries_created ON vod_entries(created_at);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Internal("catalog connection lock poisoned".to_string()))
    }

    fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<VideoCatalogEntry> {
        let created_at: String = row.get(11)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e))
            })?;

        Ok(VideoCatalogEntry {
            id: row.get(0)?,
            source_id: row.get(1)?,
            title: row.get(2)?,
            category: row.get(3)?,
            year: row.get(4)?,
            duration_seconds: row.get(5)?,
            language: row.get(6)?,
            has_subtitles: row.get(7)?,
            video_url: row.get(8)?,
            thumbnail_url: row.get(9)?,
            is_active: row.get(10)?,
            created_at,
        })
    }

    fn fetch(conn: &Connection, id: i64) -> Result<VideoCatalogEntry, CatalogError> {
        conn.query_row(
            &format!("SELECT {} FROM vod_entries WHERE id = ?", ENTRY_COLUMNS),
            params![id],
            Self::row_to_entry,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(format!("video {}", id)),
            _ => CatalogError::Database(e.to_string()),
        })
    }

    fn update_active(
        conn: &Connection,
        id: i64,
        sql: &str,
        extra: Option<bool>,
    ) -> Result<VideoCatalogEntry, CatalogError> {
        let changed = match extra {
            Some(active) => conn.execute(sql, params![active, id]),
            None => conn.execute(sql, params![id]),
        }
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        if changed == 0 {
            return Err(CatalogError::NotFound(format!("video {}", id)));
        }
        Self::fetch(conn, id)
    }
}

impl VideoCatalog for SqliteCatalog {
    fn exists(&self, source_id: &str) -> Result<bool, CatalogError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM vod_entries WHERE source_id = ?",
                params![source_id],
                |row| row.get(0),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn existing_source_ids(&self, source_ids: &[String]) -> Result<HashSet<String>, CatalogError> {
        if source_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let conn = self.lock()?;
        let placeholders = vec!["?"; source_ids.len()].join(", ");
        let sql = format!(
            "SELECT source_id FROM vod_entries WHERE source_id IN ({})",
            placeholders
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(source_ids.iter()), |row| row.get::<_, String>(0))
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        rows.collect::<Result<HashSet<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn insert(&self, entry: NewCatalogEntry) -> Result<VideoCatalogEntry, CatalogError> {
        let conn = self.lock()?;
        let created_at = Utc::now();

        conn.execute(
            "INSERT INTO vod_entries (source_id, title, category, year, duration_seconds, language,
                                      has_subtitles, video_url, thumbnail_url, is_active, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?)",
            params![
                &entry.source_id,
                &entry.title,
                &entry.category,
                entry.year,
                entry.duration_seconds,
                &entry.language,
                entry.has_subtitles,
                &entry.video_url,
                &entry.thumbnail_url,
                created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            ],
        )
        .map_err(|e| insert_error(e, &entry.source_id))?;

        let id = conn.last_insert_rowid();
        Self::fetch(&conn, id)
    }

    fn get(&self, id: i64) -> Result<VideoCatalogEntry, CatalogError> {
        let conn = self.lock()?;
        Self::fetch(&conn, id)
    }

    fn delete(&self, id: i64) -> Result<(), CatalogError> {
        let conn = self.lock()?;
        let deleted = conn
            .execute("DELETE FROM vod_entries WHERE id = ?", params![id])
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        if deleted == 0 {
            return Err(CatalogError::NotFound(format!("video {}", id)));
        }
        Ok(())
    }

    fn set_active(&self, id: i64, active: bool) -> Result<VideoCatalogEntry, CatalogError> {
        let conn = self.lock()?;
        Self::update_active(
            &conn,
            id,
            "UPDATE vod_entries SET is_active = ? WHERE id = ?",
            Some(active),
        )
    }

    fn toggle_active(&self, id: i64) -> Result<VideoCatalogEntry, CatalogError> {
        let conn = self.lock()?;
        Self::update_active(
            &conn,
            id,
            "UPDATE vod_entries SET is_active = NOT is_active WHERE id = ?",
            None,
        )
    }

    fn stats(&self) -> Result<CatalogStats, CatalogError> {
        let conn = self.lock()?;

        let (total, with_subtitles): (u64, u64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(has_subtitles), 0) FROM vod_entries",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT category, COUNT(*) AS n FROM vod_entries
                 GROUP BY category ORDER BY n DESC, category ASC",
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let categories = stmt
            .query_map([], |row| {
                Ok(CategoryCount {
                    name: row.get(0)?,
                    count: row.get(1)?,
                })
            })
            .map_err(|e| CatalogError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM vod_entries ORDER BY id DESC LIMIT ?",
                ENTRY_COLUMNS
            ))
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        let recent_imports = stmt
            .query_map(params![RECENT_IMPORTS], Self::row_to_entry)
            .map_err(|e| CatalogError::Database(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(CatalogStats {
            total,
            with_subtitles,
            without_subtitles: total - with_subtitles,
            categories,
            recent_imports,
        })
    }
}

/// Only a UNIQUE conflict means the item is already catalogued; other
/// constraint failures are plain database errors.
fn insert_error(e: rusqlite::Error, source_id: &str) -> CatalogError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            CatalogError::DuplicateKey(source_id.to_string())
        }
        _ => CatalogError::Database(e.to_string()),
    }
}
