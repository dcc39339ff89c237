//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageResult};
use crate::storage::{
    db_timestamp, FetchMetaRecord, JobLockRecord, RunRecord, RunStatus, RunTotals,
    ScrapedItemRecord,
};
use crate::SeedlineError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

/// How long a writer waits for another connection's write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and applies the schema
    pub fn new(path: &Path) -> Result<Self, SeedlineError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, SeedlineError> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn row_to_scraped_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ScrapedItemRecord, String)> {
    let metadata_json: String = row.get(4)?;
    Ok((
        ScrapedItemRecord {
            source_domain: row.get(0)?,
            item_url: row.get(1)?,
            canonical_item_url: row.get(2)?,
            title: row.get(3)?,
            metadata: Map::new(),
            content_hash: row.get(5)?,
            last_seen_at: row.get(6)?,
        },
        metadata_json,
    ))
}

impl Storage for SqliteStorage {
    // ===== Job Locks =====

    fn insert_lock(
        &mut self,
        name: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO job_locks (name, expires_at, acquired_at) VALUES (?1, ?2, ?3)",
            params![name, db_timestamp(expires_at), db_timestamp(now)],
        )?;
        Ok(())
    }

    fn steal_expired_lock(
        &mut self,
        name: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let now = db_timestamp(now);
        let updated = self.conn.execute(
            "UPDATE job_locks SET expires_at = ?2, acquired_at = ?3
             WHERE name = ?1 AND expires_at < ?3",
            params![name, db_timestamp(expires_at), now],
        )?;
        Ok(updated)
    }

    fn delete_lock(&mut self, name: &str) -> StorageResult<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM job_locks WHERE name = ?1", params![name])?;
        Ok(deleted)
    }

    fn get_lock(&self, name: &str) -> StorageResult<Option<JobLockRecord>> {
        let lock = self
            .conn
            .query_row(
                "SELECT name, expires_at, acquired_at FROM job_locks WHERE name = ?1",
                params![name],
                |row| {
                    Ok(JobLockRecord {
                        name: row.get(0)?,
                        expires_at: row.get(1)?,
                        acquired_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(lock)
    }

    // ===== Fetch Metadata =====

    fn get_fetch_meta(&self, item_url: &str) -> StorageResult<Option<FetchMetaRecord>> {
        let meta = self
            .conn
            .query_row(
                "SELECT item_url, etag, last_modified, updated_at FROM fetch_meta WHERE item_url = ?1",
                params![item_url],
                |row| {
                    Ok(FetchMetaRecord {
                        item_url: row.get(0)?,
                        etag: row.get(1)?,
                        last_modified: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(meta)
    }

    fn upsert_fetch_meta(
        &mut self,
        item_url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO fetch_meta (item_url, etag, last_modified, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(item_url) DO UPDATE SET
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                updated_at = excluded.updated_at",
            params![item_url, etag, last_modified, db_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn touch_fetch_meta(&mut self, item_url: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO fetch_meta (item_url, updated_at) VALUES (?1, ?2)
             ON CONFLICT(item_url) DO UPDATE SET updated_at = excluded.updated_at",
            params![item_url, db_timestamp(Utc::now())],
        )?;
        Ok(())
    }

    fn count_fetch_meta(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fetch_meta", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Scraped Items =====

    fn upsert_scraped_item(&mut self, item: &ScrapedItemRecord) -> StorageResult<()> {
        let metadata = serde_json::to_string(&item.metadata)?;
        self.conn.execute(
            "INSERT INTO scraped_items
             (source_domain, item_url, canonical_item_url, title, metadata, content_hash, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(source_domain, canonical_item_url) DO UPDATE SET
                item_url = excluded.item_url,
                title = excluded.title,
                metadata = excluded.metadata,
                content_hash = excluded.content_hash,
                last_seen_at = excluded.last_seen_at",
            params![
                item.source_domain,
                item.item_url,
                item.canonical_item_url,
                item.title,
                metadata,
                item.content_hash,
                item.last_seen_at,
            ],
        )?;
        Ok(())
    }

    fn get_scraped_item(
        &self,
        source_domain: &str,
        canonical_item_url: &str,
    ) -> StorageResult<Option<ScrapedItemRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT source_domain, item_url, canonical_item_url, title, metadata, content_hash, last_seen_at
                 FROM scraped_items WHERE source_domain = ?1 AND canonical_item_url = ?2",
                params![source_domain, canonical_item_url],
                row_to_scraped_item,
            )
            .optional()?;

        match row {
            Some((mut item, metadata_json)) => {
                item.metadata = match serde_json::from_str::<Value>(&metadata_json)? {
                    Value::Object(map) => map,
                    _ => Map::new(),
                };
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn count_scraped_items(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM scraped_items", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Run History =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![
                db_timestamp(Utc::now()),
                config_hash,
                RunStatus::Running.to_db_string()
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        totals: &RunTotals,
    ) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, urls_processed = ?3,
             total_items = ?4, total_bytes = ?5, duration_ms = ?6 WHERE id = ?7",
            params![
                status.to_db_string(),
                db_timestamp(Utc::now()),
                totals.urls_processed as i64,
                totals.total_items as i64,
                totals.total_bytes as i64,
                totals.duration_ms as i64,
                run_id
            ],
        )?;
        Ok(())
    }

    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status,
             urls_processed, total_items, total_bytes, duration_ms
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Failed),
                    totals: RunTotals {
                        urls_processed: row.get::<_, i64>(5)? as u64,
                        total_items: row.get::<_, i64>(6)? as u64,
                        total_bytes: row.get::<_, i64>(7)? as u64,
                        duration_ms: row.get::<_, i64>(8)? as u64,
                    },
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use chrono::Duration;

    fn sample_item(hash: &str) -> ScrapedItemRecord {
        let mut metadata = Map::new();
        metadata.insert("content_length".to_string(), Value::from(5));
        ScrapedItemRecord {
            source_domain: "example.com".to_string(),
            item_url: "https://Example.com/a/?utm_source=x".to_string(),
            canonical_item_url: "https://example.com/a".to_string(),
            title: Some("A".to_string()),
            metadata,
            content_hash: hash.to_string(),
            last_seen_at: db_timestamp(Utc::now()),
        }
    }

    #[test]
    fn test_insert_lock_twice_is_constraint_violation() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();

        storage
            .insert_lock("scrape", now + Duration::minutes(10), now)
            .unwrap();
        let second = storage.insert_lock("scrape", now + Duration::minutes(10), now);

        assert!(matches!(second, Err(StorageError::ConstraintViolation(_))));
    }

    #[test]
    fn test_steal_only_expired_lock() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();

        storage
            .insert_lock("live", now + Duration::minutes(5), now)
            .unwrap();
        storage
            .insert_lock("stale", now - Duration::minutes(5), now - Duration::minutes(15))
            .unwrap();

        let new_expiry = now + Duration::minutes(10);
        assert_eq!(storage.steal_expired_lock("live", new_expiry, now).unwrap(), 0);
        assert_eq!(storage.steal_expired_lock("stale", new_expiry, now).unwrap(), 1);

        let stolen = storage.get_lock("stale").unwrap().unwrap();
        assert_eq!(stolen.expires_at, db_timestamp(new_expiry));
    }

    #[test]
    fn test_delete_lock() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let now = Utc::now();
        storage
            .insert_lock("scrape", now + Duration::minutes(1), now)
            .unwrap();

        assert_eq!(storage.delete_lock("scrape").unwrap(), 1);
        assert_eq!(storage.delete_lock("scrape").unwrap(), 0);
        assert!(storage.get_lock("scrape").unwrap().is_none());
    }

    #[test]
    fn test_fetch_meta_upsert_and_touch() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = "https://example.com/a";

        storage
            .upsert_fetch_meta(url, Some("\"v1\""), Some("Mon, 01 Jan 2024 00:00:00 GMT"))
            .unwrap();
        storage.upsert_fetch_meta(url, Some("\"v2\""), None).unwrap();

        let meta = storage.get_fetch_meta(url).unwrap().unwrap();
        assert_eq!(meta.etag.as_deref(), Some("\"v2\""));
        assert_eq!(meta.last_modified, None);

        storage.touch_fetch_meta(url).unwrap();
        let touched = storage.get_fetch_meta(url).unwrap().unwrap();
        assert_eq!(touched.etag.as_deref(), Some("\"v2\""));
        assert!(touched.updated_at >= meta.updated_at);
        assert_eq!(storage.count_fetch_meta().unwrap(), 1);
    }

    #[test]
    fn test_scraped_item_upsert_collapses_natural_key() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();

        storage.upsert_scraped_item(&sample_item("hash-1")).unwrap();
        storage.upsert_scraped_item(&sample_item("hash-2")).unwrap();

        assert_eq!(storage.count_scraped_items().unwrap(), 1);

        let item = storage
            .get_scraped_item("example.com", "https://example.com/a")
            .unwrap()
            .unwrap();
        assert_eq!(item.content_hash, "hash-2");
        assert_eq!(item.metadata.get("content_length"), Some(&Value::from(5)));
    }

    #[test]
    fn test_run_history() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("abc").unwrap();
        let totals = RunTotals {
            urls_processed: 2,
            total_items: 3,
            total_bytes: 42,
            duration_ms: 1000,
        };
        storage
            .finish_run(run_id, RunStatus::Completed, &totals)
            .unwrap();

        let runs = storage.get_recent_runs(5).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, RunStatus::Completed);
        assert_eq!(runs[0].totals, totals);
        assert!(runs[0].finished_at.is_some());
    }
}
