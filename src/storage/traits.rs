//! Storage traits and error types
//!
//! This module defines the relational-store contract the pipeline depends on
//! and the associated error types.

use crate::storage::{FetchMetaRecord, JobLockRecord, RunRecord, RunStatus, RunTotals, ScrapedItemRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// A uniqueness (or other) constraint rejected the write
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::ConstraintViolation(message.unwrap_or_else(|| code.to_string()))
            }
            other => Self::Sqlite(other),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Every write is a single-row statement; nothing here opens a multi-row
/// transaction, so each call is independently atomic and safe to repeat.
pub trait Storage {
    // ===== Job Locks =====

    /// Inserts a lock row
    ///
    /// Fails with [`StorageError::ConstraintViolation`] if a row with the
    /// same name already exists.
    fn insert_lock(&mut self, name: &str, expires_at: DateTime<Utc>, now: DateTime<Utc>)
        -> StorageResult<()>;

    /// Overwrites the lock row only if its lease has already expired
    ///
    /// This is a single conditional `UPDATE ... WHERE expires_at < now`.
    ///
    /// # Returns
    ///
    /// The number of rows updated (0 or 1)
    fn steal_expired_lock(
        &mut self,
        name: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Deletes the lock row unconditionally
    fn delete_lock(&mut self, name: &str) -> StorageResult<usize>;

    /// Gets a lock row by name
    fn get_lock(&self, name: &str) -> StorageResult<Option<JobLockRecord>>;

    // ===== Fetch Metadata =====

    /// Gets revalidation state for a URL
    fn get_fetch_meta(&self, item_url: &str) -> StorageResult<Option<FetchMetaRecord>>;

    /// Inserts or replaces the validators stored for a URL
    fn upsert_fetch_meta(
        &mut self,
        item_url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> StorageResult<()>;

    /// Refreshes `updated_at` for a URL, creating the row if needed
    fn touch_fetch_meta(&mut self, item_url: &str) -> StorageResult<()>;

    /// Counts fetch metadata rows
    fn count_fetch_meta(&self) -> StorageResult<u64>;

    // ===== Scraped Items =====

    /// Inserts an item or updates the existing one with the same
    /// `(source_domain, canonical_item_url)`
    fn upsert_scraped_item(&mut self, item: &ScrapedItemRecord) -> StorageResult<()>;

    /// Gets an item by its natural key
    fn get_scraped_item(
        &self,
        source_domain: &str,
        canonical_item_url: &str,
    ) -> StorageResult<Option<ScrapedItemRecord>>;

    /// Counts stored items
    fn count_scraped_items(&self) -> StorageResult<u64>;

    // ===== Run History =====

    /// Records the start of a run
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Records the end of a run with its totals
    fn finish_run(&mut self, run_id: i64, status: RunStatus, totals: &RunTotals)
        -> StorageResult<()>;

    /// Gets the most recent runs, newest first
    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
