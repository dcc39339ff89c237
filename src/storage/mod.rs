//! Storage module for persisting pipeline state
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Lease rows for the job lock
//! - Conditional-fetch metadata per URL
//! - Idempotent item upserts
//! - Run history

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between workers
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Wraps a storage backend for sharing across workers
pub fn shared(storage: SqliteStorage) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Locks a shared storage handle, mapping poisoning to a storage error
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::Poisoned)
}

/// Formats a timestamp for storage
///
/// Fixed millisecond precision with a `Z` suffix keeps every stored value the
/// same width, so SQL string comparison orders timestamps chronologically.
pub fn db_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// A job lock row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobLockRecord {
    pub name: String,
    pub expires_at: String,
    pub acquired_at: String,
}

/// Revalidation state for one source URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetaRecord {
    pub item_url: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub updated_at: String,
}

/// A persisted extracted item
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedItemRecord {
    pub source_domain: String,
    pub item_url: String,
    pub canonical_item_url: String,
    pub title: Option<String>,
    pub metadata: Map<String, Value>,
    pub content_hash: String,
    pub last_seen_at: String,
}

/// A pipeline run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub totals: RunTotals,
}

/// Aggregate counters recorded when a run finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub urls_processed: u64,
    pub total_items: u64,
    pub total_bytes: u64,
    pub duration_ms: u64,
}

/// Status of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
