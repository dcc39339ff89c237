//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Seedline database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Lease-based job locks, one row per named pipeline
CREATE TABLE IF NOT EXISTS job_locks (
    name TEXT PRIMARY KEY,
    expires_at TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);

-- Revalidation state per canonical source URL
CREATE TABLE IF NOT EXISTS fetch_meta (
    item_url TEXT NOT NULL UNIQUE,
    etag TEXT,
    last_modified TEXT,
    updated_at TEXT NOT NULL
);

-- Extracted items, one row per logical item
CREATE TABLE IF NOT EXISTS scraped_items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_domain TEXT NOT NULL,
    item_url TEXT NOT NULL,
    canonical_item_url TEXT NOT NULL,
    title TEXT,
    metadata TEXT NOT NULL DEFAULT '{}',
    content_hash TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    UNIQUE(source_domain, canonical_item_url)
);

CREATE INDEX IF NOT EXISTS idx_scraped_items_hash ON scraped_items(content_hash);

-- Run history
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    urls_processed INTEGER NOT NULL DEFAULT 0,
    total_items INTEGER NOT NULL DEFAULT 0,
    total_bytes INTEGER NOT NULL DEFAULT 0,
    duration_ms INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
