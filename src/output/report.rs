//! Structured run report
//!
//! This is the JSON body returned by the trigger surface and printed by
//! `--run`:
//!
//! ```json
//! {"ok": true,
//!  "results": [{"url": "...", "status": 200, "items": 1, "bytes": 5, "hash": "..."}],
//!  "summary": {"urls_processed": 1, "total_items": 1, "total_bytes": 5,
//!              "duration_ms": 1834, "timestamp": "...", "succeeded": 1, "success_rate": 1.0}}
//! ```

use crate::storage::RunTotals;
use chrono::{SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Outcome of one seed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedStatus {
    /// Content fetched with this HTTP status
    Fetched(u16),
    /// Server answered 304; nothing re-persisted
    NotModified,
    /// Denied by the allow-list or robots.txt
    RobotsDisallowed,
    /// Fetch failed after classification and retries
    Error,
}

impl SeedStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Fetched(_) | Self::NotModified)
    }
}

impl Serialize for SeedStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Fetched(code) => serializer.serialize_u16(*code),
            Self::NotModified => serializer.serialize_u16(304),
            Self::RobotsDisallowed => serializer.serialize_str("robots_disallowed"),
            Self::Error => serializer.serialize_str("error"),
        }
    }
}

/// Per-seed entry of the report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedResult {
    pub url: String,
    pub status: SeedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SeedResult {
    fn bare(url: &str, status: SeedStatus) -> Self {
        Self {
            url: url.to_string(),
            status,
            items: None,
            bytes: None,
            hash: None,
            error: None,
        }
    }

    pub fn fetched(url: &str, status: u16, items: u64, bytes: u64, hash: String) -> Self {
        Self {
            items: Some(items),
            bytes: Some(bytes),
            hash: Some(hash),
            ..Self::bare(url, SeedStatus::Fetched(status))
        }
    }

    pub fn not_modified(url: &str) -> Self {
        Self::bare(url, SeedStatus::NotModified)
    }

    pub fn robots_disallowed(url: &str) -> Self {
        Self::bare(url, SeedStatus::RobotsDisallowed)
    }

    pub fn error(url: &str, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::bare(url, SeedStatus::Error)
        }
    }
}

/// Aggregates over every seed of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub urls_processed: u64,
    pub total_items: u64,
    pub total_bytes: u64,
    pub duration_ms: u64,
    pub timestamp: String,
    pub succeeded: u64,
    pub success_rate: f64,
}

impl RunSummary {
    pub fn from_results(results: &[SeedResult], duration: Duration) -> Self {
        let urls_processed = results.len() as u64;
        let succeeded = results.iter().filter(|r| r.status.is_success()).count() as u64;
        let success_rate = if urls_processed > 0 {
            succeeded as f64 / urls_processed as f64
        } else {
            0.0
        };

        Self {
            urls_processed,
            total_items: results.iter().filter_map(|r| r.items).sum(),
            total_bytes: results.iter().filter_map(|r| r.bytes).sum(),
            duration_ms: duration.as_millis() as u64,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            succeeded,
            success_rate,
        }
    }

    /// Counters recorded in run history
    pub fn totals(&self) -> RunTotals {
        RunTotals {
            urls_processed: self.urls_processed,
            total_items: self.total_items,
            total_bytes: self.total_bytes,
            duration_ms: self.duration_ms,
        }
    }
}

/// The structured result of a completed run
///
/// Partial failure is reported per seed; `ok` is true whenever the run itself
/// completed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub ok: bool,
    pub results: Vec<SeedResult>,
    pub summary: RunSummary,
}

impl RunReport {
    pub fn new(results: Vec<SeedResult>, duration: Duration) -> Self {
        let summary = RunSummary::from_results(&results, duration);
        Self {
            ok: true,
            results,
            summary,
        }
    }
}
