//! Robots.txt caching implementation
//!
//! Entries expire after 24 hours so that changes made by the site owner are
//! picked up daily.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Cached robots.txt data for an origin
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    pub fn new(content: ParsedRobots) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Checks if the entry is older than 24 hours
    pub fn is_stale(&self) -> bool {
        Utc::now() - self.fetched_at > Duration::hours(24)
    }
}

/// Per-origin cache of successfully fetched robots.txt files
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, CachedRobots>>,
}

impl RobotsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fresh entry for an origin, if any
    pub fn get(&self, origin: &str) -> Option<ParsedRobots> {
        let entries = self.entries.lock().ok()?;
        entries
            .get(origin)
            .filter(|cached| !cached.is_stale())
            .map(|cached| cached.content.clone())
    }

    /// Stores the robots.txt for an origin
    pub fn insert(&self, origin: &str, robots: ParsedRobots) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(origin.to_string(), CachedRobots::new(robots));
        }
    }

    #[cfg(test)]
    fn insert_at(&self, origin: &str, robots: ParsedRobots, fetched_at: DateTime<Utc>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            origin.to_string(),
            CachedRobots {
                content: robots,
                fetched_at,
            },
        );
    }
}
