//! Per-call politeness delay
//!
//! Every fetch is followed by a sleep of `base + jitter`. This is a fixed
//! per-call delay, not a token bucket: concurrent workers each wait on their
//! own. A site's `Crawl-delay` can raise the base, up to `max_floor`.

use crate::config::FetchConfig;
use crate::pipeline::retry::random_jitter;
use std::time::Duration;

/// Cap on a robots.txt `Crawl-delay` unless configured otherwise
const DEFAULT_MAX_FLOOR: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiter {
    base: Duration,
    jitter: Duration,
    max_floor: Duration,
}

impl RateLimiter {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self {
            base,
            jitter,
            max_floor: DEFAULT_MAX_FLOOR,
        }
    }

    /// Sets the largest `Crawl-delay` that may raise the base
    pub fn with_max_floor(mut self, max_floor: Duration) -> Self {
        self.max_floor = max_floor;
        self
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(
            Duration::from_millis(config.rate_limit_base_ms),
            Duration::from_millis(config.rate_limit_jitter_ms),
        )
        .with_max_floor(Duration::from_secs(config.max_crawl_delay_secs))
    }

    /// Picks the next delay; a site's `Crawl-delay` raises the base
    ///
    /// The `Crawl-delay` is clamped to `max_floor`.
    pub fn next_delay(&self, floor: Option<Duration>) -> Duration {
        let base = floor.map_or(self.base, |floor| self.base.max(floor.min(self.max_floor)));
        base + random_jitter(self.jitter)
    }

    /// Sleeps for [`RateLimiter::next_delay`]
    pub async fn wait(&self, floor: Option<Duration>) {
        if let Some(floor) = floor.filter(|floor| *floor > self.max_floor) {
            tracing::info!(
                crawl_delay_secs = floor.as_secs_f64(),
                max_secs = self.max_floor.as_secs_f64(),
                "Crawl-delay above the configured maximum, capping"
            );
        }

        let delay = self.next_delay(floor);
        if delay.is_zero() {
            return;
        }
        tracing::debug!(delay_ms = delay.as_millis() as u64, "Rate limiting");
        tokio::time::sleep(delay).await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::from_config(&FetchConfig::default())
    }
}
