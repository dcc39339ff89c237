//! Bounded exponential backoff
//!
//! `with_retry` knows nothing about HTTP. It asks the error whether another
//! attempt could succeed and sleeps `base * 2^n + jitter` between attempts.

use crate::config::FetchConfig;
use crate::pipeline::FetchError;
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Errors that know whether a repeat attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for FetchError {
    /// 429, 5xx, timeouts and resets are transient; everything else fails fast
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
            FetchError::Timeout { .. } | FetchError::ConnectionReset { .. } => true,
            FetchError::Connect { .. }
            | FetchError::Body { .. }
            | FetchError::BodyTooLarge { .. }
            | FetchError::Request { .. }
            | FetchError::InvalidUrl(_) => false,
        }
    }
}

/// Retry schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the initial one
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to each delay
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_jitter: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_jitter: Duration::from_millis(config.retry_jitter_ms),
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff(attempt) + random_jitter(self.max_jitter)
    }
}

/// Uniform jitter in `0..=max`
pub(crate) fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis().min(u128::from(u64::MAX)) as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..=max_ms))
}

/// Runs `operation`, retrying transient failures per `policy`
///
/// Makes at most `max_retries + 1` attempts. When retries run out, or the
/// error is not retryable, the last error is returned unchanged.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_retryable() {
                    tracing::debug!(error = %err, "Not retryable, giving up");
                    return Err(err);
                }
                if attempt >= policy.max_retries {
                    tracing::warn!(attempts = attempt + 1, error = %err, "Retries exhausted");
                    return Err(err);
                }

                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient failure, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_jitter: Duration::ZERO,
        }
    }

    fn status(status: u16) -> FetchError {
        FetchError::Status {
            url: "https://example.com/".to_string(),
            status,
        }
    }

    async fn count_calls(policy: RetryPolicy, err_status: u16) -> (Result<(), FetchError>, u32) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(&policy, || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(status(err_status))
            }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[test]
    fn test_classification() {
        assert!(status(429).is_retryable());
        assert!(status(500).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(401).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(FetchError::Timeout { url: String::new() }.is_retryable());
        assert!(FetchError::ConnectionReset { url: String::new() }.is_retryable());
        assert!(!FetchError::BodyTooLarge {
            url: String::new(),
            limit: 1
        }
        .is_retryable());
        assert!(!FetchError::Request {
            url: String::new(),
            message: "weird".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff(2), Duration::from_millis(4000));
    }

    #[test]
    fn test_jitter_is_bounded() {
        for _ in 0..100 {
            assert!(random_jitter(Duration::from_millis(10)) <= Duration::from_millis(10));
        }
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_forbidden_is_called_once() {
        let (result, calls) = count_calls(fast_policy(3), 403).await;
        assert_eq!(calls, 1);
        assert_eq!(result.unwrap_err().status(), Some(403));
    }

    #[tokio::test]
    async fn test_unavailable_exhausts_retries_then_propagates() {
        let (result, calls) = count_calls(fast_policy(3), 503).await;
        assert_eq!(calls, 4);
        assert_eq!(result.unwrap_err().status(), Some(503));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = with_retry(&fast_policy(3), || {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(status(429))
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_retries_means_single_attempt() {
        let (_, calls) = count_calls(fast_policy(0), 503).await;
        assert_eq!(calls, 1);
    }
}
