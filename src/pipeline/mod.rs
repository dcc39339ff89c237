//! The content-fetch pipeline
//!
//! This module handles everything between a trigger and the stored result:
//! - Conditional fetching with revalidation headers
//! - Retry with exponential backoff on transient failures
//! - Per-call politeness delays
//! - Item extraction
//! - Orchestration across a bounded worker pool

mod error;
pub mod extract;
pub mod fetcher;
mod orchestrator;
pub mod rate_limit;
pub mod retry;

pub use error::{FetchError, RunError};
pub use extract::{ExtractedItem, Extractor, PageExtractor};
pub use fetcher::{build_http_client, FetchOutcome, FetchedPage, Fetcher, Validators};
pub use orchestrator::Pipeline;
pub use rate_limit::RateLimiter;
pub use retry::{with_retry, RetryPolicy, Retryable};
