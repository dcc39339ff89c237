//! Pipeline orchestrator
//!
//! Runs one pipeline invocation end to end:
//!
//! 1. Authorize the invocation (kill switch, credential, context)
//! 2. Acquire the job lock, or report the run as skipped
//! 3. Process every seed on a fixed-width worker pool
//! 4. Aggregate results and record run history
//! 5. Release the lock on every exit path

use crate::config::Config;
use crate::lock::LockGuard;
use crate::output::{RunReport, SeedResult};
use crate::pipeline::extract::{Extractor, PageExtractor};
use crate::pipeline::fetcher::{FetchOutcome, FetchedPage, Fetcher, Validators};
use crate::pipeline::rate_limit::RateLimiter;
use crate::pipeline::retry::{with_retry, RetryPolicy};
use crate::pipeline::RunError;
use crate::robots::{RobotsDecision, RobotsGate};
use crate::state::RunState;
use crate::storage::{
    db_timestamp, lock_storage, RunStatus, RunTotals, ScrapedItemRecord, SharedStorage, Storage,
};
use crate::trigger::{authorize, TriggerContext};
use crate::url::{canonicalize, extract_domain};
use crate::SeedlineError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Per-seed processing shared by every worker task
#[derive(Clone)]
struct SeedWorker {
    storage: SharedStorage,
    gate: Arc<RobotsGate>,
    fetcher: Arc<Fetcher>,
    extractor: Arc<dyn Extractor>,
    retry: RetryPolicy,
    limiter: RateLimiter,
}

impl SeedWorker {
    /// Robots gate -> prior validators -> conditional fetch with retry ->
    /// persist -> rate-limit delay
    ///
    /// Never fails: every error is folded into the returned result.
    async fn process(&self, seed: &str) -> SeedResult {
        let crawl_delay = match self.gate.check(seed).await {
            RobotsDecision::Allowed { crawl_delay } => crawl_delay,
            RobotsDecision::Denied(reason) => {
                tracing::info!(url = seed, reason = ?reason, "Seed skipped by policy");
                return SeedResult::robots_disallowed(seed);
            }
        };

        let canonical = canonicalize(seed);
        let validators = self.load_validators(&canonical);

        let fetcher: &Fetcher = &self.fetcher;
        let prior = validators.as_ref();
        let fetched = with_retry(&self.retry, move || fetcher.fetch(seed, prior)).await;

        let result = match fetched {
            Ok(FetchOutcome::NotModified) => {
                self.touch_fetch_meta(&canonical);
                tracing::info!(url = seed, "Not modified");
                SeedResult::not_modified(seed)
            }
            Ok(FetchOutcome::Fetched(page)) => self.persist(seed, &canonical, &page),
            Err(e) => {
                tracing::warn!(url = seed, error = %e, "Seed fetch failed");
                SeedResult::error(seed, &e)
            }
        };

        self.limiter.wait(crawl_delay).await;
        result
    }

    fn load_validators(&self, canonical: &str) -> Option<Validators> {
        let meta = lock_storage(&self.storage).and_then(|storage| storage.get_fetch_meta(canonical));

        match meta {
            Ok(Some(meta)) => {
                let validators = Validators {
                    etag: meta.etag,
                    last_modified: meta.last_modified,
                };
                (!validators.is_empty()).then_some(validators)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(url = canonical, error = %e, "Could not load fetch metadata");
                None
            }
        }
    }

    fn touch_fetch_meta(&self, canonical: &str) {
        let result =
            lock_storage(&self.storage).and_then(|mut storage| storage.touch_fetch_meta(canonical));
        if let Err(e) = result {
            tracing::warn!(url = canonical, error = %e, "Could not update fetch metadata");
        }
    }

    /// Upserts the page's items and its fresh validators
    ///
    /// Write failures are logged; the seed still reports what was fetched.
    fn persist(&self, seed: &str, canonical: &str, page: &FetchedPage) -> SeedResult {
        let items = self.extractor.extract(page);
        let seed_domain = domain_of(canonical).unwrap_or_default();
        let now = db_timestamp(Utc::now());

        match lock_storage(&self.storage) {
            Ok(mut storage) => {
                for item in &items {
                    let canonical_item_url = canonicalize(&item.item_url);
                    let record = ScrapedItemRecord {
                        source_domain: domain_of(&canonical_item_url)
                            .unwrap_or_else(|| seed_domain.clone()),
                        item_url: item.item_url.clone(),
                        canonical_item_url,
                        title: item.title.clone(),
                        metadata: item.metadata.clone(),
                        content_hash: item.content_hash.clone(),
                        last_seen_at: now.clone(),
                    };
                    if let Err(e) = storage.upsert_scraped_item(&record) {
                        tracing::warn!(url = %record.item_url, error = %e, "Item upsert failed");
                    }
                }

                if let Err(e) = storage.upsert_fetch_meta(
                    canonical,
                    page.validators.etag.as_deref(),
                    page.validators.last_modified.as_deref(),
                ) {
                    tracing::warn!(url = canonical, error = %e, "Fetch metadata upsert failed");
                }
            }
            Err(e) => tracing::error!(url = seed, error = %e, "Storage unavailable, nothing persisted"),
        }

        tracing::info!(
            url = seed,
            status = page.status,
            items = items.len(),
            bytes = page.size,
            "Seed fetched"
        );

        SeedResult::fetched(
            seed,
            page.status,
            items.len() as u64,
            page.size,
            page.hash.clone(),
        )
    }
}

fn domain_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(extract_domain)
}

fn advance(state: &mut RunState, next: RunState) -> Result<(), RunError> {
    state
        .advance(next)
        .map_err(|e| RunError::Internal(e.to_string()))
}

/// The content-fetch pipeline
pub struct Pipeline {
    config: Arc<Config>,
    config_hash: String,
    worker: SeedWorker,
}

impl Pipeline {
    /// Creates a pipeline over `storage` with the default extractor
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash of the configuration file, recorded with each run
    /// * `storage` - Shared relational store
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        storage: SharedStorage,
    ) -> Result<Self, SeedlineError> {
        let worker = SeedWorker {
            storage,
            gate: Arc::new(RobotsGate::new(&config)?),
            fetcher: Arc::new(Fetcher::new(&config.user_agent, &config.fetch)?),
            extractor: Arc::new(PageExtractor),
            retry: RetryPolicy::from_config(&config.fetch),
            limiter: RateLimiter::from_config(&config.fetch),
        };

        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            worker,
        })
    }

    /// Replaces the extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.worker.extractor = extractor;
        self
    }

    /// Replaces the retry schedule
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.worker.retry = retry;
        self
    }

    /// Replaces the post-fetch delay
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.worker.limiter = limiter;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.worker.storage
    }

    /// Runs as an internal invocation using the configured secret
    pub async fn run_internal(&self) -> Result<RunReport, RunError> {
        self.trigger(&TriggerContext::internal(&self.config.trigger.secret))
            .await
    }

    /// Runs the pipeline for one invocation
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run completed (individual seeds may have failed)
    /// * `Err(RunError::AlreadyRunning)` - Another run holds the lock; nothing was done
    /// * `Err(RunError)` - The invocation was refused before any side effect
    pub async fn trigger(&self, context: &TriggerContext) -> Result<RunReport, RunError> {
        let mut state = RunState::Authorizing;
        authorize(&self.config.trigger, context)?;

        advance(&mut state, RunState::LockAcquiring)?;
        let pipeline = &self.config.pipeline;
        let Some(guard) =
            LockGuard::acquire(self.storage(), &pipeline.lock_name, pipeline.lock_ttl_minutes)
        else {
            advance(&mut state, RunState::Skipped)?;
            tracing::info!(lock = %pipeline.lock_name, "Run skipped: another run holds the lock");
            return Err(RunError::AlreadyRunning);
        };

        advance(&mut state, RunState::Running)?;
        let outcome = self.run_locked(&mut state).await;

        drop(guard);
        if let Err(e) = advance(&mut state, RunState::Released) {
            tracing::error!(error = %e, "Run ended in an unexpected state");
        }

        outcome
    }

    /// Body of a run while the lock is held
    async fn run_locked(&self, state: &mut RunState) -> Result<RunReport, RunError> {
        let started = Instant::now();
        let run_id = self.record_run_start();

        tracing::info!(
            seeds = self.config.pipeline.seeds.len(),
            concurrency = self.config.pipeline.concurrency,
            "Run started"
        );

        let results = self.process_seeds().await;

        let outcome = advance(state, RunState::Finalizing)
            .map(|()| RunReport::new(results, started.elapsed()));

        match &outcome {
            Ok(report) => {
                let summary = &report.summary;
                tracing::info!(
                    urls_processed = summary.urls_processed,
                    succeeded = summary.succeeded,
                    total_items = summary.total_items,
                    total_bytes = summary.total_bytes,
                    duration_ms = summary.duration_ms,
                    "Run completed"
                );
                self.record_run_finish(run_id, RunStatus::Completed, &summary.totals());
            }
            Err(e) => {
                tracing::error!(error = %e, "Run failed");
                self.record_run_finish(run_id, RunStatus::Failed, &RunTotals::default());
            }
        }

        outcome
    }

    /// Processes every seed with at most `concurrency` in flight
    ///
    /// Results come back in seed order.
    async fn process_seeds(&self) -> Vec<SeedResult> {
        let seeds = &self.config.pipeline.seeds;
        let semaphore = Arc::new(Semaphore::new(self.config.pipeline.concurrency as usize));
        let mut join_set = JoinSet::new();

        for (index, seed) in seeds.iter().enumerate() {
            let worker = self.worker.clone();
            let semaphore = Arc::clone(&semaphore);
            let seed = seed.clone();

            join_set.spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    return (index, SeedResult::error(&seed, "worker pool closed"));
                };
                (index, worker.process(&seed).await)
            });
        }

        let mut slots: Vec<Option<SeedResult>> = vec![None; seeds.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Seed worker task failed"),
            }
        }

        slots
            .into_iter()
            .zip(seeds)
            .map(|(slot, seed)| {
                slot.unwrap_or_else(|| SeedResult::error(seed, "worker task failed"))
            })
            .collect()
    }

    fn record_run_start(&self) -> Option<i64> {
        let created =
            lock_storage(self.storage()).and_then(|mut storage| storage.create_run(&self.config_hash));
        match created {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(error = %e, "Could not record run start");
                None
            }
        }
    }

    fn record_run_finish(&self, run_id: Option<i64>, status: RunStatus, totals: &RunTotals) {
        let Some(run_id) = run_id else {
            return;
        };
        let finished = lock_storage(self.storage())
            .and_then(|mut storage| storage.finish_run(run_id, status, totals));
        if let Err(e) = finished {
            tracing::warn!(run_id, error = %e, "Could not record run end");
        }
    }
}
