use serde::Deserialize;

/// Main configuration structure for Seedline
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub policy: PolicyConfig,
    pub trigger: TriggerConfig,
    pub output: OutputConfig,
}

/// Run-level configuration: what to fetch and how wide
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Name of the job lock row guarding this pipeline
    #[serde(rename = "lock-name", default = "default_lock_name")]
    pub lock_name: String,

    /// Lease length of the job lock, in minutes
    #[serde(rename = "lock-ttl-minutes", default = "default_lock_ttl_minutes")]
    pub lock_ttl_minutes: u32,

    /// Number of seeds processed concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Seed URLs fetched on every run
    #[serde(default)]
    pub seeds: Vec<String>,
}

/// Network behavior of the fetch path
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Hard deadline for a content fetch (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Hard deadline for a robots.txt fetch (seconds)
    #[serde(rename = "robots-timeout-secs", default = "default_robots_timeout_secs")]
    pub robots_timeout_secs: u64,

    /// Retries after the initial attempt for transient failures
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff (milliseconds)
    #[serde(rename = "retry-base-delay-ms", default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    #[serde(rename = "retry-jitter-ms", default = "default_retry_jitter_ms")]
    pub retry_jitter_ms: u64,

    /// Fixed delay applied after every fetch (milliseconds)
    #[serde(rename = "rate-limit-base-ms", default = "default_rate_limit_base_ms")]
    pub rate_limit_base_ms: u64,

    /// Upper bound of the random jitter added to the rate-limit delay (milliseconds)
    #[serde(rename = "rate-limit-jitter-ms", default = "default_rate_limit_jitter_ms")]
    pub rate_limit_jitter_ms: u64,

    /// Largest `Crawl-delay` honored as the post-fetch delay (seconds)
    #[serde(rename = "max-crawl-delay-secs", default = "default_max_crawl_delay_secs")]
    pub max_crawl_delay_secs: u64,

    /// Responses larger than this are rejected (bytes)
    #[serde(rename = "max-body-bytes", default = "default_max_body_bytes")]
    pub max_body_bytes: u64,

    /// Value of the Accept header on content fetches
    #[serde(default = "default_accept")]
    pub accept: String,

    /// Value of the Accept-Language header on content fetches
    #[serde(rename = "accept-language", default = "default_accept_language")]
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            robots_timeout_secs: default_robots_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_jitter_ms: default_retry_jitter_ms(),
            rate_limit_base_ms: default_rate_limit_base_ms(),
            rate_limit_jitter_ms: default_rate_limit_jitter_ms(),
            max_crawl_delay_secs: default_max_crawl_delay_secs(),
            max_body_bytes: default_max_body_bytes(),
            accept: default_accept(),
            accept_language: default_accept_language(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler; also the product token matched against robots.txt groups
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Full user agent header value: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Crawl policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    /// Domain patterns (e.g., "example.com" or "*.example.com") that may be fetched.
    /// Every other domain is denied.
    #[serde(rename = "allowed-domains", default)]
    pub allowed_domains: Vec<String>,
}

/// Entry-point gating configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    /// Bearer token callers must present
    pub secret: String,

    /// Kill switch; when false every invocation is rejected as disabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Production mode: additionally require a scheduler or internal-run header
    #[serde(default)]
    pub hardened: bool,

    /// Listen address for the HTTP trigger server
    #[serde(default = "default_bind")]
    pub bind: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_lock_name() -> String {
    "scrape".to_string()
}

fn default_lock_ttl_minutes() -> u32 {
    10
}

fn default_concurrency() -> u32 {
    3
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_robots_timeout_secs() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_retry_jitter_ms() -> u64 {
    1000
}

fn default_rate_limit_base_ms() -> u64 {
    1500
}

fn default_rate_limit_jitter_ms() -> u64 {
    500
}

fn default_max_crawl_delay_secs() -> u64 {
    30
}

fn default_max_body_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_accept() -> String {
    "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string()
}

fn default_accept_language() -> String {
    "en-US,en;q=0.9".to_string()
}

fn default_true() -> bool {
    true
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
