//! Robots policy gate
//!
//! Decides whether a URL may be fetched. A URL passes only if its host is on
//! the configured allow-list and the origin's robots.txt permits it for our
//! product token. Any failure to obtain robots.txt denies the URL, except a
//! 404/410 which means the site has no rules.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::ParsedRobots;

use crate::config::Config;
use crate::url::{extract_domain, extract_origin, is_domain_allowed, parse_http_url};
use crate::SeedlineError;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Errors obtaining robots.txt
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("robots.txt returned status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("robots.txt at {url} is not valid UTF-8")]
    Encoding { url: String },
}

/// Why a URL was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// Not an absolute http(s) URL with a host
    InvalidUrl,
    /// Host is not on the allow-list
    NotAllowListed,
    /// robots.txt could not be obtained
    Unavailable,
    /// robots.txt rules disallow the path
    Disallowed,
}

/// Outcome of a robots check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RobotsDecision {
    Allowed {
        /// `Crawl-delay` that applies to us, if declared
        crawl_delay: Option<Duration>,
    },
    Denied(DenyReason),
}

impl RobotsDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Allow-list plus robots.txt evaluation with a per-origin cache
pub struct RobotsGate {
    client: Client,
    allowed_domains: Vec<String>,
    agent_token: String,
    cache: RobotsCache,
}

impl RobotsGate {
    /// Creates a gate from configuration
    ///
    /// The gate owns an HTTP client with the robots timeout and the
    /// configured user agent.
    pub fn new(config: &Config) -> Result<Self, SeedlineError> {
        let client = Client::builder()
            .user_agent(config.user_agent.header_value())
            .timeout(Duration::from_secs(config.fetch.robots_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            allowed_domains: config.policy.allowed_domains.clone(),
            agent_token: config.user_agent.crawler_name.clone(),
            cache: RobotsCache::new(),
        })
    }

    /// Returns whether the URL may be fetched
    pub async fn is_allowed(&self, url: &str) -> bool {
        self.check(url).await.is_allowed()
    }

    /// Evaluates a URL against the allow-list and the origin's robots.txt
    pub async fn check(&self, url: &str) -> RobotsDecision {
        let parsed = match parse_http_url(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(url, error = %e, "Denying unparseable URL");
                return RobotsDecision::Denied(DenyReason::InvalidUrl);
            }
        };

        let (Some(domain), Some(origin)) = (extract_domain(&parsed), extract_origin(&parsed))
        else {
            return RobotsDecision::Denied(DenyReason::InvalidUrl);
        };

        if !is_domain_allowed(&self.allowed_domains, &domain) {
            tracing::info!(url, domain = %domain, "Domain is not on the allow-list");
            return RobotsDecision::Denied(DenyReason::NotAllowListed);
        }

        let robots = match self.robots_for(&origin).await {
            Ok(robots) => robots,
            Err(e) => {
                tracing::warn!(url, error = %e, "robots.txt unavailable, denying");
                return RobotsDecision::Denied(DenyReason::Unavailable);
            }
        };

        if !robots.is_allowed(parsed.as_str(), &self.agent_token) {
            tracing::info!(url, "Disallowed by robots.txt");
            return RobotsDecision::Denied(DenyReason::Disallowed);
        }

        let crawl_delay = robots
            .crawl_delay(&self.agent_token)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());

        RobotsDecision::Allowed { crawl_delay }
    }

    async fn robots_for(&self, origin: &str) -> Result<ParsedRobots, RobotsError> {
        if let Some(robots) = self.cache.get(origin) {
            tracing::debug!(origin, "robots.txt cache hit");
            return Ok(robots);
        }

        let robots = self.fetch_robots(origin).await?;
        self.cache.insert(origin, robots.clone());
        Ok(robots)
    }

    async fn fetch_robots(&self, origin: &str) -> Result<ParsedRobots, RobotsError> {
        let url = format!("{}/robots.txt", origin);
        tracing::debug!(url = %url, "Fetching robots.txt");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| RobotsError::Fetch {
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            tracing::debug!(url = %url, status = status.as_u16(), "No robots.txt, allowing all");
            return Ok(ParsedRobots::allow_all());
        }
        if !status.is_success() {
            return Err(RobotsError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| RobotsError::Fetch {
                url: url.clone(),
                source,
            })?;
        let content = String::from_utf8(bytes.to_vec())
            .map_err(|_| RobotsError::Encoding { url: url.clone() })?;

        Ok(ParsedRobots::from_content(&content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn gate_config(allowed: &str, robots_timeout_secs: u64) -> Config {
        let toml = format!(
            r#"
[pipeline]
seeds = []

[fetch]
robots-timeout-secs = {robots_timeout_secs}

[user-agent]
crawler-name = "SeedlineBot"
crawler-version = "1.0"
contact-url = "https://example.com/bot"
contact-email = "bot@example.com"

[policy]
allowed-domains = ["{allowed}"]

[trigger]
secret = "s3cret"

[output]
database-path = "unused.db"
"#
        );
        parse_config(&toml).unwrap()
    }

    async fn serve_robots(server: &MockServer, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_domain_not_on_allow_list_is_denied_without_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let gate = RobotsGate::new(&gate_config("allowed.example", 5)).unwrap();
        let decision = gate.check(&format!("{}/a", server.uri())).await;

        assert_eq!(decision, RobotsDecision::Denied(DenyReason::NotAllowListed));
    }

    #[tokio::test]
    async fn test_allows_when_rules_permit() {
        let server = MockServer::start().await;
        serve_robots(
            &server,
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert!(gate.is_allowed(&format!("{}/public", server.uri())).await);
        assert_eq!(
            gate.check(&format!("{}/private/x", server.uri())).await,
            RobotsDecision::Denied(DenyReason::Disallowed)
        );
    }

    #[tokio::test]
    async fn test_missing_robots_allows_all() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(404)).await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert!(gate.is_allowed(&format!("{}/anything", server.uri())).await);
    }

    #[tokio::test]
    async fn test_server_error_fails_closed() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(500)).await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert_eq!(
            gate.check(&format!("{}/a", server.uri())).await,
            RobotsDecision::Denied(DenyReason::Unavailable)
        );
    }

    #[tokio::test]
    async fn test_forbidden_robots_fails_closed() {
        let server = MockServer::start().await;
        serve_robots(&server, ResponseTemplate::new(403)).await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert!(!gate.is_allowed(&format!("{}/a", server.uri())).await);
    }

    #[tokio::test]
    async fn test_timeout_fails_closed() {
        let server = MockServer::start().await;
        serve_robots(
            &server,
            ResponseTemplate::new(200)
                .set_body_string("User-agent: *\nAllow: /")
                .set_delay(Duration::from_secs(3)),
        )
        .await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 1)).unwrap();
        assert_eq!(
            gate.check(&format!("{}/a", server.uri())).await,
            RobotsDecision::Denied(DenyReason::Unavailable)
        );
    }

    #[tokio::test]
    async fn test_robots_fetched_once_per_origin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nAllow: /"))
            .expect(1)
            .mount(&server)
            .await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert!(gate.is_allowed(&format!("{}/a", server.uri())).await);
        assert!(gate.is_allowed(&format!("{}/b", server.uri())).await);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert!(!gate.is_allowed(&format!("{}/a", server.uri())).await);
        assert!(!gate.is_allowed(&format!("{}/b", server.uri())).await);
    }

    #[tokio::test]
    async fn test_reports_crawl_delay() {
        let server = MockServer::start().await;
        serve_robots(
            &server,
            ResponseTemplate::new(200).set_body_string("User-agent: *\nCrawl-delay: 2"),
        )
        .await;

        let gate = RobotsGate::new(&gate_config("127.0.0.1", 5)).unwrap();
        assert_eq!(
            gate.check(&format!("{}/a", server.uri())).await,
            RobotsDecision::Allowed {
                crawl_delay: Some(Duration::from_secs(2))
            }
        );
    }

    #[tokio::test]
    async fn test_non_http_url_is_denied() {
        let gate = RobotsGate::new(&gate_config("example.com", 5)).unwrap();
        assert_eq!(
            gate.check("ftp://example.com/file").await,
            RobotsDecision::Denied(DenyReason::InvalidUrl)
        );
    }
}
