//! Conditional HTTP fetcher
//!
//! Sends a GET carrying the crawler's identity and, when prior validators
//! exist, `If-None-Match`/`If-Modified-Since`. A 304 short-circuits; any
//! other non-2xx becomes [`FetchError::Status`].

use crate::config::{FetchConfig, UserAgentConfig};
use crate::pipeline::FetchError;
use reqwest::header::{
    HeaderName, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH,
    LAST_MODIFIED,
};
use reqwest::{Client, StatusCode};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Revalidation headers remembered from a previous fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl Validators {
    pub fn is_empty(&self) -> bool {
        self.etag.is_none() && self.last_modified.is_none()
    }
}

/// A successfully fetched body with its fingerprint
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// The URL that was requested
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    /// Hex SHA-256 of the body
    pub hash: String,
    pub size: u64,
    pub validators: Validators,
}

/// Result of a conditional GET
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    NotModified,
    Fetched(FetchedPage),
}

/// Builds the HTTP client used for content fetches
///
/// # Arguments
///
/// * `user_agent` - Identity sent on every request
/// * `fetch` - Timeouts
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    fetch: &FetchConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Hex SHA-256 of a byte string
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Issues conditional GETs with fixed content-negotiation headers
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    accept: String,
    accept_language: String,
    max_body_bytes: u64,
}

impl Fetcher {
    pub fn new(user_agent: &UserAgentConfig, fetch: &FetchConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(user_agent, fetch)?,
            accept: fetch.accept.clone(),
            accept_language: fetch.accept_language.clone(),
            max_body_bytes: fetch.max_body_bytes,
        })
    }

    /// Fetches `url`, revalidating against `validators` if given
    pub async fn fetch(
        &self,
        url: &str,
        validators: Option<&Validators>,
    ) -> Result<FetchOutcome, FetchError> {
        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, self.accept.as_str())
            .header(ACCEPT_LANGUAGE, self.accept_language.as_str());

        if let Some(validators) = validators {
            if let Some(etag) = &validators.etag {
                request = request.header(IF_NONE_MATCH, etag.as_str());
            }
            if let Some(last_modified) = &validators.last_modified {
                request = request.header(IF_MODIFIED_SINCE, last_modified.as_str());
            }
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?;

        let status = response.status();
        if status == StatusCode::NOT_MODIFIED {
            tracing::debug!(url, "Not modified");
            return Ok(FetchOutcome::NotModified);
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let validators = Validators {
            etag: header(ETAG),
            last_modified: header(LAST_MODIFIED),
        };
        let content_type = header(CONTENT_TYPE);

        let too_large = || FetchError::BodyTooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|length| length > self.max_body_bytes)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::from_reqwest(url, &e))?
        {
            if (body.len() + chunk.len()) as u64 > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }

        let page = FetchedPage {
            url: url.to_string(),
            status: status.as_u16(),
            content_type,
            hash: sha256_hex(&body),
            size: body.len() as u64,
            body,
            validators,
        };

        tracing::debug!(url, status = page.status, bytes = page.size, "Fetched");
        Ok(FetchOutcome::Fetched(page))
    }
}
