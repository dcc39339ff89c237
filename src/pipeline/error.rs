//! Error types for the fetch path and for whole runs

use std::error::Error as _;
use std::io;
use thiserror::Error;

/// A failed content fetch
///
/// Every variant is produced where the failure happens, so deciding whether
/// to retry is a plain match over this enum.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Non-2xx, non-304 response
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("connection reset while fetching {url}")]
    ConnectionReset { url: String },

    #[error("could not connect to {url}")]
    Connect { url: String },

    #[error("failed to read response body from {url}")]
    Body { url: String },

    #[error("response from {url} exceeds {limit} bytes")]
    BodyTooLarge { url: String, limit: u64 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl FetchError {
    /// Classifies a transport-level reqwest error
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let url = url.to_string();

        if err.is_timeout() {
            return Self::Timeout { url };
        }
        if is_connection_reset(err) {
            return Self::ConnectionReset { url };
        }
        if err.is_connect() {
            return Self::Connect { url };
        }
        if err.is_body() || err.is_decode() {
            return Self::Body { url };
        }
        if err.is_builder() {
            return Self::InvalidUrl(url);
        }

        Self::Request {
            url,
            message: err.to_string(),
        }
    }

    /// The HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Walks the source chain looking for an IO reset
fn is_connection_reset(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io_err) = cause.downcast_ref::<io::Error>() {
            if matches!(
                io_err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) {
                return true;
            }
        }
        source = cause.source();
    }
    false
}

/// Run-level outcomes that stop a run before (or instead of) fetching
#[derive(Debug, Error)]
pub enum RunError {
    #[error("missing or invalid credential")]
    Unauthorized,

    #[error("invocation context not allowed")]
    Forbidden,

    #[error("pipeline is temporarily disabled")]
    Disabled,

    #[error("another run holds the lock")]
    AlreadyRunning,

    #[error("internal error: {0}")]
    Internal(String),
}

impl RunError {
    /// HTTP status code reported by the trigger surface
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::Disabled => 503,
            Self::AlreadyRunning => 423,
            Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::Disabled => "disabled",
            Self::AlreadyRunning => "already_running",
            Self::Internal(_) => "internal",
        }
    }

    /// True when the run was skipped rather than refused
    pub fn is_skip(&self) -> bool {
        matches!(self, Self::AlreadyRunning)
    }
}
