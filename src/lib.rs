//! Seedline: a polite, idempotent content-fetch pipeline
//!
//! This crate fetches a bounded set of seed URLs while respecting each site's
//! robots.txt, avoiding overlapping runs through a lease-based job lock,
//! revalidating content with conditional GETs, and upserting normalized
//! results keyed by canonical URL.

pub mod config;
pub mod lock;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod server;
pub mod state;
pub mod storage;
pub mod trigger;
pub mod url;

use thiserror::Error;

/// Main error type for Seedline operations
#[derive(Debug, Error)]
pub enum SeedlineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch error: {0}")]
    Fetch(#[from] pipeline::FetchError),

    #[error("Run error: {0}")]
    Run(#[from] pipeline::RunError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Seedline operations
pub type Result<T> = std::result::Result<T, SeedlineError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use pipeline::{Pipeline, RunError};
pub use state::RunState;
pub use url::{canonicalize, extract_domain};
