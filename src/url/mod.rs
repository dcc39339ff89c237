//! URL handling module for Seedline
//!
//! This module provides URL canonicalization, host and origin extraction,
//! and allow-list pattern matching.

mod canonicalize;
mod domain;
mod matcher;

pub use canonicalize::canonicalize;
pub use domain::{extract_domain, extract_origin, parse_http_url};
pub use matcher::{is_domain_allowed, matches_domain_pattern};
