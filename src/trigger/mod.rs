//! Entry-point gating
//!
//! Decides whether an invocation may start a run. Checks run in a fixed
//! order and stop at the first failure:
//!
//! 1. Kill switch (`trigger.enabled = false`) -> [`RunError::Disabled`]
//! 2. Bearer credential against `trigger.secret` -> [`RunError::Unauthorized`]
//! 3. In hardened mode, a scheduler or internal-run header -> [`RunError::Forbidden`]

use crate::config::TriggerConfig;
use crate::pipeline::RunError;
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use sha2::{Digest, Sha256};

/// Header set by the scheduler on timed invocations
pub const CRON_HEADER: &str = "x-cron-invocation";

/// Header set by in-process and CLI invocations
pub const INTERNAL_RUN_HEADER: &str = "x-internal-run";

/// What the caller presented
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerContext {
    pub bearer_token: Option<String>,
    pub cron_invocation: bool,
    pub internal_run: bool,
}

impl TriggerContext {
    /// Reads the credential and invocation markers from request headers
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            bearer_token: extract_bearer_token(headers).map(str::to_string),
            cron_invocation: has_marker(headers, CRON_HEADER),
            internal_run: has_marker(headers, INTERNAL_RUN_HEADER),
        }
    }

    /// Context for a run started from this process
    pub fn internal(secret: &str) -> Self {
        Self {
            bearer_token: Some(secret.to_string()),
            cron_invocation: false,
            internal_run: true,
        }
    }
}

/// Extracts the token from `Authorization: Bearer <token>`
///
/// The scheme is matched case-insensitively.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() >= 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
        .filter(|token| !token.is_empty())
}

fn has_marker(headers: &HeaderMap, name: &str) -> bool {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| !v.trim().is_empty() && !v.trim().eq_ignore_ascii_case("false"))
        .unwrap_or(false)
}

fn hash_token(token: &str) -> [u8; 32] {
    Sha256::digest(token.as_bytes()).into()
}

/// Compares two secrets without short-circuiting on the first differing byte
fn tokens_match(presented: &str, expected: &str) -> bool {
    let a = hash_token(presented);
    let b = hash_token(expected);
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Authorizes an invocation
pub fn authorize(config: &TriggerConfig, context: &TriggerContext) -> Result<(), RunError> {
    if !config.enabled {
        tracing::warn!("Invocation rejected: pipeline disabled");
        return Err(RunError::Disabled);
    }

    let credential_ok = context
        .bearer_token
        .as_deref()
        .is_some_and(|token| tokens_match(token, &config.secret));
    if !credential_ok {
        tracing::warn!(
            token_present = context.bearer_token.is_some(),
            "Invocation rejected: bad credential"
        );
        return Err(RunError::Unauthorized);
    }

    if config.hardened && !(context.cron_invocation || context.internal_run) {
        tracing::warn!("Invocation rejected: not a scheduler or internal run");
        return Err(RunError::Forbidden);
    }

    Ok(())
}
