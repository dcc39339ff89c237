//! Lease-based job lock
//!
//! A named lock row in the `job_locks` table guards a pipeline run. The row
//! carries an expiry; once the expiry passes, any caller may take the lease
//! over with a single conditional update. Release deletes the row and never
//! fails the caller.

use crate::storage::{lock_storage, SharedStorage, Storage, StorageError};
use chrono::{DateTime, Duration, Utc};

/// Attempts to acquire the named lock for `ttl_minutes`
///
/// # Returns
///
/// * `true` - The caller now holds the lease
/// * `false` - Another live holder exists, or the store failed
pub fn acquire_lock(storage: &SharedStorage, name: &str, ttl_minutes: u32) -> bool {
    acquire_lock_at(storage, name, ttl_minutes, Utc::now())
}

/// Same as [`acquire_lock`] with an explicit clock reading
pub fn acquire_lock_at(
    storage: &SharedStorage,
    name: &str,
    ttl_minutes: u32,
    now: DateTime<Utc>,
) -> bool {
    let expires_at = now + Duration::minutes(i64::from(ttl_minutes));

    let mut guard = match lock_storage(storage) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::error!(lock = name, error = %e, "Lock acquisition failed");
            return false;
        }
    };

    match guard.insert_lock(name, expires_at, now) {
        Ok(()) => {
            tracing::info!(lock = name, expires_at = %expires_at, "Lock acquired");
            true
        }
        Err(StorageError::ConstraintViolation(_)) => {
            match guard.steal_expired_lock(name, expires_at, now) {
                Ok(1) => {
                    tracing::warn!(lock = name, expires_at = %expires_at, "Took over expired lock");
                    true
                }
                Ok(_) => {
                    tracing::info!(lock = name, "Lock is held by another run");
                    false
                }
                Err(e) => {
                    tracing::error!(lock = name, error = %e, "Lock takeover failed");
                    false
                }
            }
        }
        Err(e) => {
            tracing::error!(lock = name, error = %e, "Lock acquisition failed");
            false
        }
    }
}

/// Releases the named lock
///
/// Failures are logged and swallowed.
pub fn release_lock(storage: &SharedStorage, name: &str) {
    let result = lock_storage(storage).and_then(|mut guard| guard.delete_lock(name));

    match result {
        Ok(0) => tracing::warn!(lock = name, "Lock row was already gone at release"),
        Ok(_) => tracing::info!(lock = name, "Lock released"),
        Err(e) => tracing::error!(lock = name, error = %e, "Lock release failed"),
    }
}

/// A held lease that is released when dropped
///
/// Dropping the guard on any exit path (normal return, `?`, panic unwind)
/// deletes the lock row.
pub struct LockGuard {
    storage: SharedStorage,
    name: String,
}

impl LockGuard {
    /// Acquires the lock, returning a guard on success
    pub fn acquire(storage: &SharedStorage, name: &str, ttl_minutes: u32) -> Option<Self> {
        if acquire_lock(storage, name, ttl_minutes) {
            Some(Self {
                storage: storage.clone(),
                name: name.to_string(),
            })
        } else {
            None
        }
    }

    /// The lock name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        release_lock(&self.storage, &self.name);
    }
}
