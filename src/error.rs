//! Error types surfaced by cache reads.

use thiserror::Error;

/// Failures surfaced to callers of [`CacheManager::get_with`](crate::CacheManager::get_with).
///
/// These only occur on keys with no stale entry to fall back on; stale-path
/// failures are recovered locally by serving the stale value.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The worker ran past its timeout and the key had nothing stored.
    #[error("worker for '{key}' timed out after {timeout_ms} ms")]
    WorkerTimeout { key: String, timeout_ms: u64 },

    /// The worker failed and the key had nothing stored.
    #[error("worker for '{key}' failed: {message}")]
    WorkerFailed { key: String, message: String },

    /// The key is cooling down after a recent failure; the worker was not
    /// invoked.
    #[error("'{key}' is cooling down after a recent worker failure")]
    CoolingDown { key: String },
}

impl CacheError {
    /// The key the failed read was for.
    pub fn key(&self) -> &str {
        match self {
            Self::WorkerTimeout { key, .. } => key,
            Self::WorkerFailed { key, .. } => key,
            Self::CoolingDown { key } => key,
        }
    }
}

/// Result type for cache reads.
pub type CacheResult<T> = Result<T, CacheError>;
