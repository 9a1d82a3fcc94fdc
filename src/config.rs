//! Configuration for the cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a [`CacheManager`](crate::CacheManager) instance.
///
/// Every field is a default; `ttl`, `worker_timeout` and `delta_wait` can be
/// overridden per call through [`GetOptions`](crate::GetOptions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries before the least-recently-inserted one is
    /// evicted.
    pub max_length: usize,

    /// Validity window stamped on produced entries.
    pub ttl: Duration,

    /// How long a worker may run before the invocation counts as timed out.
    pub worker_timeout: Duration,

    /// Cooldown window armed on a key after a worker failure or timeout.
    pub delta_wait: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_length: 100_000,
            ttl: Duration::from_secs(3600), // 1 hour default
            worker_timeout: Duration::from_secs(5),
            delta_wait: Duration::from_secs(10),
        }
    }
}

impl CacheConfig {
    /// Creates a configuration with the given capacity.
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            ..Default::default()
        }
    }

    /// Sets the default TTL for produced entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the worker timeout.
    pub fn worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = timeout;
        self
    }

    /// Sets the cooldown window armed after failures.
    pub fn delta_wait(mut self, wait: Duration) -> Self {
        self.delta_wait = wait;
        self
    }

    /// Loads configuration from environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_length = std::env::var("RECACHE_MAX_LENGTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_length);

        let ttl = std::env::var("RECACHE_TTL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.ttl);

        let worker_timeout = std::env::var("RECACHE_WORKER_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.worker_timeout);

        let delta_wait = std::env::var("RECACHE_DELTA_WAIT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.delta_wait);

        Self {
            max_length,
            ttl,
            worker_timeout,
            delta_wait,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_length, 100_000);
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert_eq!(config.worker_timeout, Duration::from_secs(5));
        assert_eq!(config.delta_wait, Duration::from_secs(10));
    }

    #[test]
    fn test_config_builder() {
        let config = CacheConfig::with_max_length(500)
            .ttl(Duration::from_secs(60))
            .worker_timeout(Duration::from_millis(200))
            .delta_wait(Duration::from_millis(50));

        assert_eq!(config.max_length, 500);
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.worker_timeout, Duration::from_millis(200));
        assert_eq!(config.delta_wait, Duration::from_millis(50));
    }

    #[test]
    fn test_from_env_falls_back_on_missing_vars() {
        // None of the RECACHE_* variables are set in the test environment,
        // so every field comes out at its default.
        let config = CacheConfig::from_env();
        assert_eq!(config.max_length, CacheConfig::default().max_length);
        assert_eq!(config.ttl, CacheConfig::default().ttl);
    }
}
