//! Cooldown bookkeeping for failing keys.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One cooldown window armed after a worker failure or timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitingRecord {
    /// Monotonic milliseconds when the cooldown began.
    pub started: u64,

    /// Window length; the key cools down while `now < started + wait`.
    pub wait: Duration,
}

impl WaitingRecord {
    /// Whether the cooldown is still in effect at `now_ms`.
    pub fn is_live(&self, now_ms: u64) -> bool {
        now_ms < self.started + self.wait.as_millis() as u64
    }
}

/// Registry of keys currently cooling down.
///
/// While a key has a live record here, `get` never invokes its worker; reads
/// consult only the store.
#[derive(Debug, Default)]
pub struct WaitingRegistry {
    records: Mutex<HashMap<String, WaitingRecord>>,
}

impl WaitingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, WaitingRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the record for `key`, live or expired.
    pub fn get(&self, key: &str) -> Option<WaitingRecord> {
        self.records().get(key).copied()
    }

    /// Whether `key` has a live cooldown at `now_ms`.
    pub fn live(&self, key: &str, now_ms: u64) -> bool {
        self.records()
            .get(key)
            .map(|record| record.is_live(now_ms))
            .unwrap_or(false)
    }

    /// Arms a cooldown for `key`.
    ///
    /// A live record is left untouched (`started` is not reset); an expired
    /// one is replaced with a fresh window.
    pub fn arm(&self, key: &str, now_ms: u64, wait: Duration) {
        let mut records = self.records();
        let keep = records
            .get(key)
            .map(|record| record.is_live(now_ms))
            .unwrap_or(false);
        if !keep {
            records.insert(
                key.to_string(),
                WaitingRecord {
                    started: now_ms,
                    wait,
                },
            );
        }
    }

    /// Removes the record for `key`. Returns whether one existed.
    pub fn clear(&self, key: &str) -> bool {
        self.records().remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_liveness_window() {
        let record = WaitingRecord {
            started: 100,
            wait: Duration::from_millis(10),
        };
        assert!(record.is_live(100));
        assert!(record.is_live(109));
        assert!(!record.is_live(110));
        assert!(!record.is_live(200));
    }

    #[test]
    fn test_arm_and_clear() {
        let registry = WaitingRegistry::new();
        assert!(registry.is_empty());

        registry.arm("k", 100, Duration::from_millis(10));
        assert!(registry.live("k", 105));
        assert!(!registry.live("k", 110));
        assert_eq!(registry.len(), 1);

        assert!(registry.clear("k"));
        assert!(!registry.clear("k"));
        assert!(registry.get("k").is_none());
    }

    #[test]
    fn test_arm_keeps_live_record() {
        let registry = WaitingRegistry::new();
        registry.arm("k", 100, Duration::from_millis(50));

        // Re-arming inside the window must not reset `started`.
        registry.arm("k", 120, Duration::from_millis(50));
        assert_eq!(registry.get("k").unwrap().started, 100);
    }

    #[test]
    fn test_arm_replaces_expired_record() {
        let registry = WaitingRegistry::new();
        registry.arm("k", 100, Duration::from_millis(10));

        registry.arm("k", 200, Duration::from_millis(20));
        let record = registry.get("k").unwrap();
        assert_eq!(record.started, 200);
        assert_eq!(record.wait, Duration::from_millis(20));
    }

    #[test]
    fn test_live_on_unknown_key() {
        let registry = WaitingRegistry::new();
        assert!(!registry.live("missing", 0));
    }
}
