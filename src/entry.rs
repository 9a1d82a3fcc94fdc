//! Stored entries and read outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Provenance of a read: how the cache produced the returned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Served from a fresh entry, or an attached caller observing a cache
    /// just heated by another caller's worker.
    Hit,

    /// Produced by this caller's own worker.
    Miss,

    /// Served from an expired entry while the worker could not deliver.
    Stale,

    /// Nothing stored under the key.
    None,
}

/// A stored value with its TTL metadata.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The cached value.
    pub value: V,

    /// Validity window from `created`. Zero means immediately stale.
    pub ttl: Duration,

    /// Monotonic milliseconds at insertion.
    pub created: u64,
}

impl<V> Entry<V> {
    /// Creates a new entry stamped at `created`.
    pub fn new(value: V, ttl: Duration, created: u64) -> Self {
        Self {
            value,
            ttl,
            created,
        }
    }

    /// Whether the entry is still within its validity window.
    pub fn is_fresh(&self, now_ms: u64) -> bool {
        (now_ms.saturating_sub(self.created) as u128) < self.ttl.as_millis()
    }

    /// Forces the entry stale on the next read. The value stays stored.
    pub fn force_expire(&mut self) {
        self.ttl = Duration::ZERO;
    }

    /// Returns the age of this entry.
    pub fn age(&self, now_ms: u64) -> Duration {
        Duration::from_millis(now_ms.saturating_sub(self.created))
    }

    /// Remaining validity (None once stale).
    pub fn remaining_ttl(&self, now_ms: u64) -> Option<Duration> {
        let elapsed = self.age(now_ms);
        if elapsed < self.ttl {
            Some(self.ttl - elapsed)
        } else {
            None
        }
    }

    /// Consumes the entry and returns the value.
    pub fn into_value(self) -> V {
        self.value
    }
}

/// What a read returns: the value plus how the cache produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<V> {
    /// The produced or cached value.
    pub value: V,

    /// Provenance tag for this read. Computed per read, never stored.
    pub cache: Provenance,

    /// `created` stamp of the backing entry.
    pub created: u64,

    /// TTL of the backing entry.
    pub ttl: Duration,
}

impl<V: Clone> Outcome<V> {
    pub(crate) fn from_entry(entry: &Entry<V>, cache: Provenance) -> Self {
        Self {
            value: entry.value.clone(),
            cache,
            created: entry.created,
            ttl: entry.ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_freshness() {
        let entry = Entry::new("test value", Duration::from_millis(100), 1000);
        assert!(entry.is_fresh(1000));
        assert!(entry.is_fresh(1099));
        assert!(!entry.is_fresh(1100));
        assert!(!entry.is_fresh(5000));
    }

    #[test]
    fn test_zero_ttl_is_immediately_stale() {
        let entry = Entry::new(42, Duration::ZERO, 500);
        assert!(!entry.is_fresh(500));
        assert!(!entry.is_fresh(501));
    }

    #[test]
    fn test_force_expire() {
        let mut entry = Entry::new(42, Duration::from_secs(60), 0);
        assert!(entry.is_fresh(10));

        entry.force_expire();
        assert!(!entry.is_fresh(10));
        assert_eq!(entry.value, 42);
    }

    #[test]
    fn test_age_and_remaining_ttl() {
        let entry = Entry::new("x", Duration::from_millis(100), 1000);
        assert_eq!(entry.age(1040), Duration::from_millis(40));
        assert_eq!(entry.remaining_ttl(1040), Some(Duration::from_millis(60)));
        assert_eq!(entry.remaining_ttl(1100), None);
    }

    #[test]
    fn test_outcome_from_entry() {
        let entry = Entry::new(vec![1, 2, 3], Duration::from_millis(50), 7);
        let outcome = Outcome::from_entry(&entry, Provenance::Stale);

        assert_eq!(outcome.value, vec![1, 2, 3]);
        assert_eq!(outcome.cache, Provenance::Stale);
        assert_eq!(outcome.created, 7);
        assert_eq!(outcome.ttl, Duration::from_millis(50));
    }

    #[test]
    fn test_provenance_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Provenance::Stale).unwrap(),
            "\"stale\""
        );
        assert_eq!(serde_json::to_string(&Provenance::Hit).unwrap(), "\"hit\"");
    }

    #[test]
    fn test_into_value() {
        let entry = Entry::new(vec![1, 2, 3], Duration::ZERO, 0);
        assert_eq!(entry.into_value(), vec![1, 2, 3]);
    }
}
