//! Bounded LRU store with TTL metadata.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use lru::LruCache;

use crate::entry::Entry;

/// Counter snapshot taken from a [`Store`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreMetrics {
    /// Reads that found an entry, fresh or stale.
    pub hits: u64,

    /// Reads that found nothing.
    pub misses: u64,

    /// Entries pushed out by the capacity bound.
    pub evictions: u64,

    /// Entries forced stale through bulk expiry.
    pub expirations: u64,

    /// Entry count at snapshot time.
    pub size: usize,
}

impl StoreMetrics {
    /// Fraction of reads that found an entry; 0.0 before the first read.
    pub fn hit_rate(&self) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            reads => self.hits as f64 / reads as f64,
        }
    }
}

/// Thread-safe bounded store keyed by strings.
///
/// Reads peek without promoting, so eviction order is least-recently-inserted.
/// TTL evaluation is the caller's responsibility: expired entries are still
/// returned, flagged only by their own metadata.
pub struct Store<V>
where
    V: Clone,
{
    /// The underlying LRU cache wrapped in a RwLock.
    cache: RwLock<LruCache<String, Entry<V>>>,

    /// Configured capacity.
    max_length: usize,

    /// Atomic counters for metrics.
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl<V> Store<V>
where
    V: Clone,
{
    /// Creates a store bounded at `max_length` entries.
    pub fn new(max_length: usize) -> Self {
        let capacity = NonZeroUsize::new(max_length).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            max_length,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    /// Gets a copy of the entry under `key` without promoting it.
    pub fn get(&self, key: &str) -> Option<Entry<V>> {
        let cache = self.cache.read().ok()?;
        match cache.peek(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts an entry, evicting the least-recently-inserted one when the
    /// store is full. Returns the previous entry under the key, if any.
    pub fn put(&self, key: String, entry: Entry<V>) -> Option<Entry<V>> {
        let mut cache = self.cache.write().ok()?;
        if cache.len() >= self.max_length && !cache.contains(&key) {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        cache.put(key, entry)
    }

    /// Removes the entry under `key`.
    pub fn remove(&self, key: &str) -> Option<Entry<V>> {
        let mut cache = self.cache.write().ok()?;
        cache.pop(key)
    }

    /// Checks for a key without affecting order.
    pub fn contains(&self, key: &str) -> bool {
        let cache = self.cache.read().ok();
        cache.map(|c| c.contains(key)).unwrap_or(false)
    }

    /// Forces the entry under `key` stale in place. Returns whether one
    /// existed.
    pub fn force_expire(&self, key: &str) -> bool {
        let mut cache = match self.cache.write() {
            Ok(c) => c,
            Err(_) => return false,
        };
        match cache.peek_mut(key) {
            Some(entry) => {
                entry.force_expire();
                self.expirations.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Current keys in most-recently-inserted-first order.
    pub fn keys(&self) -> Vec<String> {
        self.cache
            .read()
            .map(|c| c.iter().map(|(key, _)| key.clone()).collect())
            .unwrap_or_default()
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the configured capacity.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Clears all entries.
    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    /// Returns the current store metrics.
    pub fn metrics(&self) -> StoreMetrics {
        StoreMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: self.len(),
        }
    }

    /// Resets all metrics counters.
    pub fn reset_metrics(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}
