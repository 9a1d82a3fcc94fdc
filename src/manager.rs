//! The cache coordinator: classification, single-flight, cooldown, timeouts.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::clock::{MonotonicClock, SharedClock};
#[cfg(test)]
use crate::clock::Clock;
use crate::config::CacheConfig;
use crate::entry::{Entry, Outcome, Provenance};
use crate::error::{CacheError, CacheResult};
use crate::flight::{FlightRegistry, FlightResult, FlightRole};
use crate::pattern::KeyPattern;
use crate::store::{Store, StoreMetrics};
use crate::waiting::{WaitingRecord, WaitingRegistry};

/// Per-call overrides for [`CacheManager::get_with`]. Unset fields fall back
/// to the instance [`CacheConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// TTL to stamp on the produced entry.
    pub ttl: Option<Duration>,

    /// How long the worker may run before the invocation times out.
    pub worker_timeout: Option<Duration>,

    /// Cooldown window armed if the worker fails or times out.
    pub delta_wait: Option<Duration>,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout = Some(timeout);
        self
    }

    pub fn delta_wait(mut self, wait: Duration) -> Self {
        self.delta_wait = Some(wait);
        self
    }
}

/// In-memory stale-while-revalidate cache.
///
/// Fresh entries are served directly. A stale entry is served while at most
/// one worker per key recomputes it; concurrent callers of the same key
/// attach to the running worker instead of spawning their own. After a
/// worker fails or times out, the key cools down for `delta_wait` before the
/// worker may run again.
///
/// Each manager is a closed unit: independent instances share nothing.
pub struct CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: Store<V>,
    waiting: WaitingRegistry,
    flights: FlightRegistry<V>,
    config: CacheConfig,
    clock: SharedClock,

    /// Orders classification, cooldown arming and flight registration as one
    /// critical section across threads. Never held across an await.
    gate: Mutex<()>,
}

impl<V> CacheManager<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a manager with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Creates a manager reading time from the supplied clock.
    pub fn with_clock(config: CacheConfig, clock: SharedClock) -> Self {
        info!(max_length = config.max_length, "initializing cache manager");
        Self {
            store: Store::new(config.max_length),
            waiting: WaitingRegistry::new(),
            flights: FlightRegistry::new(),
            config,
            clock,
            gate: Mutex::new(()),
        }
    }

    fn gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates a manager preloaded with `initial` key/value pairs.
    ///
    /// Seed values are owned copies stamped with the instance default TTL;
    /// mutating the originals afterwards cannot affect the cache.
    pub fn with_initial<K, I>(config: CacheConfig, initial: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let manager = Self::new(config);
        manager.seed(initial);
        manager
    }

    /// Preloads key/value pairs with the instance default TTL, in iteration
    /// order.
    pub fn seed<K, I>(&self, initial: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let now = self.clock.now_ms();
        for (key, value) in initial {
            self.store
                .put(key.into(), Entry::new(value, self.config.ttl, now));
        }
    }

    /// Worker-less read.
    ///
    /// Returns a hit for a fresh entry, the stale entry while its key cools
    /// down after a failure, and `None` otherwise.
    pub fn get(&self, key: &str) -> Option<Outcome<V>> {
        let now = self.clock.now_ms();
        let entry = self.store.get(key)?;
        if entry.is_fresh(now) {
            return Some(Outcome::from_entry(&entry, Provenance::Hit));
        }
        if self.waiting.live(key, now) {
            debug!(key, "cooling down, serving stale");
            return Some(Outcome::from_entry(&entry, Provenance::Stale));
        }
        None
    }

    /// Read-through lookup.
    ///
    /// * Fresh entry: returned as a hit; the worker is not invoked.
    /// * Key cooling down: the stale entry is returned if one exists,
    ///   otherwise the read fails with [`CacheError::CoolingDown`]. The
    ///   worker is not invoked.
    /// * Otherwise the worker runs under `worker_timeout`, unless one is
    ///   already running for the key, in which case this caller attaches to
    ///   it. The producing caller sees [`Provenance::Miss`]; attached
    ///   callers see [`Provenance::Hit`].
    /// * On worker failure or timeout the key's cooldown is armed; a stale
    ///   entry recovers the read, a missing one surfaces the error.
    pub async fn get_with<F, Fut>(
        &self,
        key: &str,
        options: GetOptions,
        worker: F,
    ) -> CacheResult<Outcome<V>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        // Classification, the cooldown check and flight registration hold
        // the gate together: no other caller can arm a cooldown or settle a
        // flight for this key in between.
        let (cached, role) = {
            let _gate = self.gate();
            let now = self.clock.now_ms();
            let cached = self.store.get(key);

            if let Some(entry) = &cached {
                if entry.is_fresh(now) {
                    debug!(key, "fresh hit");
                    return Ok(Outcome::from_entry(entry, Provenance::Hit));
                }
            }

            if self.waiting.live(key, now) {
                return match &cached {
                    Some(entry) => {
                        debug!(key, "cooling down, serving stale");
                        Ok(Outcome::from_entry(entry, Provenance::Stale))
                    }
                    None => Err(CacheError::CoolingDown {
                        key: key.to_string(),
                    }),
                };
            }

            (cached, self.flights.join_or_register(key))
        };

        let worker_timeout = options.worker_timeout.unwrap_or(self.config.worker_timeout);

        match role {
            FlightRole::Attached(receiver) => {
                self.await_attached(key, receiver, cached, worker_timeout)
                    .await
            }
            FlightRole::Originator(guard) => {
                let delta_wait = options.delta_wait.unwrap_or(self.config.delta_wait);
                let ttl = options.ttl.unwrap_or(self.config.ttl);

                let task = tokio::spawn(async move { worker().await });
                let settled = timeout(worker_timeout, task).await;

                // Store/cooldown updates and the flight settlement form the
                // matching critical section on the way out.
                let result = {
                    let _gate = self.gate();
                    let result = match settled {
                        Ok(Ok(Ok(value))) => {
                            let entry = Entry::new(value, ttl, self.clock.now_ms());
                            self.store.put(key.to_string(), entry.clone());
                            self.waiting.clear(key);
                            debug!(key, "worker produced a value");
                            FlightResult::Produced(entry)
                        }
                        Ok(Ok(Err(error))) => {
                            warn!(key, %error, "worker failed");
                            self.waiting.arm(key, self.clock.now_ms(), delta_wait);
                            FlightResult::Failed(error.to_string())
                        }
                        Ok(Err(join_error)) => {
                            warn!(key, %join_error, "worker panicked");
                            self.waiting.arm(key, self.clock.now_ms(), delta_wait);
                            FlightResult::Failed(join_error.to_string())
                        }
                        Err(_elapsed) => {
                            // The worker task keeps running detached; its late
                            // result has no path back into the store.
                            warn!(
                                key,
                                timeout_ms = worker_timeout.as_millis() as u64,
                                "worker timed out"
                            );
                            self.waiting.arm(key, self.clock.now_ms(), delta_wait);
                            FlightResult::TimedOut
                        }
                    };
                    guard.settle(result.clone());
                    result
                };

                match result {
                    FlightResult::Produced(entry) => {
                        Ok(Outcome::from_entry(&entry, Provenance::Miss))
                    }
                    FlightResult::TimedOut => self.stale_or(
                        cached,
                        CacheError::WorkerTimeout {
                            key: key.to_string(),
                            timeout_ms: worker_timeout.as_millis() as u64,
                        },
                    ),
                    FlightResult::Failed(message) => self.stale_or(
                        cached,
                        CacheError::WorkerFailed {
                            key: key.to_string(),
                            message,
                        },
                    ),
                }
            }
        }
    }

    /// Awaits the result of a worker another caller is running.
    async fn await_attached(
        &self,
        key: &str,
        mut receiver: broadcast::Receiver<FlightResult<V>>,
        cached: Option<Entry<V>>,
        worker_timeout: Duration,
    ) -> CacheResult<Outcome<V>> {
        let result = match receiver.recv().await {
            Ok(result) => result,
            Err(_) => FlightResult::Failed("worker abandoned before settling".to_string()),
        };

        match result {
            // Attached callers observe a cache just heated by the
            // originator's worker.
            FlightResult::Produced(entry) => Ok(Outcome::from_entry(&entry, Provenance::Hit)),
            FlightResult::TimedOut => self.stale_or(
                cached,
                CacheError::WorkerTimeout {
                    key: key.to_string(),
                    timeout_ms: worker_timeout.as_millis() as u64,
                },
            ),
            FlightResult::Failed(message) => self.stale_or(
                cached,
                CacheError::WorkerFailed {
                    key: key.to_string(),
                    message,
                },
            ),
        }
    }

    /// Recovers a failed read with the stale entry seen at call entry, or
    /// surfaces the error.
    fn stale_or(&self, cached: Option<Entry<V>>, error: CacheError) -> CacheResult<Outcome<V>> {
        match cached {
            Some(entry) => {
                debug!(key = error.key(), "worker unavailable, serving stale");
                Ok(Outcome::from_entry(&entry, Provenance::Stale))
            }
            None => Err(error),
        }
    }

    /// Inserts a value with the instance default TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.ttl);
    }

    /// Inserts a value with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = Entry::new(value, ttl, self.clock.now_ms());
        self.store.put(key.into(), entry);
    }

    /// Whether the key is stored, fresh or stale.
    pub fn has(&self, key: &str) -> bool {
        self.store.contains(key)
    }

    /// Removes the entry under `key`. Returns whether one existed.
    pub fn del(&self, key: &str) -> bool {
        self.store.remove(key).is_some()
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Current keys in most-recently-inserted-first order.
    pub fn keys(&self) -> Vec<String> {
        self.store.keys()
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Forces every entry matched by any pattern stale. Patterns are literal
    /// keys or trailing-`*` globs. Returns the number of entries expired.
    pub fn expire<I, S>(&self, patterns: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<KeyPattern> = patterns
            .into_iter()
            .map(|raw| KeyPattern::parse(raw.as_ref()))
            .collect();

        let mut expired = 0;
        for key in self.store.keys() {
            if patterns.iter().any(|pattern| pattern.matches(&key)) && self.store.force_expire(&key)
            {
                expired += 1;
            }
        }
        debug!(expired, "forced entries stale");
        expired
    }

    /// How a read of `key` would classify right now: [`Provenance::Hit`]
    /// for fresh, [`Provenance::Stale`] for expired, [`Provenance::None`]
    /// for missing.
    pub fn probe(&self, key: &str) -> Provenance {
        let now = self.clock.now_ms();
        match self.store.get(key) {
            Some(entry) if entry.is_fresh(now) => Provenance::Hit,
            Some(_) => Provenance::Stale,
            None => Provenance::None,
        }
    }

    /// A copy of the stored entry, without promoting it.
    pub fn entry(&self, key: &str) -> Option<Entry<V>> {
        self.store.get(key)
    }

    /// The cooldown record for `key`, live or expired.
    pub fn waiting(&self, key: &str) -> Option<WaitingRecord> {
        self.waiting.get(key)
    }

    /// Whether `key` is inside a live cooldown window.
    pub fn cooling_down(&self, key: &str) -> bool {
        self.waiting.live(key, self.clock.now_ms())
    }

    /// Whether a worker is currently running for `key`.
    pub fn in_flight(&self, key: &str) -> bool {
        self.flights.in_flight(key)
    }

    /// Store metrics for monitoring.
    pub fn metrics(&self) -> StoreMetrics {
        self.store.metrics()
    }

    /// The underlying store (for advanced operations).
    pub fn store(&self) -> &Store<V> {
        &self.store
    }

    /// Returns the instance configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
