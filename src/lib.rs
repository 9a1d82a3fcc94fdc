//! recache: in-memory stale-while-revalidate cache.
//!
//! A bounded key/value cache that serves fresh entries directly, serves
//! stale entries while a single worker per key recomputes them, and backs
//! off from keys whose workers keep failing:
//! - LRU store with per-entry TTL
//! - Single-flight worker coalescing for concurrent readers
//! - Cooldown windows after worker failures and timeouts
//! - Bulk expiry with trailing-`*` key globs
//!
//! # Example
//!
//! ```rust,ignore
//! use recache::{CacheConfig, CacheManager, GetOptions};
//!
//! let cache: CacheManager<String> = CacheManager::new(CacheConfig::default());
//!
//! // Serve from cache, or recompute with at most one worker per key.
//! let outcome = cache
//!     .get_with("house/1", GetOptions::new(), || async {
//!         Ok(fetch_listing("house/1").await?)
//!     })
//!     .await?;
//! println!("{:?} ({:?})", outcome.value, outcome.cache);
//! ```

pub mod clock;
pub mod config;
pub mod entry;
pub mod error;
pub mod flight;
pub mod manager;
pub mod pattern;
pub mod store;
pub mod waiting;

// Re-export main types
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use config::CacheConfig;
pub use entry::{Entry, Outcome, Provenance};
pub use error::{CacheError, CacheResult};
pub use flight::{FlightRegistry, FlightResult, FlightRole};
pub use manager::{CacheManager, GetOptions};
pub use pattern::KeyPattern;
pub use store::{Store, StoreMetrics};
pub use waiting::{WaitingRecord, WaitingRegistry};
