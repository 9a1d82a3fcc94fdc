//! Single-flight coordination: one worker per key, shared by all callers.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::entry::Entry;

/// Terminal result of one worker invocation, fanned out to every caller
/// attached to the flight.
#[derive(Debug, Clone)]
pub enum FlightResult<V> {
    /// The worker produced a value; the entry is already stored.
    Produced(Entry<V>),

    /// The timeout fired before the worker settled.
    TimedOut,

    /// The worker failed or panicked.
    Failed(String),
}

/// The role a caller plays for a given key.
pub enum FlightRole<'a, V: Clone> {
    /// This caller registered the flight and must run the worker, then
    /// settle the guard.
    Originator(FlightGuard<'a, V>),

    /// A worker is already running; await its broadcast result.
    Attached(broadcast::Receiver<FlightResult<V>>),
}

/// Registry of in-flight worker invocations.
///
/// At most one flight exists per key; arrivals while one is running attach
/// to it, never spawn.
#[derive(Debug)]
pub struct FlightRegistry<V> {
    flights: Mutex<HashMap<String, broadcast::Sender<FlightResult<V>>>>,
}

impl<V: Clone> Default for FlightRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> FlightRegistry<V> {
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
        }
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<String, broadcast::Sender<FlightResult<V>>>> {
        self.flights.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Joins the flight for `key`, registering one if none is running.
    ///
    /// The check-and-insert is a single critical section, so two concurrent
    /// callers can never both come out as originator.
    pub fn join_or_register(&self, key: &str) -> FlightRole<'_, V> {
        let mut flights = self.flights();
        if let Some(sender) = flights.get(key) {
            return FlightRole::Attached(sender.subscribe());
        }
        let (sender, _) = broadcast::channel(1);
        flights.insert(key.to_string(), sender);
        FlightRole::Originator(FlightGuard {
            registry: self,
            key: key.to_string(),
            settled: false,
        })
    }

    /// Whether a worker is currently running for `key`.
    pub fn in_flight(&self, key: &str) -> bool {
        self.flights().contains_key(key)
    }

    /// Number of callers attached to the flight for `key`, not counting the
    /// originator.
    pub fn waiters(&self, key: &str) -> usize {
        self.flights()
            .get(key)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.flights().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights().is_empty()
    }

    fn settle(&self, key: &str, result: FlightResult<V>) {
        let sender = self.flights().remove(key);
        if let Some(sender) = sender {
            // No receivers just means nobody attached.
            let _ = sender.send(result);
        }
    }
}

/// Obligation to settle a registered flight exactly once.
///
/// If the originator's call is dropped mid-worker, the guard settles the
/// flight as failed so attached callers are not stranded.
pub struct FlightGuard<'a, V: Clone> {
    registry: &'a FlightRegistry<V>,
    key: String,
    settled: bool,
}

impl<V: Clone> FlightGuard<'_, V> {
    /// Removes the flight from the registry, then fans `result` out to
    /// attached callers.
    pub fn settle(mut self, result: FlightResult<V>) {
        self.settled = true;
        self.registry.settle(&self.key, result);
    }
}

impl<V: Clone> Drop for FlightGuard<'_, V> {
    fn drop(&mut self) {
        if !self.settled {
            self.registry.settle(
                &self.key,
                FlightResult::Failed("worker abandoned before settling".to_string()),
            );
        }
    }
}
