//! Single-flight request coalescing.
//!
//! [`SingleFlight`] maps a key to the shared handle of the one request
//! currently in flight for it. A caller that arrives while a request is
//! pending attaches to the same handle and observes the identical outcome;
//! no second request is issued.
//!
//! ```text
//! caller A ──┐
//! caller B ──┼──► registry[key] = Shared<task> ──► one remote call
//! caller C ──┘                                       │
//!          ◄──────────── same Result fanned out ─────┘
//! ```
//!
//! The check-and-register step happens inside one critical section, so a
//! second caller can never observe "no entry" while a request is pending.
//!
//! The task is spawned onto the runtime rather than driven by its callers:
//! it runs to completion, and removes its entry, even when every attached
//! caller has been dropped. Entries older than the safety TTL (default 30s)
//! are treated as lost and replaced by the next caller.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::telemetry;
use crate::{HermodError, Result};

/// Default age after which a pending entry is considered lost.
pub const DEFAULT_FLIGHT_TTL: Duration = Duration::from_secs(30);

/// Handle to the shared outcome of an in-flight request.
pub type SharedTask<T> = Shared<BoxFuture<'static, Result<T>>>;

struct Flight<T: Clone> {
    id: u64,
    task: SharedTask<T>,
    inserted_at: Instant,
}

struct Registry<K, T: Clone> {
    flights: HashMap<K, Flight<T>>,
    next_id: u64,
}

/// Key → in-flight task registry.
///
/// Cheap to clone; clones share the same registry.
pub struct SingleFlight<K, T: Clone> {
    inner: Arc<Mutex<Registry<K, T>>>,
    ttl: Duration,
    label: &'static str,
}

impl<K, T: Clone> Clone for SingleFlight<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            ttl: self.ttl,
            label: self.label,
        }
    }
}

impl<K, T> SingleFlight<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create a registry with the default 30s safety TTL.
    ///
    /// `label` tags the coalescing metric (e.g. "dispatch", "translate").
    pub fn new(label: &'static str) -> Self {
        Self::with_ttl(label, DEFAULT_FLIGHT_TTL)
    }

    pub fn with_ttl(label: &'static str, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Registry {
                flights: HashMap::new(),
                next_id: 0,
            })),
            ttl,
            label,
        }
    }

    /// Run `make()` unless a request for `key` is already in flight, in
    /// which case attach to it.
    ///
    /// `make` is only invoked for the first caller, and its future is
    /// spawned immediately. The returned handle resolves to the shared
    /// outcome; dropping it cancels nothing. A task that panics or is
    /// aborted resolves to [`HermodError::Cancelled`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn run<F, Fut>(&self, key: K, make: F) -> SharedTask<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let mut registry = self.lock();

        if let Some(flight) = registry.flights.get(&key) {
            if flight.inserted_at.elapsed() < self.ttl {
                metrics::counter!(telemetry::COALESCED_TOTAL, "registry" => self.label)
                    .increment(1);
                debug!(registry = self.label, "attached to in-flight request");
                return flight.task.clone();
            }
            warn!(
                registry = self.label,
                age_ms = flight.inserted_at.elapsed().as_millis() as u64,
                "replacing stale in-flight entry"
            );
        }

        let id = registry.next_id;
        registry.next_id = registry.next_id.wrapping_add(1);

        let settle = SettleGuard {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            id,
        };
        let fut = make();
        // The registry lock is held until the entry is inserted, so the
        // spawned task cannot remove it before it exists.
        let handle = tokio::spawn(async move {
            let _settle = settle;
            fut.await
        });
        let label = self.label;
        let task = async move {
            handle.await.unwrap_or_else(|err| {
                warn!(registry = label, error = %err, "in-flight task did not complete");
                Err(HermodError::Cancelled)
            })
        }
        .boxed()
        .shared();

        registry.flights.insert(
            key,
            Flight {
                id,
                task: task.clone(),
                inserted_at: Instant::now(),
            },
        );
        task
    }

    /// Whether a request for `key` is currently pending.
    pub fn is_pending(&self, key: &K) -> bool {
        self.lock()
            .flights
            .get(key)
            .is_some_and(|f| f.inserted_at.elapsed() < self.ttl)
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.lock().flights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut registry = self.lock();
        let before = registry.flights.len();
        let ttl = self.ttl;
        registry
            .flights
            .retain(|_, f| f.inserted_at.elapsed() < ttl);
        before - registry.flights.len()
    }

    /// Forget every entry. Callers already attached still receive their
    /// outcome; new callers start fresh requests.
    pub fn clear(&self) {
        self.lock().flights.clear();
    }

    fn lock(&self) -> MutexGuard<'_, Registry<K, T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes the entry when the task finishes, panics or is aborted. Only the
/// entry with the same id is removed; a stale one may have been replaced.
struct SettleGuard<K: Eq + Hash, T: Clone> {
    inner: Arc<Mutex<Registry<K, T>>>,
    key: K,
    id: u64,
}

impl<K: Eq + Hash, T: Clone> Drop for SettleGuard<K, T> {
    fn drop(&mut self) {
        let mut registry = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if registry
            .flights
            .get(&self.key)
            .is_some_and(|f| f.id == self.id)
        {
            registry.flights.remove(&self.key);
        }
    }
}
