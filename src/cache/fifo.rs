//! Fixed-capacity FIFO cache with a TTL safety net.
//!
//! Eviction is strictly by insertion order: when the cache is full, the
//! earliest-inserted entry is dropped regardless of how recently it was
//! read.
//!
//! Entries older than the configured TTL are treated as misses and are
//! removed by [`FifoCache::sweep_expired()`], which the translation service
//! runs on an interval.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::telemetry;

/// Configuration for a bounded cache.
///
/// ```rust
/// # use hermod::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(1_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 500.
    pub max_entries: usize,
    /// Age after which an entry is considered expired. Default: 24 hours.
    pub ttl: Duration,
    /// How often the background sweep runs. Default: 1 hour.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(24 * 3600),
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the background sweep interval.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Keys in insertion order; front is the oldest.
    order: VecDeque<K>,
}

/// Thread-safe bounded key/value store with FIFO eviction.
///
/// The lock is only held for the synchronous body of each method, so it is
/// safe to call from async code.
#[derive(Debug)]
pub struct FifoCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    max_entries: usize,
    ttl: Duration,
    name: &'static str,
}

impl<K, V> FifoCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache from the given configuration.
    ///
    /// `name` labels the eviction metric.
    pub fn new(name: &'static str, config: &CacheConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_entries: config.max_entries.max(1),
            ttl: config.ttl,
            name,
        }
    }

    /// Look up a value. Expired entries count as misses.
    pub fn get(&self, key: &K) -> Option<V> {
        let value = self.peek(key);
        if value.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "cache" => self.name).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "cache" => self.name).increment(1);
        }
        value
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    fn peek(&self, key: &K) -> Option<V> {
        let inner = self.lock();
        inner
            .entries
            .get(key)
            .filter(|e| e.inserted_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Insert (or overwrite) a value.
    ///
    /// Overwriting keeps the key's original position in the eviction order.
    /// Inserting a new key into a full cache evicts the oldest entry.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.lock();
        let now = Instant::now();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.inserted_at = now;
            return;
        }

        while inner.entries.len() >= self.max_entries {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL, "cache" => self.name).increment(1);
        }

        inner.order.push_back(key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
            },
        );
    }

    /// Remove an entry, returning its value.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.lock();
        let entry = inner.entries.remove(key)?;
        inner.order.retain(|k| k != key);
        Some(entry.value)
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let mut inner = self.lock();
        let ttl = self.ttl;
        let before = inner.entries.len();
        inner.entries.retain(|_, e| e.inserted_at.elapsed() < ttl);
        let Inner { entries, order } = &mut *inner;
        order.retain(|k| entries.contains_key(k));
        before - entries.len()
    }

    /// Number of entries currently stored (including not-yet-swept expired ones).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    /// Evict all entries.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize) -> FifoCache<String, u32> {
        FifoCache::new("test", &CacheConfig::new().max_entries(max))
    }

    #[test]
    fn miss_then_hit() {
        let c = cache(4);
        assert!(c.get(&"a".to_string()).is_none());
        c.insert("a".into(), 1);
        assert_eq!(c.get(&"a".to_string()), Some(1));
    }

    #[test]
    fn overflow_evicts_earliest_inserted() {
        let c = cache(3);
        for (i, k) in ["a", "b", "c", "d"].iter().enumerate() {
            c.insert((*k).to_string(), i as u32);
        }
        assert_eq!(c.len(), 3);
        assert!(c.get(&"a".to_string()).is_none());
        assert_eq!(c.get(&"d".to_string()), Some(3));
    }

    #[test]
    fn reads_do_not_refresh_eviction_order() {
        let c = cache(2);
        c.insert("a".into(), 1);
        c.insert("b".into(), 2);
        // An LRU would keep "a" here.
        assert_eq!(c.get(&"a".to_string()), Some(1));
        c.insert("c".into(), 3);
        assert!(c.get(&"a".to_string()).is_none());
        assert!(c.get(&"b".to_string()).is_some());
    }

    #[test]
    fn overwrite_keeps_position_and_size() {
        let c = cache(2);
        c.insert("a".into(), 1);
        c.insert("b".into(), 2);
        c.insert("a".into(), 10);
        assert_eq!(c.len(), 2);
        assert_eq!(c.get(&"a".to_string()), Some(10));
        c.insert("c".into(), 3);
        assert!(c.get(&"a".to_string()).is_none());
    }

    #[test]
    fn remove_drops_from_order() {
        let c = cache(2);
        c.insert("a".into(), 1);
        c.insert("b".into(), 2);
        assert_eq!(c.remove(&"a".to_string()), Some(1));
        c.insert("c".into(), 3);
        assert_eq!(c.len(), 2);
        assert!(c.get(&"b".to_string()).is_some());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let c = cache(0);
        c.insert("a".into(), 1);
        assert_eq!(c.capacity(), 1);
        assert_eq!(c.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_entries() {
        let c: FifoCache<String, u32> = FifoCache::new(
            "test",
            &CacheConfig::new().max_entries(10).ttl(Duration::from_secs(60)),
        );
        c.insert("old".into(), 1);
        tokio::time::advance(Duration::from_secs(45)).await;
        c.insert("new".into(), 2);
        tokio::time::advance(Duration::from_secs(30)).await;

        assert!(c.get(&"old".to_string()).is_none());
        assert_eq!(c.len(), 2);
        assert_eq!(c.sweep_expired(), 1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.get(&"new".to_string()), Some(2));
    }
}
