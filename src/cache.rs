//! Bounded memoization cache.

use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use std::hash::Hash;

/// Fixed-capacity, least-recently-used cache shared across request tasks.
///
/// Eviction runs lazily inside moka, so `entry_count` may briefly exceed the
/// capacity under heavy insert load. Call [`sync`](Self::sync) to force
/// pending maintenance.
pub struct BoundedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: Cache<K, V>,
    name: String,
    capacity: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache holding at most `max_capacity` entries.
    pub fn new(name: impl Into<String>, max_capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            inner,
            name: name.into(),
            capacity: max_capacity,
        }
    }

    /// Get a value, computing and storing it on a miss.
    ///
    /// Concurrent misses for the same key run `init` once.
    pub fn get_or_insert_with(&self, key: K, init: impl FnOnce() -> V) -> V {
        self.inner.get_with(key, init)
    }

    /// Get a value from the cache.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key)
    }

    /// Insert a value into the cache.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value);
    }

    /// Current entry count (approximate until [`sync`](Self::sync) runs).
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Get the cache name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run pending eviction and bookkeeping.
    pub fn sync(&self) {
        self.inner.run_pending_tasks();
    }

    /// Invalidate all entries.
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
