//! Bounded lookup cache: fixed capacity, insertion-order LRU.
//! Key: sanitized lookup key (see `model`). Capacity: 500 per lookup kind.
//!
//! Reads do not refresh recency; only `put` moves a key to the most-recent
//! slot. Persisted seeds are merged back through `put`, so the cap holds
//! from the first insertion.

use std::num::NonZeroUsize;

use lru::LruCache;
use tracing::debug;

/// Entries kept per lookup kind.
pub const DEFAULT_CAPACITY: usize = 500;

pub struct BoundedCache<V> {
    inner: LruCache<String, V>,
    name: &'static str,
}

impl<V: Clone> BoundedCache<V> {
    /// Create an empty cache. A zero capacity is raised to one.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(capacity),
            name,
        }
    }

    /// Look up a value without touching its recency.
    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.peek(key).cloned()
    }

    /// Insert or refresh `key` at the most-recent position. Returns the
    /// evicted key if the insertion pushed the oldest entry out.
    pub fn put(&mut self, key: String, value: V) -> Option<String> {
        match self.inner.push(key.clone(), value) {
            Some((old_key, _)) if old_key != key => {
                debug!(cache = self.name, evicted = %old_key, "cache eviction");
                Some(old_key)
            }
            _ => None,
        }
    }

    /// Merge an ordered seed (oldest first) into the cache.
    pub fn extend<I>(&mut self, seed: I)
    where
        I: IntoIterator<Item = (String, V)>,
    {
        for (key, value) in seed {
            self.put(key, value);
        }
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Entries from least- to most-recent.
    pub fn iter_oldest_first(&self) -> impl Iterator<Item = (&String, &V)> {
        self.inner.iter().rev()
    }
}
