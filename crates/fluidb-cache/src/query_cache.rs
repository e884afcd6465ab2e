//! Query result cache.
//!
//! Holds results of read-only commands keyed by [`CommandDescriptor`].
//! Invalidation is coarse: the owner clears the whole cache before any
//! command that may write and on transaction rollback. There is no
//! per-table tracking.

use fluidb_common::DEFAULT_CACHE_CAPACITY;

use crate::descriptor::CommandDescriptor;
use crate::lru::LruCache;
use crate::stats::CacheStats;

/// A cache for query results.
///
/// # Example
///
/// ```
/// use fluidb_cache::{CommandDescriptor, CommandTag, QueryCache};
/// use fluidb_common::params;
///
/// let mut cache = QueryCache::new(10);
/// let key = CommandDescriptor::new(CommandTag::CELL, "SELECT COUNT(*) FROM book", params![]);
///
/// cache.put(key.clone(), 3);
/// assert_eq!(cache.get(&key), Some(&3));
///
/// // A write happened somewhere.
/// cache.clear();
/// assert!(!cache.contains(&key));
/// ```
pub struct QueryCache<V> {
    entries: LruCache<CommandDescriptor, V>,
}

impl<V> QueryCache<V> {
    /// Creates a cache holding at most `capacity` results.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Returns a cached result and marks it recently used.
    pub fn get(&mut self, key: &CommandDescriptor) -> Option<&V> {
        self.entries.get(key)
    }

    /// Caches a result. Re-putting a present key counts as an access.
    pub fn put(&mut self, key: CommandDescriptor, value: V) {
        self.entries.insert(key, value);
    }

    /// Returns true if a result is cached, without touching recency.
    pub fn contains(&self, key: &CommandDescriptor) -> bool {
        self.entries.contains(key)
    }

    /// Drops one result.
    pub fn remove(&mut self, key: &CommandDescriptor) -> Option<V> {
        self.entries.remove(key)
    }

    /// Drops every result.
    pub fn clear(&mut self) {
        if !self.entries.is_empty() {
            self.entries.clear();
        }
    }

    /// Returns the capacity.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    /// Changes the capacity; 0 disables caching. Excess entries are
    /// dropped immediately.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.entries.set_capacity(capacity);
    }

    /// Returns the number of cached results.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &CacheStats {
        self.entries.stats()
    }
}

impl<V> Default for QueryCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
