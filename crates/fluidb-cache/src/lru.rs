//! LRU (Least Recently Used) Cache implementation.
//!
//! A classic LRU cache with O(1) get, insert, and eviction. Entries live in
//! a dense slab and are chained into a doubly-linked recency list by index;
//! a HashMap maps each key to its slot.
//!
//! Recency rules:
//! - `get`, `get_mut` and `insert` (new or existing key) make the entry the
//!   most recently used.
//! - `peek` and `contains` never change the order.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

use crate::stats::CacheStats;

/// A slot in the recency list.
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// An LRU cache with O(1) operations.
///
/// A capacity of zero disables the cache: inserts are dropped.
///
/// # Example
///
/// ```
/// use fluidb_cache::lru::LruCache;
///
/// let mut cache = LruCache::new(2);
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// assert_eq!(cache.get(&"a"), Some(&1));
///
/// // Adding a third item evicts "b" (least recently used)
/// cache.insert("c", 3);
/// assert_eq!(cache.get(&"b"), None);
/// ```
pub struct LruCache<K, V> {
    /// Maximum number of entries.
    capacity: usize,
    /// Map from key to slot index.
    map: HashMap<K, usize>,
    /// Dense node storage.
    slots: Vec<Node<K, V>>,
    /// Most recently used slot.
    head: Option<usize>,
    /// Least recently used slot.
    tail: Option<usize>,
    /// Statistics.
    stats: CacheStats,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Creates a new LRU cache with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            map: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            head: None,
            tail: None,
            stats: CacheStats::new(),
        }
    }

    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the capacity, evicting least recently used entries until
    /// the cache fits.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.map.len() > self.capacity {
            self.evict_lru();
        }
    }

    /// Gets a reference to the value for the given key.
    ///
    /// This marks the entry as recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.touch(key)?;
        Some(&self.slots[idx].value)
    }

    /// Gets a mutable reference to the value for the given key.
    ///
    /// This marks the entry as recently used.
    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.touch(key)?;
        Some(&mut self.slots[idx].value)
    }

    /// Gets a reference to the value without updating recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.get(key).map(|&idx| &self.slots[idx].value)
    }

    /// Checks if the cache contains the given key without updating recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Inserts a key-value pair into the cache.
    ///
    /// If the key already exists, updates the value, marks it as recently
    /// used and returns the old value. If the cache is at capacity, evicts
    /// the least recently used entry first.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.capacity == 0 {
            return None;
        }
        self.stats.record_insert();

        if let Some(&idx) = self.map.get(&key) {
            self.move_to_front(idx);
            return Some(std::mem::replace(&mut self.slots[idx].value, value));
        }

        if self.map.len() >= self.capacity {
            self.evict_lru();
        }

        let idx = self.slots.len();
        self.slots.push(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.map.insert(key, idx);

        None
    }

    /// Removes an entry from the cache.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        self.stats.record_removal();
        let (_, value) = self.remove_slot(idx);
        Some(value)
    }

    /// Clears all entries from the cache.
    pub fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.head = None;
        self.tail = None;
        self.stats.record_clear();
    }

    /// Returns the keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.slots.len());
        let mut current = self.head;
        while let Some(idx) = current {
            keys.push(&self.slots[idx].key);
            current = self.slots[idx].next;
        }
        keys
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Looks a key up, promoting it on a hit.
    fn touch<Q>(&mut self, key: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.map.get(key) {
            Some(&idx) => {
                self.stats.record_hit();
                self.move_to_front(idx);
                Some(idx)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    /// Moves a slot to the front of the list.
    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    /// Pushes a slot to the front of the list.
    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;

        if let Some(head) = self.head {
            self.slots[head].prev = Some(idx);
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    /// Unlinks a slot from the list.
    fn unlink(&mut self, idx: usize) {
        let prev = self.slots[idx].prev;
        let next = self.slots[idx].next;

        match prev {
            Some(prev) => self.slots[prev].next = next,
            None => self.head = next,
        }
        match next {
            Some(next) => self.slots[next].prev = prev,
            None => self.tail = prev,
        }

        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    /// Removes a slot whose key is already gone from the map.
    ///
    /// The last slot is swapped into the hole, so its neighbours and its
    /// map entry are repointed.
    fn remove_slot(&mut self, idx: usize) -> (K, V) {
        self.unlink(idx);
        let last = self.slots.len() - 1;
        let node = self.slots.swap_remove(idx);

        if idx != last {
            let prev = self.slots[idx].prev;
            let next = self.slots[idx].next;
            match prev {
                Some(prev) => self.slots[prev].next = Some(idx),
                None => self.head = Some(idx),
            }
            match next {
                Some(next) => self.slots[next].prev = Some(idx),
                None => self.tail = Some(idx),
            }
            if let Some(slot) = self.map.get_mut(&self.slots[idx].key) {
                *slot = idx;
            }
        }

        (node.key, node.value)
    }

    /// Evicts the least recently used entry.
    fn evict_lru(&mut self) {
        if let Some(tail) = self.tail {
            self.stats.record_eviction();
            let (key, _) = self.remove_slot(tail);
            self.map.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_operations() {
        let mut cache = LruCache::new(3);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_eviction() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(&2));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn test_get_promotes_oldest() {
        let mut cache = LruCache::new(4);
        for k in 1..=4 {
            cache.insert(k, k * 10);
        }

        cache.get(&1);
        cache.insert(5, 50);

        assert!(cache.contains(&1));
        assert!(!cache.contains(&2));
        assert!(cache.contains(&3));
        assert_eq!(cache.keys_by_recency(), vec![&5, &1, &4, &3]);
    }

    #[test]
    fn test_contains_and_peek_do_not_promote() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.insert("b", 2);

        assert!(cache.contains(&"a"));
        assert_eq!(cache.peek(&"a"), Some(&1));

        cache.insert("c", 3);
        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
    }

    #[test]
    fn test_insert_existing_promotes() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.insert("b", 2);
        let old = cache.insert("a", 10);
        cache.insert("c", 3);

        assert_eq!(old, Some(1));
        assert_eq!(cache.get(&"a"), Some(&10));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_remove_middle_keeps_links() {
        let mut cache = LruCache::new(4);
        for k in 1..=4 {
            cache.insert(k, k);
        }

        assert_eq!(cache.remove(&2), Some(2));
        assert_eq!(cache.keys_by_recency(), vec![&4, &3, &1]);

        cache.insert(5, 5);
        cache.insert(6, 6);
        assert_eq!(cache.keys_by_recency(), vec![&6, &5, &4, &3]);
        assert_eq!(cache.get(&4), Some(&4));
    }

    #[test]
    fn test_zero_capacity_disables() {
        let mut cache = LruCache::new(0);

        cache.insert("a", 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_shrink_trims_immediately() {
        let mut cache = LruCache::new(3);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("c", 3);

        cache.set_capacity(1);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains(&"c"));

        cache.set_capacity(0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut cache = LruCache::new(3);

        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(&"a"), None);
        assert!(cache.keys_by_recency().is_empty());
    }

    #[test]
    fn test_statistics() {
        let mut cache = LruCache::new(2);

        cache.insert("a", 1);
        cache.get(&"a"); // hit
        cache.get(&"b"); // miss
        cache.insert("b", 2);
        cache.insert("c", 3); // eviction

        let stats = cache.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.evictions(), 1);
    }
}
