//! Cache statistics for monitoring and debugging.

/// Counters for cache operations.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of lookups.
    accesses: u64,
    /// Number of lookups that found an entry.
    hits: u64,
    /// Number of lookups that found nothing.
    misses: u64,
    /// Number of insertions.
    inserts: u64,
    /// Number of capacity evictions.
    evictions: u64,
    /// Number of explicit removals.
    removals: u64,
    /// Number of whole-cache clears.
    clears: u64,
}

impl CacheStats {
    /// Creates new statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a hit.
    #[inline]
    pub fn record_hit(&mut self) {
        self.accesses += 1;
        self.hits += 1;
    }

    /// Records a miss.
    #[inline]
    pub fn record_miss(&mut self) {
        self.accesses += 1;
        self.misses += 1;
    }

    /// Records an insertion.
    #[inline]
    pub fn record_insert(&mut self) {
        self.inserts += 1;
    }

    /// Records an eviction.
    #[inline]
    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    /// Records a removal.
    #[inline]
    pub fn record_removal(&mut self) {
        self.removals += 1;
    }

    /// Records a clear.
    #[inline]
    pub fn record_clear(&mut self) {
        self.clears += 1;
    }

    /// Returns total lookups.
    pub fn accesses(&self) -> u64 {
        self.accesses
    }

    /// Returns cache hits.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Returns cache misses.
    pub fn misses(&self) -> u64 {
        self.misses
    }

    /// Returns insertions.
    pub fn inserts(&self) -> u64 {
        self.inserts
    }

    /// Returns evictions.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    /// Returns removals.
    pub fn removals(&self) -> u64 {
        self.removals
    }

    /// Returns clears.
    pub fn clears(&self) -> u64 {
        self.clears
    }

    /// Returns the hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        let accesses = self.accesses();
        if accesses == 0 {
            0.0
        } else {
            self.hits() as f64 / accesses as f64
        }
    }

    /// Resets all statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
