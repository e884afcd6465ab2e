//! Caching utilities for fluidb.
//!
//! - **LRU Cache**: strict least-recently-used cache with O(1) operations
//! - **Command Descriptor**: the normalized key a query result is cached under
//! - **Query Cache**: read-only query results keyed by command descriptor
//!
//! # Example
//!
//! ```rust
//! use fluidb_cache::lru::LruCache;
//!
//! let mut cache = LruCache::new(100);
//! cache.insert("key1", "value1");
//! assert_eq!(cache.get(&"key1"), Some(&"value1"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod descriptor;
pub mod lru;
pub mod query_cache;
pub mod stats;

pub use descriptor::{CommandDescriptor, CommandTag};
pub use lru::LruCache;
pub use query_cache::QueryCache;
pub use stats::CacheStats;
