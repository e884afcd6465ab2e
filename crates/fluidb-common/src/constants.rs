//! System-wide defaults.

/// Default number of query results kept by the query cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Default key column name for tables without a registered key policy.
pub const DEFAULT_KEY_NAME: &str = "id";

/// Name prefix for the nested transaction frames a connection opens
/// below the outermost one.
pub const SAVEPOINT_PREFIX: &str = "fluidb_sp";
