//! Configuration for fluidb.
//!
//! This module provides the row store configuration and the dialect
//! selector.

mod store;

pub use store::{DialectKind, StoreConfig, StoreConfigBuilder};
