//! # fluidb-common
//!
//! Common types, errors, and configuration for fluidb.
//!
//! This crate provides the foundational types used across all fluidb
//! components:
//!
//! - **Types**: the scalar [`Value`] model, [`Record`] rows and command [`Params`]
//! - **Errors**: unified error handling with [`FluidError`]
//! - **Config**: the row store configuration, loadable from TOML
//! - **Constants**: defaults shared by the cache and the row store
//!
//! ## Example
//!
//! ```rust
//! use fluidb_common::{params, Record, Value};
//!
//! let mut record = Record::new();
//! record.insert("name".to_string(), Value::from("Alice"));
//! record.insert("age".to_string(), Value::from(42));
//!
//! let p = params![1, "two"];
//! assert_eq!(p.len(), 2);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{DialectKind, StoreConfig};
pub use constants::*;
pub use error::{ErrorCode, FluidError, FluidResult};
pub use types::{Params, Record, Value};
