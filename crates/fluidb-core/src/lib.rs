//! Schema-adaptive row store for fluidb.
//!
//! This crate stores semi-structured records into SQL tables across
//! dialects:
//!
//! - **Ranks**: ordinal storage capability of values and column types
//! - **Dialects**: SQLite, MySQL/MariaDB and PostgreSQL adapters
//! - **Connections**: the driver seam, with a rusqlite-backed SQLite connection
//! - **Access**: command execution, query result caching, transaction frames
//! - **Keys**: simple and compound keys, per-table key policies
//! - **Catalog / Sync**: the cached live schema and fluid-mode DDL
//! - **Store**: store, load and trash records by key
//!
//! # Example
//!
//! ```rust
//! use fluidb_common::{Record, StoreConfig, Value};
//! use fluidb_core::{Key, RowStore, SqliteConnection};
//!
//! let config = StoreConfig::builder().fluid(true).build();
//! let conn = SqliteConnection::open_in_memory().unwrap();
//! let mut store = RowStore::new(Box::new(conn), &config).unwrap();
//!
//! let mut row = Record::new();
//! row.insert("n".to_string(), Value::from(1));
//! store.store("counter", &mut row, None).unwrap();
//!
//! row.insert("n".to_string(), Value::from("many"));
//! store.store("counter", &mut row, None).unwrap();
//!
//! let loaded = store.load("counter", &Key::from(1)).unwrap().unwrap();
//! assert_eq!(loaded.get("n"), Some(&Value::from("many")));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod access;
pub mod catalog;
pub mod connection;
pub mod dialect;
pub mod keys;
pub mod normalize;
pub mod rank;
pub mod store;
pub mod sync;

pub use access::{DatabaseAccess, QueryOutput};
pub use catalog::{Schema, SchemaCatalog, TableSchema};
pub use connection::{Connection, ResultSet, SqliteConnection};
pub use dialect::{
    ColumnDescriptor, Dialect, DialectFactory, MySqlDialect, PostgresDialect, SqliteDialect,
};
pub use keys::{CompoundKey, Key, KeyPolicy, KeyResolver};
pub use normalize::ValueRelaxations;
pub use rank::Rank;
pub use store::RowStore;
