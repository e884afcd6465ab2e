//! Database connections.
//!
//! A [`Connection`] runs SQL text with bound parameters and manages
//! transaction frames. Everything above it (caching, dialect grammar,
//! schema handling) is driver independent.

mod sqlite;

pub use sqlite::SqliteConnection;

use fluidb_common::{FluidResult, Params, Record, Value};

/// Rows returned by a query, with column names in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Column names.
    pub columns: Vec<String>,
    /// Row values, one vector per row in column order.
    pub rows: Vec<Vec<Value>>,
}

impl ResultSet {
    /// Creates a result set.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Returns true if there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the first column of the first row.
    pub fn first_cell(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    /// Returns the first column of every row.
    pub fn first_column(self) -> Vec<Value> {
        self.rows
            .into_iter()
            .map(|row| row.into_iter().next().unwrap_or(Value::Null))
            .collect()
    }

    /// Converts the rows into records.
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// A live database connection.
///
/// Transaction frames nest: `begin(0)` opens the outermost frame and
/// `begin(n)` for `n > 0` opens a frame inside it, using whatever nesting
/// the database offers.
pub trait Connection {
    /// Runs a command and returns the number of affected rows.
    fn execute(&mut self, sql: &str, params: &Params) -> FluidResult<u64>;

    /// Runs a query and returns its rows.
    fn query(&mut self, sql: &str, params: &Params) -> FluidResult<ResultSet>;

    /// Opens a transaction frame at the given nesting depth.
    fn begin(&mut self, depth: usize) -> FluidResult<()>;

    /// Commits the frame at the given depth.
    fn commit(&mut self, depth: usize) -> FluidResult<()>;

    /// Rolls back the frame at the given depth.
    fn rollback(&mut self, depth: usize) -> FluidResult<()>;
}
