//! SQLite connection backed by rusqlite.

use std::path::Path;

use rusqlite::types::Value as SqlValue;
use rusqlite::Statement;
use tracing::trace;

use fluidb_common::{FluidError, FluidResult, Params, Value, SAVEPOINT_PREFIX};

use super::{Connection, ResultSet};
use crate::dialect::{format_datetime, format_datetime_offset};

/// Prefixes SQLite accepts in front of a named parameter.
const NAME_PREFIXES: [char; 3] = [':', '@', '$'];

/// A SQLite database connection.
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Opens a private in-memory database.
    pub fn open_in_memory() -> FluidResult<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(FluidError::database)?;
        Ok(Self { conn })
    }

    /// Opens or creates a database file.
    pub fn open<P: AsRef<Path>>(path: P) -> FluidResult<Self> {
        let conn = rusqlite::Connection::open(path).map_err(FluidError::database)?;
        Ok(Self { conn })
    }

    /// Wraps an already open rusqlite connection.
    pub fn from_rusqlite(conn: rusqlite::Connection) -> Self {
        Self { conn }
    }

    /// Returns the underlying rusqlite connection.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn prepare(&self, sql: &str, params: &Params) -> FluidResult<Statement<'_>> {
        let mut stmt = self.conn.prepare(sql).map_err(FluidError::database)?;
        bind(&mut stmt, params)?;
        Ok(stmt)
    }

    fn batch(&mut self, sql: &str) -> FluidResult<()> {
        trace!(sql, "sqlite batch");
        self.conn.execute_batch(sql).map_err(FluidError::database)
    }
}

impl Connection for SqliteConnection {
    fn execute(&mut self, sql: &str, params: &Params) -> FluidResult<u64> {
        let mut stmt = self.prepare(sql, params)?;
        let changed = stmt.raw_execute().map_err(FluidError::database)?;
        Ok(changed as u64)
    }

    fn query(&mut self, sql: &str, params: &Params) -> FluidResult<ResultSet> {
        let mut stmt = self.prepare(sql, params)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = Vec::new();
        let mut cursor = stmt.raw_query();
        while let Some(row) = cursor.next().map_err(FluidError::database)? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                let raw: SqlValue = row.get(i).map_err(FluidError::database)?;
                values.push(from_sql(raw));
            }
            rows.push(values);
        }

        Ok(ResultSet::new(columns, rows))
    }

    fn begin(&mut self, depth: usize) -> FluidResult<()> {
        if depth == 0 {
            self.batch("BEGIN")
        } else {
            self.batch(&format!("SAVEPOINT {}{}", SAVEPOINT_PREFIX, depth))
        }
    }

    fn commit(&mut self, depth: usize) -> FluidResult<()> {
        if depth == 0 {
            self.batch("COMMIT")
        } else {
            self.batch(&format!("RELEASE SAVEPOINT {}{}", SAVEPOINT_PREFIX, depth))
        }
    }

    fn rollback(&mut self, depth: usize) -> FluidResult<()> {
        if depth == 0 {
            self.batch("ROLLBACK")
        } else {
            let name = format!("{}{}", SAVEPOINT_PREFIX, depth);
            self.batch(&format!(
                "ROLLBACK TO SAVEPOINT {name}; RELEASE SAVEPOINT {name}"
            ))
        }
    }
}

fn bind(stmt: &mut Statement<'_>, params: &Params) -> FluidResult<()> {
    match params {
        Params::Positional(values) => {
            for (i, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, to_sql(value))
                    .map_err(FluidError::database)?;
            }
        }
        Params::Named(map) => {
            for (name, value) in map {
                let index = named_index(stmt, name)?;
                stmt.raw_bind_parameter(index, to_sql(value))
                    .map_err(FluidError::database)?;
            }
        }
    }
    Ok(())
}

fn named_index(stmt: &Statement<'_>, name: &str) -> FluidResult<usize> {
    for prefix in NAME_PREFIXES {
        let qualified = format!("{}{}", prefix, name);
        if let Some(index) = stmt
            .parameter_index(&qualified)
            .map_err(FluidError::database)?
        {
            return Ok(index);
        }
    }
    Err(FluidError::database(rusqlite::Error::InvalidParameterName(
        name.to_string(),
    )))
}

/// Maps a value onto SQLite's storage classes.
///
/// Values are normally converted by the dialect before they get here; the
/// mapping is total so that raw commands can bind anything.
fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::U64(u) => match i64::try_from(*u) {
            Ok(i) => SqlValue::Integer(i),
            Err(_) => SqlValue::Text(u.to_string()),
        },
        Value::F64(f) => SqlValue::Real(*f),
        Value::Decimal(d) => SqlValue::Text(d.to_string()),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::DateTime(dt) => SqlValue::Text(format_datetime(dt)),
        Value::DateTimeOffset(dt) => SqlValue::Text(format_datetime_offset(dt)),
        Value::Guid(g) => SqlValue::Text(g.hyphenated().to_string()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        other => match other.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Text(other.to_string()),
        },
    }
}

fn from_sql(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::I64(i),
        SqlValue::Real(f) => Value::F64(f),
        SqlValue::Text(s) => Value::Text(s),
        SqlValue::Blob(b) => Value::Bytes(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluidb_common::params;

    fn open() -> SqliteConnection {
        let mut conn = SqliteConnection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (a INTEGER, b TEXT)", &params![])
            .unwrap();
        conn
    }

    #[test]
    fn test_positional_round_trip() {
        let mut conn = open();
        let changed = conn
            .execute("INSERT INTO t (a, b) VALUES (?1, ?2)", &params![7, "seven"])
            .unwrap();
        assert_eq!(changed, 1);

        let set = conn.query("SELECT a, b FROM t", &params![]).unwrap();
        assert_eq!(set.columns, vec!["a", "b"]);
        assert_eq!(set.rows, vec![vec![Value::I64(7), Value::from("seven")]]);
    }

    #[test]
    fn test_named_parameters_accept_any_prefix() {
        let mut conn = open();
        conn.execute(
            "INSERT INTO t (a, b) VALUES (:a, @b)",
            &Params::named([("a", Value::from(1)), ("b", Value::from("x"))]),
        )
        .unwrap();

        let set = conn
            .query("SELECT b FROM t WHERE a = $a", &Params::named([("a", 1)]))
            .unwrap();
        assert_eq!(set.first_cell(), Some(&Value::from("x")));
    }

    #[test]
    fn test_unknown_named_parameter() {
        let mut conn = open();
        let err = conn
            .query("SELECT * FROM t WHERE a = :a", &Params::named([("zzz", 1)]))
            .unwrap_err();
        assert!(err.to_string().contains("zzz"));
    }

    #[test]
    fn test_savepoint_rollback_keeps_outer_frame() {
        let mut conn = open();
        conn.begin(0).unwrap();
        conn.execute("INSERT INTO t (a) VALUES (1)", &params![]).unwrap();
        conn.begin(1).unwrap();
        conn.execute("INSERT INTO t (a) VALUES (2)", &params![]).unwrap();
        conn.rollback(1).unwrap();
        conn.commit(0).unwrap();

        let set = conn.query("SELECT a FROM t", &params![]).unwrap();
        assert_eq!(set.first_column(), vec![Value::I64(1)]);
    }

    #[test]
    fn test_native_errors_are_wrapped() {
        let mut conn = open();
        let err = conn
            .execute("INSERT INTO missing (a) VALUES (1)", &params![])
            .unwrap_err();
        assert_eq!(err.code(), fluidb_common::ErrorCode::Database);
        assert!(err.to_string().contains("missing"));
    }
}
