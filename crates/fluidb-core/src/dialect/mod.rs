//! SQL dialect adapters.
//!
//! A [`Dialect`] supplies everything the row store needs to know about a
//! database's grammar: identifier quoting, parameter placeholders, the rank
//! table, value conversions, schema introspection, DDL and keyed inserts.
//! The adapter is picked once, from a [`DialectKind`], when a store is built.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use std::sync::Arc;

use chrono::{NaiveDateTime, SecondsFormat};
use rust_decimal::Decimal;

use fluidb_common::{DialectKind, FluidError, FluidResult, Params, Record, Value};

use crate::access::DatabaseAccess;
use crate::catalog::TableSchema;
use crate::rank::{self, Rank, RankEntry};

/// A column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,
    /// Declared SQL type, as the database reports it.
    pub sql_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Default expression, if any.
    pub default_value: Option<String>,
    /// Part of the primary key.
    pub primary_key: bool,
    /// Generated by the database.
    pub auto_increment: bool,
}

impl ColumnDescriptor {
    /// Returns true if the column has a default.
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

/// Grammar and storage rules of one SQL dialect.
pub trait Dialect: Send + Sync {
    /// Returns which dialect this is.
    fn kind(&self) -> DialectKind;

    /// Returns the dialect name used in error messages.
    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Returns the identifier quote character.
    fn quote_char(&self) -> char;

    /// Quotes an identifier. Names containing the quote character are
    /// rejected rather than escaped.
    fn quote_identifier(&self, name: &str) -> FluidResult<String> {
        let q = self.quote_char();
        if name.is_empty() || name.contains(q) {
            return Err(FluidError::InvalidIdentifier {
                name: name.to_string(),
            });
        }
        Ok(format!("{q}{name}{q}"))
    }

    /// Returns true if the database matches identifiers without regard to
    /// ASCII case, quoted or not.
    fn folds_identifier_case(&self) -> bool {
        true
    }

    /// Returns the placeholder for the zero-based parameter `index`.
    fn param_placeholder(&self, index: usize) -> String;

    /// Returns the ordered rank table.
    fn rank_table(&self) -> &'static [RankEntry];

    /// Classifies a value. Null ranks as [`Rank::Null`].
    fn rank_of_value(&self, value: &Value) -> FluidResult<Rank>;

    /// Classifies a declared SQL type.
    fn rank_of_sql_type(&self, sql_type: &str) -> Rank {
        rank::rank_of(self.rank_table(), sql_type)
    }

    /// Returns the SQL type generated for a rank.
    fn sql_type_of_rank(&self, rank: Rank) -> Option<&'static str> {
        rank::sql_type_of(self.rank_table(), rank)
    }

    /// Narrows an integer to the form the dialect stores best.
    fn normalize_integer_for_storage(&self, value: i64) -> Value {
        Value::I64(value)
    }

    /// Converts values the driver cannot take natively.
    fn convert_for_storage(&self, value: Value) -> FluidResult<Value> {
        Ok(value)
    }

    /// Lists user tables.
    fn list_tables(&self, db: &mut DatabaseAccess) -> FluidResult<Vec<String>>;

    /// Lists a table's columns in declaration order.
    fn list_columns(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
    ) -> FluidResult<Vec<ColumnDescriptor>>;

    /// Creates a table, with a generated key column when `auto_increment`
    /// names one.
    fn create_table(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        columns: &TableSchema,
    ) -> FluidResult<()>;

    /// Widens `changed` columns and adds `added` ones.
    fn alter_schema(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        old: &TableSchema,
        changed: &TableSchema,
        added: &TableSchema,
    ) -> FluidResult<()>;

    /// Inserts a row and returns the generated key when `auto_increment`
    /// names one.
    fn insert(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        data: &Record,
    ) -> FluidResult<Option<Value>>;

    /// Returns true if the command cannot modify data or schema.
    fn is_read_only(&self, sql: &str) -> bool;
}

/// Builds dialect adapters from a [`DialectKind`].
pub trait DialectFactory {
    /// Returns the adapter for this dialect.
    fn adapter(&self) -> Arc<dyn Dialect>;
}

impl DialectFactory for DialectKind {
    fn adapter(&self) -> Arc<dyn Dialect> {
        match self {
            DialectKind::Sqlite => Arc::new(SqliteDialect),
            DialectKind::MySql => Arc::new(MySqlDialect),
            DialectKind::Postgres => Arc::new(PostgresDialect),
        }
    }
}

/// Returns the SQL type for a generated column.
pub(crate) fn column_type(
    dialect: &dyn Dialect,
    table: &str,
    column: &str,
    rank: Rank,
) -> FluidResult<&'static str> {
    dialect
        .sql_type_of_rank(rank)
        .ok_or_else(|| FluidError::UnsupportedColumnType {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// Returns `"name" TYPE` definitions for generated columns.
pub(crate) fn column_definitions(
    dialect: &dyn Dialect,
    table: &str,
    columns: &TableSchema,
) -> FluidResult<Vec<String>> {
    columns
        .iter()
        .map(|(name, rank)| {
            let ty = column_type(dialect, table, name, *rank)?;
            Ok(format!("{} {}", dialect.quote_identifier(name)?, ty))
        })
        .collect()
}

/// Builds `INSERT INTO t (a, b) VALUES (p0, p1)` for a non-empty record.
pub(crate) fn insert_statement(
    dialect: &dyn Dialect,
    table: &str,
    data: &Record,
) -> FluidResult<(String, Params)> {
    let mut names = Vec::with_capacity(data.len());
    let mut placeholders = Vec::with_capacity(data.len());
    let mut values = Vec::with_capacity(data.len());
    for (i, (name, value)) in data.iter().enumerate() {
        names.push(dialect.quote_identifier(name)?);
        placeholders.push(dialect.param_placeholder(i));
        values.push(value.clone());
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_identifier(table)?,
        names.join(", "),
        placeholders.join(", ")
    );
    Ok((sql, Params::Positional(values)))
}

/// Converts a decimal to a float when the float renders back to the same
/// decimal, otherwise to its text form.
pub(crate) fn decimal_fallback(d: Decimal) -> Value {
    let text = d.to_string();
    match text.parse::<f64>() {
        Ok(f) if f.is_finite() && f.to_string().parse::<Decimal>().ok() == Some(d) => {
            Value::F64(f)
        }
        _ => Value::Text(text),
    }
}

/// Formats a date-time as `YYYY-MM-DD HH:MM:SS[.fff]`.
pub(crate) fn format_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Formats an offset date-time as RFC 3339.
pub(crate) fn format_datetime_offset(dt: &chrono::DateTime<chrono::FixedOffset>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

pub(crate) fn unsupported(dialect: &dyn Dialect, value: &Value) -> FluidError {
    FluidError::UnsupportedValueType {
        type_name: value.type_name(),
        dialect: dialect.name(),
    }
}

/// Returns the first keyword of a command, upper-cased, skipping
/// whitespace, comments and opening parentheses.
pub(crate) fn first_keyword(sql: &str) -> String {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Returns true if any word of the command is a data-modifying keyword.
pub(crate) fn has_write_keyword(sql: &str) -> bool {
    sql.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| {
            ["INSERT", "UPDATE", "DELETE", "REPLACE", "MERGE", "UPSERT"]
                .iter()
                .any(|kw| word.eq_ignore_ascii_case(kw))
        })
}

/// Returns the text of a cell, or an empty string for NULL.
pub(crate) fn text_at(row: &[Value], index: usize) -> String {
    match row.get(index) {
        Some(Value::Text(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Returns a cell as text, or `None` for NULL.
pub(crate) fn optional_text_at(row: &[Value], index: usize) -> Option<String> {
    match row.get(index) {
        Some(Value::Null) | None => None,
        _ => Some(text_at(row, index)),
    }
}
