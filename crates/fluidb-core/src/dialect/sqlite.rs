//! SQLite dialect.
//!
//! SQLite has no real column types, only affinities, so the rank table is
//! short. Widening a column means rebuilding the table, because SQLite
//! cannot change a column's declared type in place.

use fluidb_common::{DialectKind, FluidResult, Params, Record, Value};
use tracing::debug;

use super::{
    column_definitions, column_type, decimal_fallback, first_keyword, format_datetime,
    format_datetime_offset, has_write_keyword, insert_statement, optional_text_at, text_at,
    unsupported, ColumnDescriptor, Dialect,
};
use crate::access::DatabaseAccess;
use crate::catalog::TableSchema;
use crate::rank::{Rank, RankEntry};

const RANKS: &[RankEntry] = &[
    (Rank::Tier(0), "INTEGER"),
    (Rank::Tier(1), "REAL"),
    (Rank::Tier(2), "TEXT"),
    (Rank::Static(1), "BLOB"),
];

/// Suffix of the table a rebuild copies rows out of.
const REBUILD_SUFFIX: &str = "__fluidb_rebuild";

/// The SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl SqliteDialect {
    fn auto_increment_definition(&self, column: &str) -> FluidResult<String> {
        Ok(format!(
            "{} INTEGER PRIMARY KEY AUTOINCREMENT",
            self.quote_identifier(column)?
        ))
    }

    /// Rebuilds a table with widened column types, keeping the declarations
    /// of every other column.
    fn rebuild(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        changed: &TableSchema,
        added: &TableSchema,
    ) -> FluidResult<()> {
        let existing = self.list_columns(db, table)?;
        let quoted = self.quote_identifier(table)?;
        let scratch = self.quote_identifier(&format!("{}{}", table, REBUILD_SUFFIX))?;

        let mut definitions = Vec::with_capacity(existing.len() + added.len());
        let mut copied = Vec::with_capacity(existing.len());
        let mut primary_key = Vec::new();
        let mut has_auto_column = false;

        for column in &existing {
            let name = self.quote_identifier(&column.name)?;
            copied.push(name.clone());

            if column.auto_increment || auto_increment == Some(column.name.as_str()) {
                definitions.push(self.auto_increment_definition(&column.name)?);
                has_auto_column = true;
                continue;
            }
            if column.primary_key {
                primary_key.push(name.clone());
            }

            let definition = match changed.get(&column.name) {
                Some(rank) => {
                    format!("{} {}", name, column_type(self, table, &column.name, *rank)?)
                }
                None => {
                    let mut def = format!("{} {}", name, column.sql_type);
                    if !column.nullable {
                        def.push_str(" NOT NULL");
                    }
                    if let Some(default) = &column.default_value {
                        def.push_str(" DEFAULT ");
                        def.push_str(default);
                    }
                    def
                }
            };
            definitions.push(definition.trim_end().to_string());
        }

        definitions.extend(column_definitions(self, table, added)?);
        if !primary_key.is_empty() && !has_auto_column {
            definitions.push(format!("PRIMARY KEY ({})", primary_key.join(", ")));
        }

        debug!(table, columns = changed.len(), "rebuilding sqlite table");

        let columns = copied.join(", ");
        db.exec(
            &format!("ALTER TABLE {} RENAME TO {}", quoted, scratch),
            Params::none(),
        )?;
        db.exec(
            &format!("CREATE TABLE {} ({})", quoted, definitions.join(", ")),
            Params::none(),
        )?;
        db.exec(
            &format!(
                "INSERT INTO {} ({}) SELECT {} FROM {}",
                quoted, columns, columns, scratch
            ),
            Params::none(),
        )?;
        db.exec(&format!("DROP TABLE {}", scratch), Params::none())?;
        Ok(())
    }
}

impl Dialect for SqliteDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Sqlite
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("?{}", index + 1)
    }

    fn rank_table(&self) -> &'static [RankEntry] {
        RANKS
    }

    fn rank_of_value(&self, value: &Value) -> FluidResult<Rank> {
        Ok(match value {
            Value::Null => Rank::Null,
            Value::F64(f) if !f.is_finite() => return Err(unsupported(self, value)),
            Value::F64(_) => Rank::Tier(1),
            Value::Bytes(_) => Rank::Static(1),
            Value::Text(_) => Rank::Tier(2),
            Value::Bool(_)
            | Value::I8(_)
            | Value::I16(_)
            | Value::I32(_)
            | Value::I64(_)
            | Value::U8(_)
            | Value::U16(_)
            | Value::U32(_) => Rank::Tier(0),
            other => return self.rank_of_value(&self.convert_for_storage(other.clone())?),
        })
    }

    fn convert_for_storage(&self, value: Value) -> FluidResult<Value> {
        Ok(match value {
            Value::Bool(b) => Value::I64(i64::from(b)),
            Value::U64(u) => match i64::try_from(u) {
                Ok(i) => Value::I64(i),
                Err(_) => Value::Text(u.to_string()),
            },
            Value::F64(f) if !f.is_finite() => return Err(unsupported(self, &value)),
            Value::Decimal(d) => decimal_fallback(d),
            Value::DateTime(dt) => Value::Text(format_datetime(&dt)),
            Value::DateTimeOffset(dt) => Value::Text(format_datetime_offset(&dt)),
            Value::Guid(g) => Value::Text(g.hyphenated().to_string()),
            other => other,
        })
    }

    fn list_tables(&self, db: &mut DatabaseAccess) -> FluidResult<Vec<String>> {
        let set = db.introspect(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
            Params::none(),
        )?;
        Ok(set.rows.iter().map(|row| text_at(row, 0)).collect())
    }

    fn list_columns(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
    ) -> FluidResult<Vec<ColumnDescriptor>> {
        let sql = format!("PRAGMA table_info({})", self.quote_identifier(table)?);
        let set = db.introspect(&sql, Params::none())?;

        // cid, name, type, notnull, dflt_value, pk
        let key_columns = set
            .rows
            .iter()
            .filter(|row| row.get(5).and_then(Value::as_i64).unwrap_or(0) > 0)
            .count();

        Ok(set
            .rows
            .iter()
            .map(|row| {
                let sql_type = text_at(row, 2);
                let primary_key = row.get(5).and_then(Value::as_i64).unwrap_or(0) > 0;
                ColumnDescriptor {
                    name: text_at(row, 1),
                    nullable: row.get(3).and_then(Value::as_i64).unwrap_or(0) == 0,
                    default_value: optional_text_at(row, 4),
                    primary_key,
                    auto_increment: primary_key
                        && key_columns == 1
                        && sql_type.eq_ignore_ascii_case("INTEGER"),
                    sql_type,
                }
            })
            .collect())
    }

    fn create_table(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        columns: &TableSchema,
    ) -> FluidResult<()> {
        let mut definitions = Vec::with_capacity(columns.len() + 1);
        if let Some(column) = auto_increment {
            definitions.push(self.auto_increment_definition(column)?);
        }
        definitions.extend(column_definitions(self, table, columns)?);

        let sql = format!(
            "CREATE TABLE {} ({})",
            self.quote_identifier(table)?,
            definitions.join(", ")
        );
        db.exec(&sql, Params::none())?;
        Ok(())
    }

    fn alter_schema(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        _old: &TableSchema,
        changed: &TableSchema,
        added: &TableSchema,
    ) -> FluidResult<()> {
        if !changed.is_empty() {
            return self.rebuild(db, table, auto_increment, changed, added);
        }

        let quoted = self.quote_identifier(table)?;
        for definition in column_definitions(self, table, added)? {
            db.exec(
                &format!("ALTER TABLE {} ADD COLUMN {}", quoted, definition),
                Params::none(),
            )?;
        }
        Ok(())
    }

    fn insert(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        data: &Record,
    ) -> FluidResult<Option<Value>> {
        if data.is_empty() {
            let sql = format!("INSERT INTO {} DEFAULT VALUES", self.quote_identifier(table)?);
            db.exec(&sql, Params::none())?;
        } else {
            let (sql, params) = insert_statement(self, table, data)?;
            db.exec(&sql, params)?;
        }

        if auto_increment.is_none() {
            return Ok(None);
        }
        let set = db.introspect("SELECT last_insert_rowid()", Params::none())?;
        Ok(set.first_cell().cloned())
    }

    fn is_read_only(&self, sql: &str) -> bool {
        match first_keyword(sql).as_str() {
            "SELECT" | "EXPLAIN" | "VALUES" => true,
            // `PRAGMA x(v)` sets just like `PRAGMA x = v`.
            "PRAGMA" => false,
            "WITH" => !has_write_keyword(sql),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[test]
    fn test_value_ranks() {
        let d = SqliteDialect;
        assert_eq!(d.rank_of_value(&Value::Null).unwrap(), Rank::Null);
        assert_eq!(d.rank_of_value(&Value::Bool(true)).unwrap(), Rank::Tier(0));
        assert_eq!(d.rank_of_value(&Value::I64(i64::MAX)).unwrap(), Rank::Tier(0));
        assert_eq!(d.rank_of_value(&Value::F64(0.5)).unwrap(), Rank::Tier(1));
        assert_eq!(d.rank_of_value(&Value::from("x")).unwrap(), Rank::Tier(2));
        assert_eq!(d.rank_of_value(&Value::U64(u64::MAX)).unwrap(), Rank::Tier(2));
        assert_eq!(d.rank_of_value(&Value::Bytes(vec![1])).unwrap(), Rank::Static(1));
        assert_eq!(
            d.rank_of_value(&Value::Guid(Uuid::nil())).unwrap(),
            Rank::Tier(2)
        );
    }

    #[test]
    fn test_non_finite_float_is_unsupported() {
        let err = SqliteDialect.rank_of_value(&Value::F64(f64::NAN)).unwrap_err();
        assert_eq!(err.code(), fluidb_common::ErrorCode::UnsupportedValueType);
        assert!(SqliteDialect.convert_for_storage(Value::F64(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_fallback_conversions() {
        let d = SqliteDialect;
        assert_eq!(d.convert_for_storage(Value::Bool(false)).unwrap(), Value::I64(0));
        assert_eq!(
            d.convert_for_storage(Value::Decimal(Decimal::new(125, 2))).unwrap(),
            Value::F64(1.25)
        );

        let dt = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap();
        assert_eq!(
            d.convert_for_storage(Value::DateTime(dt)).unwrap(),
            Value::from("2024-03-01 12:30:00")
        );
        assert_eq!(
            d.convert_for_storage(Value::Guid(Uuid::nil())).unwrap(),
            Value::from("00000000-0000-0000-0000-000000000000")
        );
    }

    #[test]
    fn test_sql_type_ranks() {
        let d = SqliteDialect;
        assert_eq!(d.rank_of_sql_type("integer"), Rank::Tier(0));
        assert_eq!(d.rank_of_sql_type("TEXT"), Rank::Tier(2));
        assert_eq!(d.rank_of_sql_type("VARCHAR(10)"), Rank::Custom);
        assert_eq!(d.rank_of_sql_type(""), Rank::Custom);
        assert_eq!(d.sql_type_of_rank(Rank::Tier(1)), Some("REAL"));
        assert_eq!(d.sql_type_of_rank(Rank::Custom), None);
    }

    #[test]
    fn test_read_only_classification() {
        let d = SqliteDialect;
        assert!(d.is_read_only("SELECT * FROM t"));
        assert!(d.is_read_only("  explain query plan select 1"));
        assert!(!d.is_read_only("PRAGMA table_info(t)"));
        assert!(!d.is_read_only("PRAGMA foreign_keys = ON"));
        assert!(!d.is_read_only("PRAGMA user_version(5)"));
        assert!(!d.is_read_only("pragma user_version"));
        assert!(!d.is_read_only("INSERT INTO t VALUES (1)"));
        assert!(!d.is_read_only("CREATE TABLE t (a)"));
        assert!(d.is_read_only("WITH x AS (SELECT 1) SELECT * FROM x"));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SqliteDialect.param_placeholder(0), "?1");
        assert_eq!(SqliteDialect.param_placeholder(4), "?5");
    }
}
