//! PostgreSQL dialect.

use fluidb_common::{DialectKind, FluidResult, Params, Record, Value};
use rust_decimal::Decimal;

use super::{
    column_definitions, column_type, first_keyword, has_write_keyword, insert_statement,
    optional_text_at, text_at, ColumnDescriptor, Dialect,
};
use crate::access::DatabaseAccess;
use crate::catalog::TableSchema;
use crate::rank::{Rank, RankEntry};

const RANKS: &[RankEntry] = &[
    (Rank::Tier(0), "BOOLEAN"),
    (Rank::Tier(1), "INTEGER"),
    (Rank::Tier(2), "BIGINT"),
    (Rank::Tier(3), "DOUBLE PRECISION"),
    (Rank::Tier(4), "NUMERIC"),
    (Rank::Tier(5), "TEXT"),
    (Rank::Static(1), "TIMESTAMP WITHOUT TIME ZONE"),
    (Rank::Static(2), "TIMESTAMP WITH TIME ZONE"),
    (Rank::Static(3), "UUID"),
    (Rank::Static(4), "BYTEA"),
];

/// The PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn quote_char(&self) -> char {
        '"'
    }

    fn folds_identifier_case(&self) -> bool {
        false
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index + 1)
    }

    fn rank_table(&self) -> &'static [RankEntry] {
        RANKS
    }

    fn rank_of_value(&self, value: &Value) -> FluidResult<Rank> {
        Ok(match value {
            Value::Null => Rank::Null,
            Value::Bool(_) => Rank::Tier(0),
            Value::F64(_) => Rank::Tier(3),
            Value::Decimal(_) => Rank::Tier(4),
            Value::Text(_) => Rank::Tier(5),
            Value::DateTime(_) => Rank::Static(1),
            Value::DateTimeOffset(_) => Rank::Static(2),
            Value::Guid(_) => Rank::Static(3),
            Value::Bytes(_) => Rank::Static(4),
            other => match other.as_i64() {
                Some(i) if i32::try_from(i).is_ok() => Rank::Tier(1),
                Some(_) => Rank::Tier(2),
                None => Rank::Tier(4),
            },
        })
    }

    fn normalize_integer_for_storage(&self, value: i64) -> Value {
        match i32::try_from(value) {
            Ok(narrow) => Value::I32(narrow),
            Err(_) => Value::I64(value),
        }
    }

    fn convert_for_storage(&self, value: Value) -> FluidResult<Value> {
        Ok(match value {
            Value::U64(u) => match i64::try_from(u) {
                Ok(i) => self.normalize_integer_for_storage(i),
                Err(_) => Value::Decimal(Decimal::from(u)),
            },
            other => other,
        })
    }

    fn list_tables(&self, db: &mut DatabaseAccess) -> FluidResult<Vec<String>> {
        let set = db.introspect(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_type = 'BASE TABLE'",
            Params::none(),
        )?;
        Ok(set.rows.iter().map(|row| text_at(row, 0)).collect())
    }

    fn list_columns(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
    ) -> FluidResult<Vec<ColumnDescriptor>> {
        let set = db.introspect(
            "SELECT c.column_name, c.data_type, c.is_nullable, c.column_default, \
             EXISTS (SELECT 1 FROM information_schema.key_column_usage k \
             JOIN information_schema.table_constraints t \
             ON t.constraint_name = k.constraint_name AND t.table_schema = k.table_schema \
             WHERE t.constraint_type = 'PRIMARY KEY' AND k.table_schema = c.table_schema \
             AND k.table_name = c.table_name AND k.column_name = c.column_name) \
             FROM information_schema.columns c \
             WHERE c.table_schema = current_schema() AND c.table_name = $1 \
             ORDER BY c.ordinal_position",
            Params::Positional(vec![Value::from(table)]),
        )?;

        Ok(set
            .rows
            .iter()
            .map(|row| {
                let default_value = optional_text_at(row, 3);
                ColumnDescriptor {
                    name: text_at(row, 0),
                    sql_type: text_at(row, 1),
                    nullable: text_at(row, 2).eq_ignore_ascii_case("YES"),
                    primary_key: matches!(row.get(4), Some(Value::Bool(true))),
                    auto_increment: default_value
                        .as_deref()
                        .is_some_and(|d| d.starts_with("nextval(")),
                    default_value,
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
            definitions.push(format!(
                "{} BIGSERIAL PRIMARY KEY",
                self.quote_identifier(column)?
            ));
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
        _auto_increment: Option<&str>,
        _old: &TableSchema,
        changed: &TableSchema,
        added: &TableSchema,
    ) -> FluidResult<()> {
        let mut clauses = Vec::with_capacity(changed.len() + added.len());
        for (name, rank) in changed {
            let column = self.quote_identifier(name)?;
            let ty = column_type(self, table, name, *rank)?;
            clauses.push(format!(
                "ALTER COLUMN {column} TYPE {ty} USING {column}::{ty}"
            ));
        }
        for definition in column_definitions(self, table, added)? {
            clauses.push(format!("ADD COLUMN {}", definition));
        }
        if clauses.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "ALTER TABLE {} {}",
            self.quote_identifier(table)?,
            clauses.join(", ")
        );
        db.exec(&sql, Params::none())?;
        Ok(())
    }

    fn insert(
        &self,
        db: &mut DatabaseAccess,
        table: &str,
        auto_increment: Option<&str>,
        data: &Record,
    ) -> FluidResult<Option<Value>> {
        let (mut sql, params) = if data.is_empty() {
            (
                format!("INSERT INTO {} DEFAULT VALUES", self.quote_identifier(table)?),
                Params::none(),
            )
        } else {
            insert_statement(self, table, data)?
        };

        match auto_increment {
            Some(column) => {
                sql.push_str(" RETURNING ");
                sql.push_str(&self.quote_identifier(column)?);
                Ok(Some(db.cell(false, &sql, params)?))
            }
            None => {
                db.exec(&sql, params)?;
                Ok(None)
            }
        }
    }

    fn is_read_only(&self, sql: &str) -> bool {
        match first_keyword(sql).as_str() {
            "SELECT" | "SHOW" | "EXPLAIN" | "VALUES" | "TABLE" => !has_write_keyword(sql),
            "WITH" => !has_write_keyword(sql),
            _ => false,
        }
    }
}
