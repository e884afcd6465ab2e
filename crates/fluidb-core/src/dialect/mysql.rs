//! MySQL and MariaDB dialect.

use fluidb_common::{DialectKind, FluidResult, Params, Record, Value};

use super::{
    column_definitions, decimal_fallback, first_keyword, insert_statement, optional_text_at,
    text_at, unsupported, ColumnDescriptor, Dialect,
};
use crate::access::DatabaseAccess;
use crate::catalog::TableSchema;
use crate::rank::{self, Rank, RankEntry};

const RANKS: &[RankEntry] = &[
    (Rank::Tier(0), "TINYINT"),
    (Rank::Tier(1), "INT"),
    (Rank::Tier(2), "BIGINT"),
    (Rank::Tier(3), "DOUBLE"),
    (Rank::Tier(4), "VARCHAR(36)"),
    (Rank::Tier(5), "VARCHAR(191)"),
    (Rank::Tier(6), "LONGTEXT"),
    (Rank::Static(1), "DATETIME"),
    (Rank::Static(2), "LONGBLOB"),
];

const TABLE_OPTIONS: &str = "ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci";

/// The MySQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

fn integer_rank(value: i64) -> Rank {
    if i8::try_from(value).is_ok() {
        Rank::Tier(0)
    } else if i32::try_from(value).is_ok() {
        Rank::Tier(1)
    } else {
        Rank::Tier(2)
    }
}

fn text_rank(text: &str) -> Rank {
    match text.chars().count() {
        0..=36 => Rank::Tier(4),
        37..=191 => Rank::Tier(5),
        _ => Rank::Tier(6),
    }
}

/// Drops the display width MySQL reports on integer types, so that
/// `int(11)` ranks like `INT`.
fn strip_display_width(sql_type: &str) -> &str {
    let trimmed = sql_type.trim();
    if let Some((head, rest)) = trimmed.split_once('(') {
        let is_integer = ["tinyint", "int", "bigint"]
            .iter()
            .any(|ty| head.eq_ignore_ascii_case(ty));
        let digits = rest.strip_suffix(')').unwrap_or("");
        if is_integer && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
            return head;
        }
    }
    trimmed
}

impl Dialect for MySqlDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::MySql
    }

    fn quote_char(&self) -> char {
        '`'
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn rank_table(&self) -> &'static [RankEntry] {
        RANKS
    }

    fn rank_of_value(&self, value: &Value) -> FluidResult<Rank> {
        Ok(match value {
            Value::Null => Rank::Null,
            Value::Bool(_) => Rank::Tier(0),
            Value::F64(f) if !f.is_finite() => return Err(unsupported(self, value)),
            Value::F64(_) => Rank::Tier(3),
            Value::Text(s) => text_rank(s),
            Value::DateTime(_) => Rank::Static(1),
            Value::DateTimeOffset(_) => Rank::Custom,
            Value::Bytes(_) => Rank::Static(2),
            Value::Decimal(_) | Value::Guid(_) | Value::U64(_) if value.as_i64().is_none() => {
                return self.rank_of_value(&self.convert_for_storage(value.clone())?)
            }
            other => match other.as_i64() {
                Some(i) => integer_rank(i),
                None => return Err(unsupported(self, other)),
            },
        })
    }

    fn rank_of_sql_type(&self, sql_type: &str) -> Rank {
        rank::rank_of(RANKS, strip_display_width(sql_type))
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
            Value::Guid(g) => Value::Text(g.hyphenated().to_string()),
            other => other,
        })
    }

    fn list_tables(&self, db: &mut DatabaseAccess) -> FluidResult<Vec<String>> {
        let set = db.introspect(
            "SELECT table_name FROM information_schema.tables \
             WHERE table_schema = DATABASE() AND table_type = 'BASE TABLE'",
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
            "SELECT column_name, column_type, is_nullable, column_default, column_key, extra \
             FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? \
             ORDER BY ordinal_position",
            Params::Positional(vec![Value::from(table)]),
        )?;

        Ok(set
            .rows
            .iter()
            .map(|row| ColumnDescriptor {
                name: text_at(row, 0),
                sql_type: text_at(row, 1),
                nullable: text_at(row, 2).eq_ignore_ascii_case("YES"),
                default_value: optional_text_at(row, 3),
                primary_key: text_at(row, 4).eq_ignore_ascii_case("PRI"),
                auto_increment: text_at(row, 5)
                    .to_ascii_lowercase()
                    .contains("auto_increment"),
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
                "{} BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY",
                self.quote_identifier(column)?
            ));
        }
        definitions.extend(column_definitions(self, table, columns)?);

        let sql = format!(
            "CREATE TABLE {} ({}) {}",
            self.quote_identifier(table)?,
            definitions.join(", "),
            TABLE_OPTIONS
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
        for definition in column_definitions(self, table, changed)? {
            clauses.push(format!("MODIFY {}", definition));
        }
        for definition in column_definitions(self, table, added)? {
            clauses.push(format!("ADD {}", definition));
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
        if data.is_empty() {
            let sql = format!("INSERT INTO {} () VALUES ()", self.quote_identifier(table)?);
            db.exec(&sql, Params::none())?;
        } else {
            let (sql, params) = insert_statement(self, table, data)?;
            db.exec(&sql, params)?;
        }

        if auto_increment.is_none() {
            return Ok(None);
        }
        let set = db.introspect("SELECT LAST_INSERT_ID()", Params::none())?;
        Ok(set.first_cell().cloned())
    }

    fn is_read_only(&self, sql: &str) -> bool {
        matches!(
            first_keyword(sql).as_str(),
            "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN"
        )
    }
}
