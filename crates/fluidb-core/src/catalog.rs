//! Schema catalog.
//!
//! A lazily loaded view of the live schema: table name to column ranks.
//! Generated key columns are left out. A column that is NOT NULL or has a
//! default ranks as [`Rank::Custom`], so it is never widened automatically.
//!
//! Names keep the spelling the database reports. Lookups ignore ASCII case
//! when the dialect does.

use std::collections::BTreeMap;
use std::sync::Arc;

use fluidb_common::FluidResult;
use tracing::debug;

use crate::access::DatabaseAccess;
use crate::keys::KeyResolver;
use crate::rank::Rank;

/// Column name to rank.
pub type TableSchema = BTreeMap<String, Rank>;

/// Table name to columns.
pub type Schema = BTreeMap<String, TableSchema>;

/// Cached schema of the live database.
#[derive(Debug, Default)]
pub struct SchemaCatalog {
    cached: Option<Schema>,
    loads: u64,
}

impl SchemaCatalog {
    /// Creates an empty catalog; the schema loads on first access.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the schema, loading it if needed.
    pub fn get_schema(&mut self, db: &mut DatabaseAccess, keys: &KeyResolver) -> FluidResult<&Schema> {
        if self.cached.is_none() {
            let schema = Self::load(db, keys)?;
            self.loads += 1;
            self.cached = Some(schema);
        }
        Ok(self.cached.get_or_insert_with(Schema::new))
    }

    /// Returns the columns of a table, or `None` if it does not exist.
    pub fn table(
        &mut self,
        db: &mut DatabaseAccess,
        keys: &KeyResolver,
        table: &str,
    ) -> FluidResult<Option<&TableSchema>> {
        let fold_case = db.dialect().folds_identifier_case();
        let schema = self.get_schema(db, keys)?;
        Ok(lookup(schema, table, fold_case).map(|(_, columns)| columns))
    }

    /// Returns true if the table exists.
    pub fn contains_table(
        &mut self,
        db: &mut DatabaseAccess,
        keys: &KeyResolver,
        table: &str,
    ) -> FluidResult<bool> {
        Ok(self.table(db, keys, table)?.is_some())
    }

    /// Drops the cached schema.
    pub fn invalidate(&mut self) {
        if self.cached.take().is_some() {
            debug!("schema invalidated");
        }
    }

    /// Returns true if a schema is cached.
    pub fn is_loaded(&self) -> bool {
        self.cached.is_some()
    }

    /// Returns how many times the schema has been read from the database.
    pub fn loads(&self) -> u64 {
        self.loads
    }

    fn load(db: &mut DatabaseAccess, keys: &KeyResolver) -> FluidResult<Schema> {
        let dialect = Arc::clone(db.dialect());
        let mut schema = Schema::new();

        for table in dialect.list_tables(db)? {
            let generated = keys.auto_increment_column(&table);
            let mut columns = TableSchema::new();
            for column in dialect.list_columns(db, &table)? {
                if column.auto_increment || generated == Some(column.name.as_str()) {
                    continue;
                }
                let rank = if !column.nullable || column.has_default() {
                    Rank::Custom
                } else {
                    dialect.rank_of_sql_type(&column.sql_type)
                };
                columns.insert(column.name, rank);
            }
            schema.insert(table, columns);
        }

        debug!(tables = schema.len(), "schema loaded");
        Ok(schema)
    }
}

/// Finds `name` in a table or column map. An exact match wins; otherwise,
/// with `fold_case`, the first entry equal ignoring ASCII case.
pub(crate) fn lookup<'a, V>(
    map: &'a BTreeMap<String, V>,
    name: &str,
    fold_case: bool,
) -> Option<(&'a String, &'a V)> {
    map.get_key_value(name).or_else(|| {
        if fold_case {
            map.iter().find(|(k, _)| k.eq_ignore_ascii_case(name))
        } else {
            None
        }
    })
}
