//! Row store.
//!
//! [`RowStore`] stores, loads and deletes records by key. It normalizes
//! values, decides between insert and update, and, in fluid mode, grows
//! the schema so the record fits before writing it.

use std::sync::Arc;

use fluidb_common::{FluidError, FluidResult, Params, Record, StoreConfig, Value};
use tracing::debug;

use crate::access::DatabaseAccess;
use crate::catalog::{lookup, Schema, SchemaCatalog};
use crate::connection::Connection;
use crate::dialect::{Dialect, DialectFactory};
use crate::keys::{Key, KeyResolver};
use crate::normalize::{normalize_record, normalize_value, ValueRelaxations};
use crate::sync;

/// A schema-adaptive row store over one connection.
///
/// # Example
///
/// ```
/// use fluidb_common::{Record, StoreConfig, Value};
/// use fluidb_core::{RowStore, SqliteConnection};
///
/// let conn = SqliteConnection::open_in_memory().unwrap();
/// let mut store = RowStore::new(Box::new(conn), &StoreConfig::default()).unwrap();
/// store.enter_fluid_mode();
///
/// let mut book = Record::new();
/// book.insert("title".to_string(), Value::from("Dune"));
/// let key = store.store("book", &mut book, None).unwrap();
///
/// let loaded = store.load("book", &key).unwrap().unwrap();
/// assert_eq!(loaded.get("title"), Some(&Value::from("Dune")));
/// ```
pub struct RowStore {
    access: DatabaseAccess,
    dialect: Arc<dyn Dialect>,
    catalog: SchemaCatalog,
    keys: KeyResolver,
    relaxations: ValueRelaxations,
    fluid: bool,
}

impl RowStore {
    /// Creates a store speaking the configured dialect.
    pub fn new(conn: Box<dyn Connection>, config: &StoreConfig) -> FluidResult<Self> {
        Self::with_dialect(conn, config.dialect.adapter(), config)
    }

    /// Creates a store with an explicit dialect adapter.
    pub fn with_dialect(
        conn: Box<dyn Connection>,
        dialect: Arc<dyn Dialect>,
        config: &StoreConfig,
    ) -> FluidResult<Self> {
        config.validate()?;

        let mut access = DatabaseAccess::new(conn, Arc::clone(&dialect), config.cache_capacity);
        access.set_implicit_transactions(config.implicit_transactions);

        Ok(Self {
            access,
            dialect,
            catalog: SchemaCatalog::new(),
            keys: KeyResolver::new(config.default_key.clone()),
            relaxations: ValueRelaxations::from(config),
            fluid: config.fluid,
        })
    }

    /// Returns the access layer, for raw commands.
    pub fn access(&mut self) -> &mut DatabaseAccess {
        &mut self.access
    }

    /// Returns the dialect.
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    /// Returns the key policies.
    pub fn keys(&self) -> &KeyResolver {
        &self.keys
    }

    /// Registers the key columns of a table. A single column is generated
    /// by the database; several columns form a compound key.
    pub fn key(&mut self, table: &str, names: &[&str]) -> FluidResult<()> {
        self.keys.register(table, names, None)
    }

    /// Registers the key columns of a table with an explicit generation
    /// policy.
    pub fn key_with(&mut self, table: &str, names: &[&str], auto_increment: bool) -> FluidResult<()> {
        self.keys.register(table, names, Some(auto_increment))
    }

    /// Switches to fluid mode for the rest of the store's life.
    pub fn enter_fluid_mode(&mut self) {
        if !self.fluid {
            debug!("entering fluid mode");
        }
        self.fluid = true;
    }

    /// Returns true in fluid mode.
    pub fn is_fluid(&self) -> bool {
        self.fluid
    }

    /// Returns the value relaxations.
    pub fn relaxations(&self) -> ValueRelaxations {
        self.relaxations
    }

    /// Enables or disables trimming of text values.
    pub fn set_trim_strings(&mut self, enabled: bool) {
        self.relaxations.trim_strings = enabled;
    }

    /// Enables or disables storing empty text as NULL.
    pub fn set_empty_string_to_null(&mut self, enabled: bool) {
        self.relaxations.empty_string_to_null = enabled;
    }

    /// Enables or disables integer recognition.
    pub fn set_recognize_integers(&mut self, enabled: bool) {
        self.relaxations.recognize_integers = enabled;
    }

    /// Returns the live schema.
    pub fn schema(&mut self) -> FluidResult<&Schema> {
        self.catalog.get_schema(&mut self.access, &self.keys)
    }

    /// Drops the cached schema, after DDL issued through [`Self::access`].
    pub fn invalidate_schema(&mut self) {
        self.catalog.invalidate();
    }

    // =========================================================================
    // Rows
    // =========================================================================

    /// Writes a record and returns its key.
    ///
    /// With `dirty`, only the named fields (plus key columns) are written.
    /// A generated key is written back into `record`.
    pub fn store(&mut self, table: &str, record: &mut Record, dirty: Option<&[&str]>) -> FluidResult<Key> {
        self.keys.mark_used(table);
        self.write_scope(|store| store.store_row(table, record, dirty))
    }

    /// Reads a row by key. Returns `None` if there is no such row, or, in
    /// fluid mode, no such table.
    pub fn load(&mut self, table: &str, key: &Key) -> FluidResult<Option<Record>> {
        self.keys.mark_used(table);
        if matches!(key, Key::Simple(Value::Null)) {
            return Ok(None);
        }
        if self.fluid && !self.table_exists(table)? {
            return Ok(None);
        }

        let (clause, values) = self.key_condition(table, key, 0)?;
        let sql = format!(
            "SELECT * FROM {} WHERE {}",
            self.dialect.quote_identifier(table)?,
            clause
        );
        self.access.row(true, &sql, Params::Positional(values))
    }

    /// Deletes a row by key. Deleting a missing row, or in fluid mode a
    /// row of a missing table, does nothing.
    pub fn trash(&mut self, table: &str, key: &Key) -> FluidResult<()> {
        self.keys.mark_used(table);
        if matches!(key, Key::Simple(Value::Null)) {
            return Ok(());
        }
        if self.fluid && !self.table_exists(table)? {
            return Ok(());
        }

        self.write_scope(|store| {
            let (clause, values) = store.key_condition(table, key, 0)?;
            let sql = format!(
                "DELETE FROM {} WHERE {}",
                store.dialect.quote_identifier(table)?,
                clause
            );
            store.access.exec(&sql, Params::Positional(values))?;
            Ok(())
        })
    }

    fn store_row(&mut self, table: &str, record: &mut Record, dirty: Option<&[&str]>) -> FluidResult<Key> {
        let mut data = normalize_record(self.dialect.as_ref(), &self.relaxations, record)?;
        let key = self.keys.key_of(table, &data)?;
        let auto_increment = self.keys.is_auto_increment(table);

        let existing = match key {
            None if auto_increment => None,
            None => {
                return Err(FluidError::MissingKeyValue {
                    table: table.to_string(),
                })
            }
            Some(key) if auto_increment => Some(key),
            Some(key) => {
                if self.row_exists(table, &key)? {
                    Some(key)
                } else {
                    return self.insert_row(table, record, data, dirty, Some(key));
                }
            }
        };

        match existing {
            None => self.insert_row(table, record, data, dirty, None),
            Some(key) => {
                restrict_to_dirty(&mut data, dirty, self.keys.key_names(table));
                for name in self.keys.key_names(table) {
                    data.remove(name);
                }
                self.update_row(table, data, key)
            }
        }
    }

    fn insert_row(
        &mut self,
        table: &str,
        record: &mut Record,
        mut data: Record,
        dirty: Option<&[&str]>,
        key: Option<Key>,
    ) -> FluidResult<Key> {
        restrict_to_dirty(&mut data, dirty, self.keys.key_names(table));
        if key.is_none() {
            for name in self.keys.key_names(table) {
                data.remove(name);
            }
        }
        if self.fluid {
            self.fit_schema(table, &mut data)?;
        }

        let generated_column = self.keys.auto_increment_column(table);
        let generated = self
            .dialect
            .insert(&mut self.access, table, generated_column, &data)?;

        let key = match (key, generated) {
            (Some(key), _) => key,
            (None, Some(value)) => Key::Simple(value),
            (None, None) => {
                return Err(FluidError::internal(format!(
                    "insert into '{}' returned no generated key",
                    table
                )))
            }
        };
        self.keys.set_key(table, record, &key)?;
        debug!(table, %key, "row inserted");
        Ok(key)
    }

    fn update_row(&mut self, table: &str, mut data: Record, key: Key) -> FluidResult<Key> {
        if self.fluid {
            self.fit_schema(table, &mut data)?;
        }
        if data.is_empty() {
            return Ok(key);
        }

        let mut assignments = Vec::with_capacity(data.len());
        let mut values = Vec::with_capacity(data.len());
        for (i, (name, value)) in data.into_iter().enumerate() {
            assignments.push(format!(
                "{} = {}",
                self.dialect.quote_identifier(&name)?,
                self.dialect.param_placeholder(i)
            ));
            values.push(value);
        }
        let (clause, key_values) = self.key_condition(table, &key, values.len())?;
        values.extend(key_values);

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.dialect.quote_identifier(table)?,
            assignments.join(", "),
            clause
        );
        if self.access.exec(&sql, Params::Positional(values))? == 0 {
            return Err(FluidError::RowNotFound {
                table: table.to_string(),
            });
        }
        debug!(table, %key, "row updated");
        Ok(key)
    }

    /// Grows the schema for `data`, then drops null fields that have no
    /// column.
    fn fit_schema(&mut self, table: &str, data: &mut Record) -> FluidResult<()> {
        sync::synchronize(&mut self.access, &mut self.catalog, &self.keys, table, data)?;
        let fold_case = self.dialect.folds_identifier_case();
        let columns = self.catalog.table(&mut self.access, &self.keys, table)?;
        data.retain(|name, value| {
            !value.is_null() || columns.is_some_and(|c| lookup(c, name, fold_case).is_some())
        });
        Ok(())
    }

    fn table_exists(&mut self, table: &str) -> FluidResult<bool> {
        self.catalog.contains_table(&mut self.access, &self.keys, table)
    }

    fn row_exists(&mut self, table: &str, key: &Key) -> FluidResult<bool> {
        if self.fluid && !self.table_exists(table)? {
            return Ok(false);
        }
        let (clause, values) = self.key_condition(table, key, 0)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.dialect.quote_identifier(table)?,
            clause
        );
        let count = self.access.cell(false, &sql, Params::Positional(values))?;
        Ok(count.as_i64().unwrap_or(0) > 0)
    }

    /// Builds `k1 = p AND k2 = p` for a key, numbering placeholders from
    /// `first_param`.
    fn key_condition(&self, table: &str, key: &Key, first_param: usize) -> FluidResult<(String, Vec<Value>)> {
        let columns = self.keys.key_columns(table, key)?;
        let mut terms = Vec::with_capacity(columns.len());
        let mut values = Vec::with_capacity(columns.len());
        for (i, (name, value)) in columns.into_iter().enumerate() {
            terms.push(format!(
                "{} = {}",
                self.dialect.quote_identifier(&name)?,
                self.dialect.param_placeholder(first_param + i)
            ));
            values.push(normalize_value(self.dialect.as_ref(), &self.relaxations, value)?);
        }
        Ok((terms.join(" AND "), values))
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Runs `body` in a transaction frame; see [`DatabaseAccess::transaction`].
    /// Rolling back also drops the cached schema, since DDL may be undone.
    pub fn transaction<F>(&mut self, body: F) -> FluidResult<bool>
    where
        F: FnOnce(&mut RowStore) -> FluidResult<bool>,
    {
        self.access.begin()?;
        let outcome = body(self);
        let committed = matches!(outcome, Ok(true));
        let result = self.access.finish(outcome);
        if !committed || result.is_err() {
            self.catalog.invalidate();
        }
        result
    }

    /// Runs a write inside a transaction unless one is open or implicit
    /// transactions are off.
    fn write_scope<T, F>(&mut self, op: F) -> FluidResult<T>
    where
        F: FnOnce(&mut Self) -> FluidResult<T>,
    {
        if !self.access.implicit_transactions() || self.access.in_transaction() {
            return op(self);
        }

        self.access.begin()?;
        match op(self) {
            Ok(value) => match self.access.commit() {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.catalog.invalidate();
                    self.access.rollback_after_failure();
                    Err(e)
                }
            },
            Err(e) => {
                self.catalog.invalidate();
                self.access.rollback_after_failure();
                Err(e)
            }
        }
    }
}

/// Keeps only dirty fields and key columns.
fn restrict_to_dirty(data: &mut Record, dirty: Option<&[&str]>, key_names: &[String]) {
    if let Some(dirty) = dirty {
        data.retain(|name, _| dirty.contains(&name.as_str()) || key_names.contains(name));
    }
}
