//! Database access layer.
//!
//! [`DatabaseAccess`] is the one place SQL reaches the connection. It owns
//! the query cache and the stack of open transaction frames, and applies
//! the cache rules to every command:
//!
//! - a command the dialect does not classify as read-only clears the whole
//!   cache before it runs;
//! - a read is cached only when the caller asks for it and the command is
//!   read-only;
//! - rolling back a frame clears the cache.
//!
//! Schema introspection goes through [`DatabaseAccess::introspect`], which
//! neither reads nor clears the cache.

use std::sync::Arc;
use std::time::Instant;

use fluidb_cache::{CacheStats, CommandDescriptor, CommandTag, QueryCache};
use fluidb_common::{FluidError, FluidResult, Params, Record, Value};
use tracing::{debug, warn};

use crate::connection::{Connection, ResultSet};
use crate::dialect::Dialect;

/// A cached read result, shaped by the read that produced it.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    /// First column of the first row.
    Cell(Value),
    /// First row.
    Row(Option<Record>),
    /// All rows.
    Rows(Vec<Record>),
    /// First column of all rows.
    Column(Vec<Value>),
}

impl QueryOutput {
    fn shape(tag: CommandTag, set: ResultSet) -> Self {
        let multi = tag.contains(CommandTag::MULTI);
        if tag.contains(CommandTag::CELL) {
            if multi {
                QueryOutput::Column(set.first_column())
            } else {
                QueryOutput::Cell(set.first_cell().cloned().unwrap_or(Value::Null))
            }
        } else if multi {
            QueryOutput::Rows(set.into_records())
        } else {
            QueryOutput::Row(set.into_records().into_iter().next())
        }
    }
}

/// An open transaction frame.
#[derive(Debug)]
struct Frame {
    depth: usize,
    started_at: Instant,
}

/// Executes commands against a connection through the query cache.
pub struct DatabaseAccess {
    /// The live connection.
    conn: Box<dyn Connection>,
    /// Grammar of the connection.
    dialect: Arc<dyn Dialect>,
    /// Read results.
    cache: QueryCache<QueryOutput>,
    /// Open transaction frames, outermost first.
    frames: Vec<Frame>,
    /// Wrap row store writes in a transaction when none is open.
    implicit_transactions: bool,
    /// Commands sent to the connection.
    commands_executed: u64,
}

impl DatabaseAccess {
    /// Creates an access layer over a connection.
    pub fn new(conn: Box<dyn Connection>, dialect: Arc<dyn Dialect>, cache_capacity: usize) -> Self {
        Self {
            conn,
            dialect,
            cache: QueryCache::new(cache_capacity),
            frames: Vec::new(),
            implicit_transactions: true,
            commands_executed: 0,
        }
    }

    /// Returns the dialect.
    pub fn dialect(&self) -> &Arc<dyn Dialect> {
        &self.dialect
    }

    /// Returns the number of commands sent to the connection.
    pub fn commands_executed(&self) -> u64 {
        self.commands_executed
    }

    /// Returns whether writes are wrapped in implicit transactions.
    pub fn implicit_transactions(&self) -> bool {
        self.implicit_transactions
    }

    /// Enables or disables implicit transactions.
    pub fn set_implicit_transactions(&mut self, enabled: bool) {
        self.implicit_transactions = enabled;
    }

    // =========================================================================
    // Cache
    // =========================================================================

    /// Returns the query cache capacity.
    pub fn cache_capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Changes the query cache capacity; 0 disables caching.
    pub fn set_cache_capacity(&mut self, capacity: usize) {
        self.cache.set_capacity(capacity);
    }

    /// Returns the number of cached results.
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }

    /// Returns query cache statistics.
    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// Drops every cached result.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Runs a command and returns the number of affected rows.
    pub fn exec(&mut self, sql: &str, params: Params) -> FluidResult<u64> {
        self.before_command(sql);
        debug!(sql, "exec");
        let affected = self.conn.execute(sql, &params)?;
        self.commands_executed += 1;
        Ok(affected)
    }

    /// Returns the first column of the first row, or NULL if there is none.
    pub fn cell(&mut self, use_cache: bool, sql: &str, params: Params) -> FluidResult<Value> {
        match self.read(CommandTag::CELL, use_cache, sql, params)? {
            QueryOutput::Cell(value) => Ok(value),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Returns the first row.
    pub fn row(&mut self, use_cache: bool, sql: &str, params: Params) -> FluidResult<Option<Record>> {
        match self.read(CommandTag::ROW, use_cache, sql, params)? {
            QueryOutput::Row(row) => Ok(row),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Returns every row.
    pub fn rows(&mut self, use_cache: bool, sql: &str, params: Params) -> FluidResult<Vec<Record>> {
        match self.read(CommandTag::ROW | CommandTag::MULTI, use_cache, sql, params)? {
            QueryOutput::Rows(rows) => Ok(rows),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Returns the first column of every row.
    pub fn col(&mut self, use_cache: bool, sql: &str, params: Params) -> FluidResult<Vec<Value>> {
        match self.read(CommandTag::CELL | CommandTag::MULTI, use_cache, sql, params)? {
            QueryOutput::Column(values) => Ok(values),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Runs a schema read. Bypasses the cache without clearing it.
    pub fn introspect(&mut self, sql: &str, params: Params) -> FluidResult<ResultSet> {
        debug!(sql, "introspect");
        let set = self.conn.query(sql, &params)?;
        self.commands_executed += 1;
        Ok(set)
    }

    /// Clears the cache ahead of a command that may write. Returns whether
    /// the command is read-only.
    fn before_command(&mut self, sql: &str) -> bool {
        let read_only = self.dialect.is_read_only(sql);
        if !read_only && !self.cache.is_empty() {
            debug!(entries = self.cache.len(), "clearing query cache before write");
            self.cache.clear();
        }
        read_only
    }

    fn read(
        &mut self,
        tag: CommandTag,
        use_cache: bool,
        sql: &str,
        params: Params,
    ) -> FluidResult<QueryOutput> {
        let read_only = self.before_command(sql);
        let cacheable = use_cache && read_only && self.cache.capacity() > 0;

        if !cacheable {
            debug!(sql, cached = false, "query");
            let set = self.conn.query(sql, &params)?;
            self.commands_executed += 1;
            return Ok(QueryOutput::shape(tag, set));
        }

        let descriptor = CommandDescriptor::new(tag, sql, params);
        if let Some(hit) = self.cache.get(&descriptor) {
            debug!(sql, cached = true, "query");
            return Ok(hit.clone());
        }

        debug!(sql, cached = false, "query");
        let set = self.conn.query(sql, descriptor.params())?;
        self.commands_executed += 1;
        let output = QueryOutput::shape(tag, set);
        self.cache.put(descriptor, output.clone());
        Ok(output)
    }

    // =========================================================================
    // Transaction Control
    // =========================================================================

    /// Returns true if a transaction frame is open.
    pub fn in_transaction(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Returns the number of open frames.
    pub fn transaction_depth(&self) -> usize {
        self.frames.len()
    }

    /// Opens a transaction frame, nested inside any open one.
    pub fn begin(&mut self) -> FluidResult<()> {
        let depth = self.frames.len();
        self.conn.begin(depth)?;
        self.frames.push(Frame {
            depth,
            started_at: Instant::now(),
        });
        debug!(depth, "transaction begin");
        Ok(())
    }

    /// Commits the innermost frame. The frame stays open if the commit fails.
    pub fn commit(&mut self) -> FluidResult<()> {
        let frame = self
            .frames
            .last()
            .ok_or_else(|| FluidError::transaction("no transaction in progress"))?;
        let depth = frame.depth;
        let elapsed = frame.started_at.elapsed();

        self.conn.commit(depth)?;
        self.frames.pop();
        debug!(depth, ?elapsed, "transaction commit");
        Ok(())
    }

    /// Rolls back the innermost frame and clears the query cache.
    pub fn rollback(&mut self) -> FluidResult<()> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| FluidError::transaction("no transaction in progress"))?;

        self.cache.clear();
        warn!(depth = frame.depth, "transaction rollback");
        self.conn.rollback(frame.depth)
    }

    /// Runs `body` in a new frame. The frame commits when `body` returns
    /// `Ok(true)` and rolls back when it returns `Ok(false)` or an error.
    /// Returns whether the frame committed.
    pub fn transaction<F>(&mut self, body: F) -> FluidResult<bool>
    where
        F: FnOnce(&mut Self) -> FluidResult<bool>,
    {
        self.begin()?;
        let outcome = body(self);
        self.finish(outcome)
    }

    /// Commits or rolls back the innermost frame according to `outcome`.
    pub(crate) fn finish(&mut self, outcome: FluidResult<bool>) -> FluidResult<bool> {
        match outcome {
            Ok(true) => match self.commit() {
                Ok(()) => Ok(true),
                Err(e) => {
                    self.rollback_after_failure();
                    Err(e)
                }
            },
            Ok(false) => {
                self.rollback()?;
                Ok(false)
            }
            Err(e) => {
                self.rollback_after_failure();
                Err(e)
            }
        }
    }

    /// Rolls back while another error is already propagating.
    pub(crate) fn rollback_after_failure(&mut self) {
        if let Err(e) = self.rollback() {
            warn!(error = %e, "rollback failed");
        }
    }
}

fn unexpected_shape(output: &QueryOutput) -> FluidError {
    FluidError::internal(format!("unexpected cached result shape: {:?}", output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::ScriptedConnection;
    use crate::connection::SqliteConnection;
    use crate::dialect::SqliteDialect;
    use fluidb_common::params;

    fn sqlite_access(capacity: usize) -> DatabaseAccess {
        let conn = SqliteConnection::open_in_memory().unwrap();
        let mut db = DatabaseAccess::new(Box::new(conn), Arc::new(SqliteDialect), capacity);
        db.exec("CREATE TABLE t (a INTEGER, b TEXT)", params![]).unwrap();
        db.exec("INSERT INTO t VALUES (1, 'x'), (2, 'y')", params![])
            .unwrap();
        db
    }

    #[test]
    fn test_read_shapes() {
        let mut db = sqlite_access(10);

        assert_eq!(
            db.cell(false, "SELECT COUNT(*) FROM t", params![]).unwrap(),
            Value::I64(2)
        );
        assert_eq!(
            db.col(false, "SELECT a FROM t ORDER BY a", params![]).unwrap(),
            vec![Value::I64(1), Value::I64(2)]
        );
        let row = db
            .row(false, "SELECT * FROM t WHERE a = ?1", params![2])
            .unwrap()
            .unwrap();
        assert_eq!(row.get("b"), Some(&Value::from("y")));
        assert_eq!(db.rows(false, "SELECT * FROM t", params![]).unwrap().len(), 2);
        assert_eq!(
            db.cell(false, "SELECT a FROM t WHERE a = 99", params![]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_cached_read_skips_connection() {
        let mut db = sqlite_access(10);
        let before = db.commands_executed();

        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();
        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();

        assert_eq!(db.commands_executed(), before + 1);
        assert_eq!(db.cached_results(), 1);
    }

    #[test]
    fn test_same_sql_different_shape_is_a_different_entry() {
        let mut db = sqlite_access(10);

        db.cell(true, "SELECT a FROM t ORDER BY a", params![]).unwrap();
        let column = db.col(true, "SELECT a FROM t ORDER BY a", params![]).unwrap();

        assert_eq!(column.len(), 2);
        assert_eq!(db.cached_results(), 2);
    }

    #[test]
    fn test_write_clears_cache() {
        let mut db = sqlite_access(10);

        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();
        db.exec("INSERT INTO t VALUES (3, 'z')", params![]).unwrap();
        assert_eq!(db.cached_results(), 0);

        assert_eq!(
            db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap(),
            Value::I64(3)
        );
    }

    #[test]
    fn test_pragma_setter_is_a_write() {
        let mut db = sqlite_access(10);

        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();
        assert_eq!(
            db.cell(true, "PRAGMA user_version", params![]).unwrap(),
            Value::I64(0)
        );
        db.exec("PRAGMA user_version(5)", params![]).unwrap();

        assert_eq!(
            db.cell(true, "PRAGMA user_version", params![]).unwrap(),
            Value::I64(5)
        );
        assert_eq!(db.cached_results(), 0);
    }

    #[test]
    fn test_introspection_keeps_cache() {
        let mut db = sqlite_access(10);

        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();
        db.introspect("PRAGMA table_info(\"t\")", params![]).unwrap();

        assert_eq!(db.cached_results(), 1);
    }

    #[test]
    fn test_uncached_read_does_not_store() {
        let mut db = sqlite_access(10);
        db.cell(false, "SELECT COUNT(*) FROM t", params![]).unwrap();
        assert_eq!(db.cached_results(), 0);
    }

    #[test]
    fn test_rollback_clears_cache_and_undoes() {
        let mut db = sqlite_access(10);

        let committed = db
            .transaction(|db| {
                db.exec("DELETE FROM t", params![])?;
                db.cell(true, "SELECT COUNT(*) FROM t", params![])?;
                Ok(false)
            })
            .unwrap();

        assert!(!committed);
        assert_eq!(db.cached_results(), 0);
        assert_eq!(
            db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap(),
            Value::I64(2)
        );
    }

    #[test]
    fn test_error_in_body_rolls_back() {
        let mut db = sqlite_access(10);

        let err = db
            .transaction(|db| {
                db.exec("DELETE FROM t", params![])?;
                db.exec("INSERT INTO missing VALUES (1)", params![])?;
                Ok(true)
            })
            .unwrap_err();

        assert_eq!(err.code(), fluidb_common::ErrorCode::Database);
        assert!(!db.in_transaction());
        assert_eq!(
            db.cell(false, "SELECT COUNT(*) FROM t", params![]).unwrap(),
            Value::I64(2)
        );
    }

    #[test]
    fn test_nested_frames() {
        let mut db = sqlite_access(10);

        db.transaction(|outer| {
            outer.exec("INSERT INTO t VALUES (3, 'z')", params![])?;
            let inner = outer.transaction(|inner| {
                assert_eq!(inner.transaction_depth(), 2);
                inner.exec("INSERT INTO t VALUES (4, 'w')", params![])?;
                Ok(false)
            })?;
            assert!(!inner);
            Ok(true)
        })
        .unwrap();

        assert_eq!(
            db.col(false, "SELECT a FROM t ORDER BY a", params![]).unwrap(),
            vec![Value::I64(1), Value::I64(2), Value::I64(3)]
        );
    }

    #[test]
    fn test_commit_without_frame() {
        let mut db = sqlite_access(10);
        assert_eq!(
            db.commit().unwrap_err().code(),
            fluidb_common::ErrorCode::Transaction
        );
        assert!(db.rollback().is_err());
    }

    #[test]
    fn test_frames_reach_connection_with_depth() {
        let conn = ScriptedConnection::new();
        let log = conn.log();
        let mut db = DatabaseAccess::new(Box::new(conn), Arc::new(SqliteDialect), 10);

        db.begin().unwrap();
        db.begin().unwrap();
        db.rollback().unwrap();
        db.commit().unwrap();

        assert_eq!(
            *log.borrow(),
            vec!["BEGIN 0", "BEGIN 1", "ROLLBACK 1", "COMMIT 0"]
        );
    }

    #[test]
    fn test_zero_capacity_disables_caching() {
        let mut db = sqlite_access(0);
        let before = db.commands_executed();

        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();
        db.cell(true, "SELECT COUNT(*) FROM t", params![]).unwrap();

        assert_eq!(db.commands_executed(), before + 2);
    }
}
