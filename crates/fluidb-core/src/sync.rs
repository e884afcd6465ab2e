//! Schema synchronization for fluid mode.
//!
//! Compares the ranks a record induces with the catalog and creates the
//! table, adds columns or widens them. Widening is monotonic and only
//! applies to columns below [`Rank::STATIC_BASE`]; static and custom
//! columns are never changed. Field names are matched against existing
//! columns the way the dialect matches identifiers, and DDL for an existing
//! column uses its existing spelling.

use std::sync::Arc;

use fluidb_common::{FluidError, FluidResult, Record};
use tracing::info;

use crate::access::DatabaseAccess;
use crate::catalog::{lookup, SchemaCatalog, TableSchema};
use crate::dialect::Dialect;
use crate::keys::KeyResolver;
use crate::rank::Rank;

/// DDL needed to make a table hold a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaChange {
    /// The table does not exist.
    Create {
        /// Columns to create.
        columns: TableSchema,
    },
    /// The table exists but lacks or under-sizes columns.
    Alter {
        /// Current columns.
        old: TableSchema,
        /// Columns to widen, with their new rank.
        changed: TableSchema,
        /// Columns to add.
        added: TableSchema,
    },
}

/// Ranks every non-null field of a record.
pub fn induced_ranks(dialect: &dyn Dialect, data: &Record) -> FluidResult<TableSchema> {
    let mut ranks = TableSchema::new();
    for (name, value) in data {
        let rank = dialect.rank_of_value(value)?;
        if rank != Rank::Null {
            ranks.insert(name.clone(), rank);
        }
    }
    Ok(ranks)
}

/// Plans the DDL for a table given its current columns, or `None` if the
/// table is missing. With `fold_case`, names differing only in ASCII case
/// are the same column.
pub fn plan_change(
    table: &str,
    existing: Option<&TableSchema>,
    induced: &TableSchema,
    fold_case: bool,
) -> FluidResult<Option<SchemaChange>> {
    let Some(existing) = existing else {
        let mut columns = TableSchema::new();
        for (name, &rank) in induced {
            merge_rank(&mut columns, name, rank, fold_case);
        }
        check_generatable(table, &columns)?;
        return Ok(Some(SchemaChange::Create { columns }));
    };

    let mut changed = TableSchema::new();
    let mut added = TableSchema::new();
    for (name, &rank) in induced {
        match lookup(existing, name, fold_case) {
            None => merge_rank(&mut added, name, rank, fold_case),
            Some((column, &current)) => {
                if rank > current && rank < Rank::STATIC_BASE && current < Rank::STATIC_BASE {
                    merge_rank(&mut changed, column, rank, fold_case);
                }
            }
        }
    }
    check_generatable(table, &added)?;

    if changed.is_empty() && added.is_empty() {
        return Ok(None);
    }
    Ok(Some(SchemaChange::Alter {
        old: existing.clone(),
        changed,
        added,
    }))
}

/// Adds a column, or raises the rank of one already planned under another
/// spelling.
fn merge_rank(columns: &mut TableSchema, name: &str, rank: Rank, fold_case: bool) {
    let planned = lookup(columns, name, fold_case).map(|(column, _)| column.clone());
    match planned {
        Some(column) => {
            if let Some(current) = columns.get_mut(&column) {
                *current = (*current).max(rank);
            }
        }
        None => {
            columns.insert(name.to_string(), rank);
        }
    }
}

fn check_generatable(table: &str, columns: &TableSchema) -> FluidResult<()> {
    match columns.iter().find(|(_, rank)| rank.is_custom()) {
        Some((column, _)) => Err(FluidError::UnsupportedColumnType {
            table: table.to_string(),
            column: column.clone(),
        }),
        None => Ok(()),
    }
}

/// Brings the table's schema up to what `data` needs. Returns true if any
/// DDL ran.
pub fn synchronize(
    db: &mut DatabaseAccess,
    catalog: &mut SchemaCatalog,
    keys: &KeyResolver,
    table: &str,
    data: &Record,
) -> FluidResult<bool> {
    let dialect = Arc::clone(db.dialect());
    let induced = induced_ranks(dialect.as_ref(), data)?;
    let existing = catalog.table(db, keys, table)?.cloned();

    let fold_case = dialect.folds_identifier_case();
    let Some(change) = plan_change(table, existing.as_ref(), &induced, fold_case)? else {
        return Ok(false);
    };

    let generated = keys.auto_increment_column(table);
    match &change {
        SchemaChange::Create { columns } => {
            info!(
                table,
                columns = ?columns.keys().collect::<Vec<_>>(),
                "creating table"
            );
            dialect.create_table(db, table, generated, columns)?;
        }
        SchemaChange::Alter { old, changed, added } => {
            info!(
                table,
                changed = ?changed.keys().collect::<Vec<_>>(),
                added = ?added.keys().collect::<Vec<_>>(),
                "altering table"
            );
            dialect.alter_schema(db, table, generated, old, changed, added)?;
        }
    }
    catalog.invalidate();
    Ok(true)
}
