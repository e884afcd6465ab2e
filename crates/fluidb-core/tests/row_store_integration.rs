//! Integration tests for the row store on an in-memory SQLite database.

use chrono::NaiveDate;
use fluidb_common::{params, ErrorCode, Params, Record, StoreConfig, Value};
use fluidb_core::{CompoundKey, Key, Rank, RowStore, SqliteConnection};
use rust_decimal::Decimal;
use uuid::Uuid;

fn open(config: &StoreConfig) -> RowStore {
    let conn = SqliteConnection::open_in_memory().expect("open sqlite");
    RowStore::new(Box::new(conn), config).expect("build store")
}

fn frozen() -> RowStore {
    open(&StoreConfig::default())
}

fn fluid() -> RowStore {
    open(&StoreConfig::builder().fluid(true).build())
}

fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn count(store: &mut RowStore, sql: &str) -> i64 {
    store
        .access()
        .cell(false, sql, Params::none())
        .expect("count query")
        .as_i64()
        .expect("integer count")
}

/// A manual single-column key: storing twice updates the same row.
#[test]
fn test_manual_key_updates_in_place() {
    let mut store = frozen();
    store
        .access()
        .exec("CREATE TABLE foo (pk, prop)", params![])
        .unwrap();
    store.key_with("foo", &["pk"], false).unwrap();

    let mut row = record(&[("pk", Value::from("pk1")), ("prop", Value::from("a"))]);
    let first = store.store("foo", &mut row, None).unwrap();

    row.insert("prop".to_string(), Value::from("b"));
    let second = store.store("foo", &mut row, None).unwrap();

    assert_eq!(first, Key::from("pk1"));
    assert_eq!(second, Key::from("pk1"));
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM foo"), 1);
    let loaded = store.load("foo", &first).unwrap().unwrap();
    assert_eq!(loaded.get("prop"), Some(&Value::from("b")));
}

/// A compound key survives an update and addresses the row on load.
#[test]
fn test_compound_key_round_trip() {
    let mut store = fluid();
    store.key("foo", &["pk1", "pk2", "pk3"]).unwrap();

    let mut row = record(&[
        ("pk1", Value::from("a")),
        ("pk2", Value::from("b")),
        ("pk3", Value::from("c")),
        ("prop", Value::from("value1")),
    ]);
    let first = store.store("foo", &mut row, None).unwrap();

    row.insert("prop".to_string(), Value::from("value2"));
    let second = store.store("foo", &mut row, None).unwrap();
    assert_eq!(first, second);

    let key = Key::Compound(
        CompoundKey::new([("pk1", "a"), ("pk2", "b"), ("pk3", "c")]).unwrap(),
    );
    assert_eq!(first, key);
    let loaded = store.load("foo", &key).unwrap().unwrap();
    assert_eq!(loaded.get("prop"), Some(&Value::from("value2")));
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM foo"), 1);
}

/// Booleans, integers and numeric text land as comparable integers, and
/// empty text is stored as NULL.
#[test]
fn test_truthiness_of_stored_values() {
    let mut store = fluid();

    for value in [
        Value::Bool(true),
        Value::I32(1),
        Value::from("1"),
        Value::Bool(false),
        Value::I64(0),
        Value::from("0"),
        Value::Null,
        Value::from(""),
    ] {
        let mut row = record(&[("x", value)]);
        store.store("t", &mut row, None).unwrap();
    }

    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM t WHERE x"), 3);
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM t WHERE NOT x"), 3);
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM t WHERE x IS NULL"), 2);
}

/// A column widened to text is never narrowed back.
#[test]
fn test_widening_is_monotonic() {
    let mut store = fluid();

    let mut row = record(&[("n", Value::I64(1))]);
    let key = store.store("t", &mut row, None).unwrap();
    assert_eq!(store.schema().unwrap()["t"]["n"], Rank::Tier(0));

    row.insert("n".to_string(), Value::from("many"));
    store.store("t", &mut row, None).unwrap();
    assert_eq!(store.schema().unwrap()["t"]["n"], Rank::Tier(2));

    row.insert("n".to_string(), Value::I64(5));
    store.store("t", &mut row, None).unwrap();
    assert_eq!(store.schema().unwrap()["t"]["n"], Rank::Tier(2));

    let loaded = store.load("t", &key).unwrap().unwrap();
    assert_eq!(loaded.get("n"), Some(&Value::from("5")));
}

/// Rebuilding a SQLite table keeps rows and the declarations of the
/// columns it does not widen.
#[test]
fn test_rebuild_keeps_rows_and_constraints() {
    let mut store = fluid();
    store
        .access()
        .exec(
            "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, n INTEGER, \
             tag TEXT NOT NULL DEFAULT 'x')",
            params![],
        )
        .unwrap();
    store.invalidate_schema();

    let mut first = record(&[("n", Value::I64(1)), ("tag", Value::from("a"))]);
    let first_key = store.store("t", &mut first, None).unwrap();
    let mut second = record(&[("n", Value::from("word"))]);
    let second_key = store.store("t", &mut second, None).unwrap();

    let loaded = store.load("t", &first_key).unwrap().unwrap();
    assert_eq!(loaded.get("n"), Some(&Value::from("1")));
    assert_eq!(loaded.get("tag"), Some(&Value::from("a")));
    let loaded = store.load("t", &second_key).unwrap().unwrap();
    assert_eq!(loaded.get("tag"), Some(&Value::from("x")));

    let columns = store
        .access()
        .rows(false, "PRAGMA table_info(t)", params![])
        .unwrap();
    let tag = columns
        .iter()
        .find(|c| c.get("name") == Some(&Value::from("tag")))
        .unwrap();
    assert_eq!(tag.get("notnull"), Some(&Value::I64(1)));
    assert_eq!(tag.get("dflt_value"), Some(&Value::from("'x'")));
    assert_eq!(store.schema().unwrap()["t"]["tag"], Rank::Custom);

    let mut third = record(&[("n", Value::I64(3))]);
    assert_eq!(store.store("t", &mut third, None).unwrap(), Key::from(3));
}

/// Field names that differ from a column only in case reuse the column.
#[test]
fn test_fluid_columns_match_ignoring_case() {
    let mut store = fluid();

    let mut first = record(&[("Title", Value::from("x")), ("N", Value::I64(1))]);
    store.store("book", &mut first, None).unwrap();
    let mut second = record(&[("title", Value::from("y")), ("n", Value::from("word"))]);
    let key = store.store("book", &mut second, None).unwrap();

    let columns = store.schema().unwrap()["book"].clone();
    assert_eq!(columns.len(), 2);
    assert_eq!(columns["Title"], Rank::Tier(2));
    assert_eq!(columns["N"], Rank::Tier(2));

    let loaded = store.load("book", &key).unwrap().unwrap();
    assert_eq!(loaded.get("Title"), Some(&Value::from("y")));
    assert_eq!(loaded.get("N"), Some(&Value::from("word")));
}

/// A table name that differs only in case addresses the existing table.
#[test]
fn test_fluid_tables_match_ignoring_case() {
    let mut store = fluid();

    let mut first = record(&[("title", Value::from("Dune"))]);
    store.store("Book", &mut first, None).unwrap();
    let mut second = record(&[("title", Value::from("Emma"))]);
    let key = store.store("book", &mut second, None).unwrap();

    assert_eq!(store.schema().unwrap().len(), 1);
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM Book"), 2);
    let loaded = store.load("BOOK", &key).unwrap().unwrap();
    assert_eq!(loaded.get("title"), Some(&Value::from("Emma")));
}

/// Values come back in the form they were stored in.
#[test]
fn test_round_trip_forms() {
    let at = NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap();
    let cases = [
        (Value::I32(5), Value::I64(5)),
        (Value::U8(5), Value::I64(5)),
        (Value::Bool(true), Value::I64(1)),
        (Value::F64(2.5), Value::F64(2.5)),
        (Value::F64(3.0), Value::I64(3)),
        (Value::Decimal(Decimal::new(125, 2)), Value::F64(1.25)),
        (Value::from("  hi "), Value::from("hi")),
        (Value::from("007"), Value::from("007")),
        (Value::from("42"), Value::I64(42)),
        (Value::DateTime(at), Value::from("2024-03-01 12:30:00")),
        (
            Value::Guid(Uuid::nil()),
            Value::from("00000000-0000-0000-0000-000000000000"),
        ),
        (Value::Bytes(vec![1, 2]), Value::Bytes(vec![1, 2])),
    ];

    let mut store = fluid();
    for (i, (input, expected)) in cases.into_iter().enumerate() {
        let table = format!("rt{}", i);
        let mut row = record(&[("col", input.clone())]);
        let key = store.store(&table, &mut row, None).unwrap();
        let loaded = store.load(&table, &key).unwrap().unwrap();
        assert_eq!(loaded.get("col"), Some(&expected), "input {:?}", input);
    }

    let mut row = record(&[("a", Value::from("x")), ("col", Value::Null)]);
    let key = store.store("rt_null", &mut row, None).unwrap();
    let loaded = store.load("rt_null", &key).unwrap().unwrap();
    assert!(loaded.get("col").map_or(true, Value::is_null));
}

/// Relaxations can be switched off per store.
#[test]
fn test_relaxations_off() {
    let config = StoreConfig::builder()
        .fluid(true)
        .trim_strings(false)
        .empty_string_to_null(false)
        .recognize_integers(false)
        .build();
    let mut store = open(&config);

    let mut row = record(&[("a", Value::from(" 42 ")), ("b", Value::from(""))]);
    let key = store.store("t", &mut row, None).unwrap();
    let loaded = store.load("t", &key).unwrap().unwrap();

    assert_eq!(loaded.get("a"), Some(&Value::from(" 42 ")));
    assert_eq!(loaded.get("b"), Some(&Value::from("")));
}

/// Outside fluid mode the schema is never touched, so mismatches come
/// from the database.
#[test]
fn test_frozen_mode_surfaces_native_errors() {
    let mut store = frozen();
    store
        .access()
        .exec("CREATE TABLE book (id INTEGER PRIMARY KEY, title TEXT)", params![])
        .unwrap();

    let mut row = record(&[("title", Value::from("Dune")), ("pages", Value::I64(412))]);
    let err = store.store("book", &mut row, None).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Database);
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM book"), 0);

    assert_eq!(
        store.load("ghost", &Key::from(1)).unwrap_err().code(),
        ErrorCode::Database
    );
    assert_eq!(
        store.trash("ghost", &Key::from(1)).unwrap_err().code(),
        ErrorCode::Database
    );
}

/// Only dirty fields are written on update.
#[test]
fn test_dirty_fields_restrict_update() {
    let mut store = fluid();
    let mut row = record(&[("a", Value::from("old")), ("b", Value::from("kept"))]);
    let key = store.store("t", &mut row, None).unwrap();

    row.insert("a".to_string(), Value::from("new"));
    row.insert("b".to_string(), Value::from("ignored"));
    store.store("t", &mut row, Some(&["a"])).unwrap();

    let loaded = store.load("t", &key).unwrap().unwrap();
    assert_eq!(loaded.get("a"), Some(&Value::from("new")));
    assert_eq!(loaded.get("b"), Some(&Value::from("kept")));
}

/// A rolled back transaction leaves cached reads showing the old row.
#[test]
fn test_rollback_restores_cached_reads() {
    let mut store = fluid();
    let mut row = record(&[("title", Value::from("before"))]);
    let key = store.store("book", &mut row, None).unwrap();
    store.load("book", &key).unwrap();

    let committed = store
        .transaction(|store| {
            let mut changed = record(&[("id", Value::I64(1)), ("title", Value::from("after"))]);
            store.store("book", &mut changed, None)?;
            let inside = store.load("book", &Key::from(1))?.unwrap();
            assert_eq!(inside.get("title"), Some(&Value::from("after")));
            Ok(false)
        })
        .unwrap();
    assert!(!committed);

    let loaded = store.load("book", &key).unwrap().unwrap();
    assert_eq!(loaded.get("title"), Some(&Value::from("before")));
}

/// An error escaping the body rolls back, including fluid DDL.
#[test]
fn test_failed_body_rolls_back_ddl() {
    let mut store = fluid();

    let err = store
        .transaction(|store| {
            let mut row = record(&[("title", Value::from("Dune"))]);
            store.store("book", &mut row, None)?;
            store.trash("book", &Key::Simple(Value::from("x")))?;
            Err(fluidb_common::FluidError::internal("boom"))
        })
        .unwrap_err();

    assert_eq!(err.code(), ErrorCode::Internal);
    assert!(!store.schema().unwrap().contains_key("book"));
}

/// Inner frames roll back on their own.
#[test]
fn test_nested_transactions() {
    let mut store = fluid();

    store
        .transaction(|outer| {
            let mut a = record(&[("name", Value::from("kept"))]);
            outer.store("t", &mut a, None)?;

            let inner = outer.transaction(|inner| {
                let mut b = record(&[("name", Value::from("dropped"))]);
                inner.store("t", &mut b, None)?;
                Ok(false)
            })?;
            assert!(!inner);
            Ok(true)
        })
        .unwrap();

    let names = store
        .access()
        .col(false, "SELECT name FROM t", params![])
        .unwrap();
    assert_eq!(names, vec![Value::from("kept")]);
}

/// Schema reads neither use nor evict the query cache.
#[test]
fn test_schema_read_keeps_cache() {
    let mut store = fluid();
    let mut row = record(&[("title", Value::from("Dune"))]);
    let key = store.store("book", &mut row, None).unwrap();
    store.load("book", &key).unwrap();
    assert_eq!(store.access().cached_results(), 1);

    store.invalidate_schema();
    store.schema().unwrap();
    assert_eq!(store.access().cached_results(), 1);

    let before = store.access().commands_executed();
    store.load("book", &key).unwrap();
    assert_eq!(store.access().commands_executed(), before);
}

/// Implicit transactions can be turned off.
#[test]
fn test_without_implicit_transactions() {
    let config = StoreConfig::builder()
        .fluid(true)
        .implicit_transactions(false)
        .build();
    let mut store = open(&config);

    let mut row = record(&[("a", Value::from("x"))]);
    store.store("t", &mut row, None).unwrap();
    assert!(!store.access().in_transaction());
    assert_eq!(count(&mut store, "SELECT COUNT(*) FROM t"), 1);
}

/// Rows persist in a database file across connections.
#[test]
fn test_file_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fluid.db");
    let config = StoreConfig::builder().fluid(true).build();

    let key = {
        let conn = SqliteConnection::open(&path).unwrap();
        let mut store = RowStore::new(Box::new(conn), &config).unwrap();
        let mut row = record(&[("title", Value::from("Dune"))]);
        store.store("book", &mut row, None).unwrap()
    };

    let conn = SqliteConnection::open(&path).unwrap();
    let mut store = RowStore::new(Box::new(conn), &config).unwrap();
    let loaded = store.load("book", &key).unwrap().unwrap();
    assert_eq!(loaded.get("title"), Some(&Value::from("Dune")));
}

/// Configuration can come from TOML.
#[test]
fn test_store_from_toml_config() {
    let config = StoreConfig::from_toml("fluid = true\ncache_capacity = 0\n").unwrap();
    let mut store = open(&config);

    assert!(store.is_fluid());
    assert_eq!(store.access().cache_capacity(), 0);
}
