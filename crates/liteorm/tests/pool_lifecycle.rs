//! Connection accounting and disconnect refusal.

mod common;

use common::{Counter, setup};
use liteorm::{
    AdapterConfig, Changes, Filter, OrmError, SqlConnection, SqliteAdapter, StorageValue,
    create_pool,
};

#[test]
fn counter_tracks_acquire_and_release() {
    let pool = create_pool(":memory:").unwrap();
    assert_eq!(pool.active_connections(), 0);

    let first = pool.get().unwrap();
    let second = pool.get().unwrap();
    assert_eq!(pool.active_connections(), 2);

    first.release();
    assert_eq!(pool.active_connections(), 1);
    drop(second);
    assert_eq!(pool.active_connections(), 0);
}

#[test]
fn disconnect_refuses_while_persistence_is_held() {
    let (adapter, _schema) = setup(&mut []);
    let held = adapter.persistence().unwrap();

    let err = adapter.disconnect().unwrap_err();
    assert!(matches!(err, OrmError::ActiveConnections(1)));
    assert!(!adapter.pool().is_closed());

    held.release();
    adapter.disconnect().unwrap();
    assert!(adapter.pool().is_closed());
    assert!(matches!(adapter.persistence(), Err(OrmError::Pool(_))));
}

#[test]
fn query_operations_leave_nothing_acquired() {
    let mut items = vec![Counter::new("a", 1), Counter::new("b", 2)];
    let (adapter, schema) = setup(&mut items);
    let query = adapter.query(&schema);

    query.patch(&Filter::new(), &Changes::new().inc("count", 1), &["name"]).unwrap();
    query.count(&Filter::new()).unwrap();
    query.find(&Filter::new()).unwrap();
    query.delete(&Filter::new().eq("name", "a")).unwrap();
    assert_eq!(adapter.pool().active_connections(), 0);
    adapter.disconnect().unwrap();
}

#[test]
fn failed_transactions_roll_back() {
    let pool = create_pool(":memory:").unwrap();
    let conn = pool.get().unwrap();
    conn.transaction(|session| session.exec("CREATE TABLE t (x INTEGER NOT NULL)"))
        .unwrap();

    let result = conn.transaction(|session| {
        session.run("INSERT INTO t (x) VALUES (?1)", &[StorageValue::Integer(1)])?;
        session.run("INSERT INTO t (x) VALUES (NULL)", &[])
    });
    assert!(result.is_err());

    let rows = conn
        .transaction(|session| session.query_all("SELECT x FROM t", &[]))
        .unwrap();
    assert!(rows.is_empty());
    conn.release();
}

#[test]
fn file_backed_store_reopens_with_data() {
    let path = std::env::temp_dir().join(format!("liteorm-{}.db", uuid::Uuid::new_v4()));
    let schema = common::counter_schema();
    {
        let adapter = SqliteAdapter::open_with_config(
            &path,
            AdapterConfig::new().busy_timeout(std::time::Duration::from_secs(1)),
        )
        .unwrap();
        adapter.create_table(&schema).unwrap();
        let mut persistence = adapter.persistence().unwrap();
        persistence
            .insert(&schema, &mut [Counter::new("kept", 3)])
            .unwrap();
        persistence.release();
        adapter.disconnect().unwrap();
    }

    let adapter = SqliteAdapter::open(&path).unwrap();
    assert_eq!(adapter.query(&schema).count(&Filter::new()).unwrap(), 1);
    adapter.disconnect().unwrap();
    let _ = std::fs::remove_file(&path);
}
