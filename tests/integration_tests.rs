//! End-to-end tests against a live TDengine server.
//!
//! Each test provisions its own table inside the configured test database
//! and cleans up afterwards. All tests skip when no server is reachable.

mod common;

use taos_cursor::{
    BindArray, BindValue, Executed, SchemalessPrecision, SchemalessProtocol, SubscribeConfig,
    Value,
};

use common::connect_or_skip;

#[test]
fn test_connect_and_versions() {
    let Some((_, conn)) = connect_or_skip() else {
        return;
    };
    let server = conn.server_version().unwrap();
    let client = conn.client_version().unwrap();
    assert!(!server.is_empty());
    assert!(!client.is_empty());
}

#[test]
fn test_execute_and_fetch_round_trip() {
    let Some((config, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    assert_eq!(cursor.row_count(), -1);

    cursor
        .execute(&format!("create database if not exists {}", config.database))
        .unwrap();
    cursor.execute(&format!("use {}", config.database)).unwrap();
    cursor
        .execute("create table if not exists rt (ts timestamp, v int, s binary(20))")
        .unwrap();

    let executed = cursor
        .execute("insert into rt values (1700000000000, 1, 'a') (1700000001000, null, 'b')")
        .unwrap();
    assert_eq!(executed, Executed::Affected(2));
    assert_eq!(cursor.row_count(), 2);

    let executed = cursor.execute("select ts, v, s from rt order by ts").unwrap();
    assert_eq!(executed, Executed::ResultSet);
    let rows = cursor.fetch_all().unwrap().to_vec();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][0], Value::Timestamp(1_700_000_000_000));
    assert_eq!(rows[0][1], Value::Int(1));
    assert_eq!(rows[0][2], Value::VarChar("a".to_string()));
    assert!(rows[1][1].is_null());
    assert_eq!(cursor.row_count(), 2);

    // fields describe the projection
    let names: Vec<&str> = cursor.fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, ["ts", "v", "s"]);

    cursor.execute("drop table rt").unwrap();
}

#[test]
fn test_fetch_without_execute_is_operational_error() {
    let Some((_, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    let err = cursor.fetch_all().unwrap_err();
    assert!(err.is_operational());
}

#[test]
fn test_bad_sql_is_database_error() {
    let Some((_, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    let err = cursor.execute("select from nowhere at all").unwrap_err();
    assert!(err.is_database());
    assert!(err.code().is_some());
}

#[test]
fn test_closed_cursor_rejects_execute() {
    let Some((_, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    assert!(cursor.close());
    assert!(!cursor.close());
    let err = cursor.execute("select 1").unwrap_err();
    assert!(err.is_programming());
}

#[test]
fn test_async_matches_sync() {
    let Some((config, conn)) = connect_or_skip() else {
        return;
    };
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut cursor = conn.cursor();
    cursor
        .execute(&format!("create database if not exists {}", config.database))
        .unwrap();
    cursor.execute(&format!("use {}", config.database)).unwrap();
    cursor
        .execute("create table if not exists am (ts timestamp, v double)")
        .unwrap();
    cursor
        .execute("insert into am values (1700000000000, 1.5) (1700000001000, 2.5)")
        .unwrap();

    cursor.execute("select ts, v from am order by ts").unwrap();
    let sync_rows = cursor.fetch_all().unwrap().to_vec();

    let async_rows = runtime.block_on(async {
        let executed = cursor.execute_async("select ts, v from am order by ts").await?;
        assert_eq!(executed, Executed::ResultSet);
        Ok::<_, taos_cursor::TaosError>(cursor.fetch_all_async().await?.to_vec())
    });
    let async_rows = async_rows.unwrap();

    assert_eq!(sync_rows, async_rows);
    cursor.execute("drop table am").unwrap();
}

#[test]
fn test_prepared_statement_insert_and_query() {
    let Some((config, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    cursor
        .execute(&format!("create database if not exists {}", config.database))
        .unwrap();
    cursor.execute(&format!("use {}", config.database)).unwrap();
    cursor
        .execute("create table if not exists ps (ts timestamp, v int, s binary(20))")
        .unwrap();

    let mut row = BindArray::from_values(&[
        BindValue::Timestamp(1_700_000_000_000),
        BindValue::Int(7),
        BindValue::VarChar("bound".to_string()),
    ]);
    cursor
        .stmt_init()
        .unwrap()
        .prepare("insert into ps values (?, ?, ?)")
        .unwrap()
        .bind_param(&mut row)
        .unwrap()
        .add_batch()
        .unwrap()
        .execute()
        .unwrap()
        .close()
        .unwrap();

    cursor.execute("select v, s from ps").unwrap();
    let rows = cursor.fetch_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(7));
    assert_eq!(rows[0][1], Value::VarChar("bound".to_string()));

    cursor.execute("drop table ps").unwrap();
}

#[test]
fn test_schemaless_line_insert() {
    let Some((config, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    cursor
        .execute(&format!("create database if not exists {}", config.database))
        .unwrap();
    cursor.execute(&format!("use {}", config.database)).unwrap();

    let written = cursor
        .schemaless_insert(
            &["sl_meters,location=sf current=10.3,voltage=219i 1700000000000"],
            SchemalessProtocol::Line,
            SchemalessPrecision::Milliseconds,
        )
        .unwrap();
    assert_eq!(written, 1);

    cursor.execute("drop table sl_meters").unwrap();
}

#[test]
fn test_load_table_info() {
    let Some((config, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    cursor
        .execute(&format!("create database if not exists {}", config.database))
        .unwrap();
    cursor.execute(&format!("use {}", config.database)).unwrap();
    cursor
        .execute("create table if not exists lti (ts timestamp, v int)")
        .unwrap();

    cursor.load_table_info(&["lti"]).unwrap();

    cursor.execute("drop table lti").unwrap();
}

#[test]
fn test_subscription_unsubscribe_is_idempotent() {
    let Some((config, conn)) = connect_or_skip() else {
        return;
    };
    let mut cursor = conn.cursor();
    cursor
        .execute(&format!("create database if not exists {}", config.database))
        .unwrap();
    cursor.execute(&format!("use {}", config.database)).unwrap();
    cursor
        .execute("create table if not exists sub_t (ts timestamp, v int)")
        .unwrap();
    cursor
        .execute("insert into sub_t values (1700000000000, 1)")
        .unwrap();

    let mut sub = cursor
        .subscribe(&SubscribeConfig {
            topic: "it_sub_topic".to_string(),
            sql: "select ts, v from sub_t".to_string(),
            restart: true,
            poll_interval_ms: 0,
            keep_progress: false,
        })
        .unwrap();
    assert!(sub.is_open());

    let batch = sub.consume().unwrap();
    assert_eq!(batch.fields.len(), 2);
    assert_eq!(batch.rows.len(), 1);

    sub.unsubscribe();
    assert!(!sub.is_open());
    sub.unsubscribe();
    let err = sub.consume().unwrap_err();
    assert!(err.is_operational());

    cursor.execute("drop table sub_t").unwrap();
}
