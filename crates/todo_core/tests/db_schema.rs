use rusqlite::Connection;
use todo_core::db::schema::latest_version;
use todo_core::db::{open_db, open_db_in_memory, open_db_with_outcome, OpenOutcome};

#[test]
fn open_db_in_memory_applies_schema() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "todo_items");
}

#[test]
fn opening_same_database_twice_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todo.db");

    let (conn_first, outcome) = open_db_with_outcome(&path).unwrap();
    assert_eq!(outcome, OpenOutcome::Fresh);
    insert_raw(&conn_first, "00000000-0000-4000-8000-000000000001", "kept");
    drop(conn_first);

    let (conn_second, outcome) = open_db_with_outcome(&path).unwrap();
    assert_eq!(outcome, OpenOutcome::Current);
    assert_eq!(row_count(&conn_second), 1);
}

#[test]
fn version_mismatch_discards_store_and_recreates_it_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.db");

    let conn = open_db(&path).unwrap();
    insert_raw(&conn, "00000000-0000-4000-8000-000000000002", "stale");
    conn.execute_batch("PRAGMA user_version = 1;").unwrap();
    drop(conn);

    let (conn, outcome) = open_db_with_outcome(&path).unwrap();
    assert_eq!(
        outcome,
        OpenOutcome::Reset {
            previous_version: 1
        }
    );
    assert_eq!(schema_version(&conn), latest_version());
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn newer_version_is_also_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let (conn, outcome) = open_db_with_outcome(&path).unwrap();
    assert_eq!(
        outcome,
        OpenOutcome::Reset {
            previous_version: 999
        }
    );
    assert_table_exists(&conn, "todo_items");
}

#[test]
fn unversioned_foreign_database_is_reset() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("foreign.db");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("CREATE TABLE legacy_items (name TEXT);")
        .unwrap();
    drop(conn);

    let (conn, outcome) = open_db_with_outcome(&path).unwrap();
    assert_eq!(
        outcome,
        OpenOutcome::Reset {
            previous_version: 0
        }
    );
    let legacy_exists: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE name = 'legacy_items';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(legacy_exists, 0);
}

#[test]
fn open_creates_missing_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("stores").join("todo.db");

    let conn = open_db(&path).unwrap();
    assert_table_exists(&conn, "todo_items");
    assert!(path.exists());
}

#[test]
fn schema_rejects_blank_titles_at_storage_level() {
    let conn = open_db_in_memory().unwrap();
    let result = conn.execute(
        "INSERT INTO todo_items (id, title, completed, created_at) VALUES ('x', '   ', 0, 1);",
        [],
    );
    assert!(result.is_err());
}

fn insert_raw(conn: &Connection, id: &str, title: &str) {
    conn.execute(
        "INSERT INTO todo_items (id, title, completed, created_at) VALUES (?1, ?2, 0, 1);",
        [id, title],
    )
    .unwrap();
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM todo_items;", [], |row| row.get(0))
        .unwrap()
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
