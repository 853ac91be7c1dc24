//! Schema definition and version inspection.
//!
//! # Responsibility
//! - Hold the single current schema and its version marker.
//! - Classify an opened database as empty, current or incompatible.
//!
//! # Invariants
//! - There are no incremental migrations: any version other than
//!   `SCHEMA_VERSION` is incompatible and gets reset by the opener.
//! - Schema creation and the version bump commit in one transaction.

use crate::db::DbResult;
use rusqlite::Connection;

/// Version marker written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: u32 = 2;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Returns the schema version this binary writes and expects.
pub fn latest_version() -> u32 {
    SCHEMA_VERSION
}

/// Result of inspecting an opened database before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaState {
    /// No user tables and no version marker.
    Empty,
    /// Version marker matches and the records table exists.
    Current,
    /// Anything else; carries the version found on disk.
    Incompatible { found_version: u32 },
}

pub fn inspect(conn: &Connection) -> DbResult<SchemaState> {
    let version = current_user_version(conn)?;
    let user_tables: i64 = conn.query_row(
        "SELECT COUNT(*)
         FROM sqlite_master
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%';",
        [],
        |row| row.get(0),
    )?;

    if version == 0 && user_tables == 0 {
        return Ok(SchemaState::Empty);
    }

    if version == SCHEMA_VERSION && table_exists(conn, "todo_items")? {
        return Ok(SchemaState::Current);
    }

    Ok(SchemaState::Incompatible {
        found_version: version,
    })
}

/// Creates the schema on an empty database and stamps the version marker.
pub fn apply_schema(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
    tx.commit()?;
    Ok(())
}

pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

fn table_exists(conn: &Connection, name: &str) -> DbResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1
        );",
        [name],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
