//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Reset incompatible store files before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections carry the current schema version.

use super::schema::{apply_schema, inspect, SchemaState};
use super::{DbError, DbResult};
use log::{error, info, warn};
use rusqlite::Connection;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How the store file looked when it was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new, empty store was initialized.
    Fresh,
    /// An existing store with the current schema was reused.
    Current,
    /// An incompatible store was discarded and recreated empty.
    Reset { previous_version: u32 },
}

/// Opens a SQLite database file, resetting it if its schema is incompatible.
///
/// # Side effects
/// - May delete the existing store file and its `-wal`/`-shm` siblings.
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    open_db_with_outcome(path).map(|(conn, _)| conn)
}

/// Same as [`open_db`], also reporting whether the store was reset.
pub fn open_db_with_outcome(path: impl AsRef<Path>) -> DbResult<(Connection, OpenOutcome)> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=file");

    match open_file(path) {
        Ok((conn, outcome)) => {
            info!(
                "event=db_open module=db status=ok mode=file outcome={} duration_ms={}",
                outcome_label(outcome),
                started_at.elapsed().as_millis()
            );
            Ok((conn, outcome))
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=file duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Opens an in-memory SQLite database with the current schema applied.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=memory");

    let result = Connection::open_in_memory()
        .map_err(DbError::from)
        .and_then(|mut conn| {
            configure_connection(&conn, false)?;
            apply_schema(&mut conn)?;
            Ok(conn)
        });

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode=memory duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode=memory duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn open_file(path: &Path) -> DbResult<(Connection, OpenOutcome)> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut conn = Connection::open(path)?;
    configure_connection(&conn, true)?;

    match inspect(&conn)? {
        SchemaState::Current => Ok((conn, OpenOutcome::Current)),
        SchemaState::Empty => {
            apply_schema(&mut conn)?;
            Ok((conn, OpenOutcome::Fresh))
        }
        SchemaState::Incompatible { found_version } => {
            warn!(
                "event=db_reset module=db status=start found_version={} expected_version={}",
                found_version,
                super::schema::SCHEMA_VERSION
            );
            drop(conn);
            remove_store_files(path)?;

            let mut conn = Connection::open(path)?;
            configure_connection(&conn, true)?;
            apply_schema(&mut conn)?;
            info!("event=db_reset module=db status=ok");
            Ok((
                conn,
                OpenOutcome::Reset {
                    previous_version: found_version,
                },
            ))
        }
    }
}

fn configure_connection(conn: &Connection, file_backed: bool) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))?;
    if file_backed {
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
    }
    Ok(())
}

fn remove_store_files(path: &Path) -> DbResult<()> {
    for candidate in store_file_set(path) {
        match std::fs::remove_file(&candidate) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(DbError::Reset {
                    path: candidate,
                    source,
                })
            }
        }
    }
    Ok(())
}

fn store_file_set(path: &Path) -> [PathBuf; 3] {
    let sibling = |suffix: &str| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    [path.to_path_buf(), sibling("-wal"), sibling("-shm")]
}

fn outcome_label(outcome: OpenOutcome) -> &'static str {
    match outcome {
        OpenOutcome::Fresh => "fresh",
        OpenOutcome::Current => "current",
        OpenOutcome::Reset { .. } => "reset",
    }
}
