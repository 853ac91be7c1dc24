//! SQLite storage bootstrap and schema version policy.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the to-do store.
//! - Enforce the destructive schema-version policy on startup.
//!
//! # Invariants
//! - Schema version is tracked via `PRAGMA user_version`.
//! - A version mismatch discards the store file and recreates it empty;
//!   callers must treat "store was just reset" as a valid empty start.
//! - Core code must not read/write records before the schema is in place.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod open;
pub mod schema;

pub use open::{open_db, open_db_in_memory, open_db_with_outcome, OpenOutcome};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The incompatible store file could not be removed.
    Reset {
        path: PathBuf,
        source: std::io::Error,
    },
    Io(std::io::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::Reset { path, source } => write!(
                f,
                "failed to remove incompatible store `{}`: {source}",
                path.display()
            ),
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Reset { source, .. } => Some(source),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<std::io::Error> for DbError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
