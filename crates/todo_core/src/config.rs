//! Store location configuration.
//!
//! # Responsibility
//! - Describe where the durable record store lives.
//! - Resolve the default store and log locations from the environment.

use std::path::{Path, PathBuf};

/// Environment variable overriding the store file path.
pub const DB_PATH_ENV: &str = "TODO_DB_PATH";
const DEFAULT_DB_FILE_NAME: &str = "todo.sqlite3";
/// Environment variable overriding the log directory.
pub const LOG_DIR_ENV: &str = "TODO_LOG_DIR";
const DEFAULT_LOG_DIR_NAME: &str = "todo_logs";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub location: StoreLocation,
}

impl StoreConfig {
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            location: StoreLocation::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::InMemory,
        }
    }

    /// Resolves the store file from `TODO_DB_PATH`, falling back to the
    /// system temp directory when unset or blank.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(DB_PATH_ENV).ok())
    }

    fn from_env_value(raw: Option<String>) -> Self {
        if let Some(raw) = raw {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Self::file(trimmed);
            }
        }
        Self::file(std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }
}

/// Resolves the log directory from `TODO_LOG_DIR`, falling back to
/// `todo_logs` under the system temp directory when unset or blank.
pub fn log_dir_from_env() -> PathBuf {
    log_dir_from_value(std::env::var(LOG_DIR_ENV).ok())
}

fn log_dir_from_value(raw: Option<String>) -> PathBuf {
    match raw.as_deref().map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => PathBuf::from(trimmed),
        _ => std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
