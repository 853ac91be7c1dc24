//! To-do record domain model.
//!
//! # Responsibility
//! - Define the single persisted entity and its stable identifier.
//! - Validate record shape before it reaches storage.
//!
//! # Invariants
//! - `id` is assigned once at creation and never reused.
//! - `title` is non-empty after trimming and never edited after creation.
//! - `created_at` is assigned once and defines display order (newest first).
//! - `completed` starts as `false` and only flips through toggle.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Stable identifier for a to-do record.
///
/// Rendered as the hyphenated lowercase UUID string at every boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(Uuid);

impl TodoId {
    /// Allocates a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TodoId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for TodoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for TodoId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

/// Validation failures for a record about to be persisted or just loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoValidationError {
    EmptyTitle,
    NegativeCreatedAt(i64),
}

impl Display for TodoValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::NegativeCreatedAt(value) => {
                write!(f, "created_at must not be negative, got {value}")
            }
        }
    }
}

impl Error for TodoValidationError {}

/// Immutable snapshot of one persisted to-do item.
///
/// Consumers always receive owned copies; the store keeps the only
/// mutable view of the durable collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: TodoId,
    pub title: String,
    pub completed: bool,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl TodoRecord {
    /// Creates a new, not-yet-completed record stamped with the current time.
    ///
    /// The title is trimmed; call [`TodoRecord::validate`] before persisting.
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(TodoId::new(), title, now_epoch_ms())
    }

    /// Creates a record with caller-provided identity and timestamp.
    pub fn with_id(id: TodoId, title: impl Into<String>, created_at: i64) -> Self {
        Self {
            id,
            title: title.into().trim().to_string(),
            completed: false,
            created_at,
        }
    }

    pub fn validate(&self) -> Result<(), TodoValidationError> {
        if self.title.trim().is_empty() {
            return Err(TodoValidationError::EmptyTitle);
        }
        if self.created_at < 0 {
            return Err(TodoValidationError::NegativeCreatedAt(self.created_at));
        }
        Ok(())
    }

    /// Flips the completion flag.
    pub fn toggle(&mut self) {
        self.completed = !self.completed;
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
///
/// Clamps to `0` if the clock reports a time before the epoch.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
