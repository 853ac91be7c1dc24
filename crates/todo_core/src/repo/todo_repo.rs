//! To-do repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide list/get/insert/delete/toggle over canonical `todo_items` storage.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Write paths call `TodoRecord::validate()` before SQL mutations.
//! - Mutations that look a record up run read-then-write-then-commit in
//!   one immediate transaction.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Listing order is `created_at DESC`, ties broken by newest insertion.

use crate::db::DbError;
use crate::model::todo::{TodoId, TodoRecord, TodoValidationError};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

const TODO_SELECT_SQL: &str = "SELECT
    id,
    title,
    completed,
    created_at
FROM todo_items";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for to-do persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TodoValidationError),
    Db(DbError),
    NotFound(TodoId),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "todo item not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted todo data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<TodoValidationError> for RepoError {
    fn from(value: TodoValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for to-do record persistence.
pub trait TodoRepository {
    fn list_all(&self) -> RepoResult<Vec<TodoRecord>>;
    fn get(&self, id: TodoId) -> RepoResult<Option<TodoRecord>>;
    fn insert(&mut self, record: &TodoRecord) -> RepoResult<()>;
    fn delete(&mut self, id: TodoId) -> RepoResult<()>;
    /// Flips `completed` and returns the updated snapshot.
    fn toggle_completed(&mut self, id: TodoId) -> RepoResult<TodoRecord>;
    /// Newest stored `created_at`, `None` for an empty store.
    fn latest_created_at(&self) -> RepoResult<Option<i64>>;
}

/// SQLite-backed to-do repository.
pub struct SqliteTodoRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTodoRepository<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    fn begin(&mut self) -> RepoResult<Transaction<'_>> {
        Ok(self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?)
    }
}

impl TodoRepository for SqliteTodoRepository<'_> {
    fn list_all(&self) -> RepoResult<Vec<TodoRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{TODO_SELECT_SQL} ORDER BY created_at DESC, rowid DESC;"
        ))?;
        let mut rows = stmt.query([])?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_todo_row(row)?);
        }

        Ok(records)
    }

    fn get(&self, id: TodoId) -> RepoResult<Option<TodoRecord>> {
        find_by_id(&*self.conn, id)
    }

    fn insert(&mut self, record: &TodoRecord) -> RepoResult<()> {
        record.validate()?;

        self.conn.execute(
            "INSERT INTO todo_items (id, title, completed, created_at)
             VALUES (?1, ?2, ?3, ?4);",
            params![
                record.id.to_string(),
                record.title.as_str(),
                bool_to_int(record.completed),
                record.created_at,
            ],
        )?;

        Ok(())
    }

    fn delete(&mut self, id: TodoId) -> RepoResult<()> {
        let tx = self.begin()?;
        if find_by_id(&tx, id)?.is_none() {
            return Err(RepoError::NotFound(id));
        }

        tx.execute("DELETE FROM todo_items WHERE id = ?1;", [id.to_string()])?;
        tx.commit()?;
        Ok(())
    }

    fn toggle_completed(&mut self, id: TodoId) -> RepoResult<TodoRecord> {
        let tx = self.begin()?;
        let Some(mut record) = find_by_id(&tx, id)? else {
            return Err(RepoError::NotFound(id));
        };

        record.toggle();
        tx.execute(
            "UPDATE todo_items SET completed = ?1 WHERE id = ?2;",
            params![bool_to_int(record.completed), id.to_string()],
        )?;
        tx.commit()?;
        Ok(record)
    }

    fn latest_created_at(&self) -> RepoResult<Option<i64>> {
        Ok(self
            .conn
            .query_row("SELECT MAX(created_at) FROM todo_items;", [], |row| {
                row.get::<_, Option<i64>>(0)
            })?)
    }
}

fn find_by_id(conn: &Connection, id: TodoId) -> RepoResult<Option<TodoRecord>> {
    let mut stmt = conn.prepare(&format!("{TODO_SELECT_SQL} WHERE id = ?1;"))?;
    let row = stmt
        .query_row([id.to_string()], |row| Ok(parse_todo_row(row)))
        .optional()?;
    row.transpose()
}

fn parse_todo_row(row: &Row<'_>) -> RepoResult<TodoRecord> {
    let id_text: String = row.get("id")?;
    let id = id_text.parse::<TodoId>().map_err(|_| {
        RepoError::InvalidData(format!("invalid id value `{id_text}` in todo_items.id"))
    })?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` in todo_items.completed"
            )));
        }
    };

    let record = TodoRecord {
        id,
        title: row.get("title")?,
        completed,
        created_at: row.get("created_at")?,
    };
    record.validate()?;
    Ok(record)
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
