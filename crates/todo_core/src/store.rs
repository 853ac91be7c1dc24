//! Asynchronous record store with a single-writer worker.
//!
//! The worker runs on a dedicated thread and exclusively owns the SQLite
//! connection. Handles enqueue commands on an unbounded FIFO channel at
//! call time and receive results on a `oneshot` reply channel, so:
//!
//! - at most one operation touches the database at a time,
//! - operations execute in submission order,
//! - a read submitted after a write observes that write.
//!
//! There is no cancellation: dropping a [`PendingOp`] discards the result
//! but the operation still runs to completion.

use crate::config::{StoreConfig, StoreLocation};
use crate::db::{open_db_in_memory, open_db_with_outcome, DbError, OpenOutcome};
use crate::model::todo::{now_epoch_ms, TodoId, TodoRecord, TodoValidationError};
use crate::repo::todo_repo::{RepoError, SqliteTodoRepository, TodoRepository};
use log::{debug, error, info, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

const WORKER_THREAD_NAME: &str = "todo-store-writer";

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a record store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The underlying read could not be performed.
    Read(String),
    /// The durable write could not commit; nothing partial is visible.
    Write(String),
    /// No record with this id exists.
    NotFound(TodoId),
    Validation(TodoValidationError),
    /// The store could not be opened; every operation fails with this.
    Initialization(String),
    /// The worker is gone and can no longer answer.
    Unavailable,
}

impl StoreError {
    /// True for read failures, including a missing record.
    pub fn is_read_failure(&self) -> bool {
        matches!(self, Self::Read(_) | Self::NotFound(_))
    }

    fn from_read(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Read(format!("stored record is invalid: {err}")),
            other => Self::Read(other.to_string()),
        }
    }

    fn from_write(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::InvalidData(message) => Self::Read(message),
            RepoError::Db(err) => Self::Write(err.to_string()),
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(reason) => write!(f, "unsuccessful read: {reason}"),
            Self::Write(reason) => write!(f, "unsuccessful write: {reason}"),
            Self::NotFound(id) => write!(f, "item does not exist: {id}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Initialization(reason) => write!(f, "store initialization failed: {reason}"),
            Self::Unavailable => write!(f, "store worker is no longer running"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Result of an enqueued store operation.
///
/// The operation is already queued when this value exists; awaiting it only
/// waits for the reply.
#[must_use = "the operation runs regardless; await the result to observe it"]
pub struct PendingOp<T> {
    reply: oneshot::Receiver<StoreResult<T>>,
}

impl<T> PendingOp<T> {
    fn ready(result: StoreResult<T>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { reply: rx }
    }

    /// Blocks the current thread until the reply arrives.
    ///
    /// Must not be called from within an async runtime.
    pub fn wait_blocking(self) -> StoreResult<T> {
        self.reply
            .blocking_recv()
            .unwrap_or(Err(StoreError::Unavailable))
    }
}

impl<T> Future for PendingOp<T> {
    type Output = StoreResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.reply)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(StoreError::Unavailable)))
    }
}

type Reply<T> = oneshot::Sender<StoreResult<T>>;

enum StoreCommand {
    ListAll { reply: Reply<Vec<TodoRecord>> },
    Get { id: TodoId, reply: Reply<Option<TodoRecord>> },
    Create { title: String, reply: Reply<TodoRecord> },
    Delete { id: TodoId, reply: Reply<()> },
    ToggleCompleted { id: TodoId, reply: Reply<TodoRecord> },
    Close { reply: Reply<()> },
}

#[derive(Clone)]
enum Backend {
    Ready(mpsc::UnboundedSender<StoreCommand>),
    Failed(Arc<str>),
}

/// Cloneable handle to the record store.
///
/// The worker thread exits once every handle has been dropped.
#[derive(Clone)]
pub struct TodoStore {
    backend: Backend,
    opened_as: Option<OpenOutcome>,
}

impl TodoStore {
    /// Opens the store and starts its worker.
    ///
    /// Never fails: if the database cannot be opened the returned handle is
    /// degraded and every operation reports [`StoreError::Initialization`].
    pub fn open(config: &StoreConfig) -> Self {
        match open_connection(&config.location) {
            Ok((conn, outcome)) => match spawn_worker(conn) {
                Ok(sender) => Self {
                    backend: Backend::Ready(sender),
                    opened_as: Some(outcome),
                },
                Err(err) => Self::degraded(format!("failed to start store worker: {err}")),
            },
            Err(err) => Self::degraded(err.to_string()),
        }
    }

    fn degraded(reason: String) -> Self {
        error!(
            "event=store_open module=store status=error error_code=store_init_failed error={}",
            reason
        );
        Self {
            backend: Backend::Failed(Arc::from(reason)),
            opened_as: None,
        }
    }

    /// Reason the store failed to open, if it did.
    pub fn init_error(&self) -> Option<&str> {
        match &self.backend {
            Backend::Ready(_) => None,
            Backend::Failed(reason) => Some(&**reason),
        }
    }

    /// How the store file looked at open time; `None` when degraded.
    pub fn open_outcome(&self) -> Option<OpenOutcome> {
        self.opened_as
    }

    /// All records, newest first. An empty store yields an empty list.
    pub fn list_all(&self) -> PendingOp<Vec<TodoRecord>> {
        self.submit(|reply| StoreCommand::ListAll { reply })
    }

    pub fn get(&self, id: TodoId) -> PendingOp<Option<TodoRecord>> {
        self.submit(|reply| StoreCommand::Get { id, reply })
    }

    /// Creates a record with a fresh id and `completed = false`.
    pub fn create(&self, title: impl Into<String>) -> PendingOp<TodoRecord> {
        let title = title.into();
        self.submit(|reply| StoreCommand::Create { title, reply })
    }

    /// Permanently removes a record; fails with `NotFound` if absent.
    pub fn delete(&self, id: TodoId) -> PendingOp<()> {
        self.submit(|reply| StoreCommand::Delete { id, reply })
    }

    /// Flips `completed`; fails with `NotFound` if absent.
    pub fn toggle_completed(&self, id: TodoId) -> PendingOp<TodoRecord> {
        self.submit(|reply| StoreCommand::ToggleCompleted { id, reply })
    }

    /// Stops the worker after everything queued before this call.
    ///
    /// The reply arrives once the connection is closed. Operations submitted
    /// afterwards through other handles fail with `Unavailable`.
    pub fn close(self) -> PendingOp<()> {
        self.submit(|reply| StoreCommand::Close { reply })
    }

    fn submit<T>(&self, build: impl FnOnce(Reply<T>) -> StoreCommand) -> PendingOp<T> {
        let sender = match &self.backend {
            Backend::Ready(sender) => sender,
            Backend::Failed(reason) => {
                return PendingOp::ready(Err(StoreError::Initialization(reason.to_string())))
            }
        };

        let (tx, rx) = oneshot::channel();
        if sender.send(build(tx)).is_err() {
            warn!("event=store_submit module=store status=error error_code=worker_gone");
            return PendingOp::ready(Err(StoreError::Unavailable));
        }
        PendingOp { reply: rx }
    }
}

fn open_connection(location: &StoreLocation) -> Result<(Connection, OpenOutcome), DbError> {
    match location {
        StoreLocation::File(path) => open_db_with_outcome(path),
        StoreLocation::InMemory => open_db_in_memory().map(|conn| (conn, OpenOutcome::Fresh)),
    }
}

fn spawn_worker(conn: Connection) -> std::io::Result<mpsc::UnboundedSender<StoreCommand>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name(WORKER_THREAD_NAME.to_string())
        .spawn(move || run_worker(conn, rx))?;
    info!("event=store_open module=store status=ok");
    Ok(tx)
}

/// Processes commands one at a time until closed or every handle is dropped.
fn run_worker(mut conn: Connection, mut rx: mpsc::UnboundedReceiver<StoreCommand>) {
    let mut last_created_at = seed_created_at(&mut conn);
    let mut close_reply = None;

    while let Some(command) = rx.blocking_recv() {
        let mut repo = SqliteTodoRepository::new(&mut conn);
        // A dropped receiver means the caller stopped listening; the work is
        // already done, so the send result is ignored.
        match command {
            StoreCommand::ListAll { reply } => {
                let result = timed("list_all", || {
                    repo.list_all().map_err(StoreError::from_read)
                });
                let _ = reply.send(result);
            }
            StoreCommand::Get { id, reply } => {
                let result = timed("get", || repo.get(id).map_err(StoreError::from_read));
                let _ = reply.send(result);
            }
            StoreCommand::Create { title, reply } => {
                let result = timed("create", || {
                    // Keeps display order stable if the wall clock steps back.
                    let created_at = now_epoch_ms().max(last_created_at);
                    let record = TodoRecord::with_id(TodoId::new(), title, created_at);
                    repo.insert(&record).map_err(StoreError::from_write)?;
                    last_created_at = created_at;
                    Ok(record)
                });
                let _ = reply.send(result);
            }
            StoreCommand::Delete { id, reply } => {
                let result = timed("delete", || repo.delete(id).map_err(StoreError::from_write));
                let _ = reply.send(result);
            }
            StoreCommand::ToggleCompleted { id, reply } => {
                let result = timed("toggle_completed", || {
                    repo.toggle_completed(id).map_err(StoreError::from_write)
                });
                let _ = reply.send(result);
            }
            StoreCommand::Close { reply } => {
                close_reply = Some(reply);
                break;
            }
        }
    }

    rx.close();
    drop(conn);
    debug!(
        "event=store_close module=store status=ok reason={}",
        if close_reply.is_some() {
            "requested"
        } else {
            "handles_dropped"
        }
    );
    if let Some(reply) = close_reply {
        let _ = reply.send(Ok(()));
    }
}

// New records never sort below ones written by an earlier run, even if the
// wall clock stepped back in between.
fn seed_created_at(conn: &mut Connection) -> i64 {
    match SqliteTodoRepository::new(conn).latest_created_at() {
        Ok(latest) => latest.unwrap_or(0),
        Err(err) => {
            warn!(
                "event=store_seed module=store status=error error_code=latest_created_at_failed error={}",
                err
            );
            0
        }
    }
}

fn timed<T>(operation: &str, run: impl FnOnce() -> StoreResult<T>) -> StoreResult<T> {
    let started_at = Instant::now();
    let result = run();
    match &result {
        Ok(_) => debug!(
            "event=store_{} module=store status=ok duration_ms={}",
            operation,
            started_at.elapsed().as_millis()
        ),
        Err(err) => warn!(
            "event=store_{} module=store status=error duration_ms={} error={}",
            operation,
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::{PendingOp, StoreError, TodoStore};
    use crate::config::StoreConfig;
    use crate::model::todo::TodoId;

    #[test]
    fn ready_op_resolves_without_worker() {
        let op: PendingOp<()> = PendingOp::ready(Err(StoreError::Unavailable));
        assert_eq!(op.wait_blocking(), Err(StoreError::Unavailable));
    }

    #[test]
    fn blocking_wait_serves_sync_callers() {
        let store = TodoStore::open(&StoreConfig::in_memory());
        let created = store.create("sync caller").wait_blocking().unwrap();
        let listed = store.list_all().wait_blocking().unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[test]
    fn not_found_counts_as_read_failure() {
        assert!(StoreError::NotFound(TodoId::new()).is_read_failure());
        assert!(StoreError::Read("boom".to_string()).is_read_failure());
        assert!(!StoreError::Write("boom".to_string()).is_read_failure());
    }
}
