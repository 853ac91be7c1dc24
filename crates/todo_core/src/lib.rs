//! Core domain logic for the to-do list.
//! This crate is the single source of truth for record invariants and for
//! the action -> bus -> store -> notification flow.

pub mod action;
pub mod adapter;
pub mod app;
pub mod bus;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod store;

pub use action::{ActionDecodeError, BusMessage, TodoAction, TodoActions, TodoChange};
pub use adapter::{AdapterError, StoreBusAdapter};
pub use app::TodoApp;
pub use bus::{EventBus, PublishReport, WeakEventBus};
pub use config::{log_dir_from_env, StoreConfig, StoreLocation};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::todo::{TodoId, TodoRecord, TodoValidationError};
pub use repo::todo_repo::{RepoError, RepoResult, SqliteTodoRepository, TodoRepository};
pub use store::{PendingOp, StoreError, StoreResult, TodoStore};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
