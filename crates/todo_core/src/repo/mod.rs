//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define record-level data access contracts.
//! - Isolate SQLite query details from the store's scheduling layer.
//!
//! # Invariants
//! - Repository writes must enforce `TodoRecord::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod todo_repo;
