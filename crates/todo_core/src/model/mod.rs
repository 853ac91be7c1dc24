//! Domain model for the to-do list.
//!
//! # Responsibility
//! - Define the canonical record handed out by the store.
//!
//! # Invariants
//! - Every record is identified by a stable `TodoId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod todo;
