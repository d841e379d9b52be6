//! SQLite storage layer for pumpsync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so the daemon and one-shot commands can share the file
//! - Idempotent ingestion of history log entries
//! - Transaction discipline for cursor writes
//! - Audit events for cursor history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod schema;
pub mod sqlite;

pub use sqlite::{LogStats, MutationContext, SqliteStorage};
