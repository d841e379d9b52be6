//! pumpsync - mirror insulin pump history logs to Nightscout
//!
//! This crate provides the core functionality for the `pumpsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (`LogEntry`, `SyncCursor`, `ProcessorCategory`)
//! - [`storage`] - SQLite database layer
//! - [`sync`] - Fetching, coordination, category processors, scheduling
//! - [`nightscout`] - Nightscout REST client and wire records
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod nightscout;
pub mod storage;
pub mod sync;
pub mod validate;

pub use error::{Error, Result};
