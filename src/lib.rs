//! Phoenix - JSON-to-table synchronization
//!
//! This crate provides the core functionality for the `phoenix` CLI tool:
//! it reconciles a JSON array of records into a relational table, either
//! live against a database or as an equivalent SQL script.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (Value, Record, TableSchema, ImportRequest)
//! - [`storage`] - Destination connections (SQLite)
//! - [`sink`] - Live and script sinks, SQL dialects
//! - [`sync`] - Inference, duplicate resolution, reconciliation, the engine
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod sink;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
