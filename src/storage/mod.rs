//! Destination connection capability.
//!
//! The engine never opens, pools or retries connections itself. The caller
//! owns a [`Connection`] for the lifetime of the run and hands it to the
//! live sink.
//!
//! # Submodules
//!
//! - [`sqlite`] - SQLite implementation over rusqlite

pub mod sqlite;

use thiserror::Error;

use crate::model::{TargetTable, Value};
use crate::sink::Dialect;

pub use sqlite::SqliteConnection;

/// Result type for destination operations.
pub type DbResult<T> = std::result::Result<T, DbError>;

/// Broad classification of a destination failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbErrorKind {
    /// A primary key, unique or not-null constraint rejected a row.
    Constraint,
    /// The object is locked or busy elsewhere.
    Locked,
    /// The destination does not support the requested statement.
    Unsupported,
    Other,
}

/// A failure reported by the destination.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DbError {
    pub kind: DbErrorKind,
    pub message: String,
}

impl DbError {
    #[must_use]
    pub fn new(kind: DbErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// A live destination the engine can write to.
pub trait Connection {
    /// SQL flavour spoken by this destination.
    fn dialect(&self) -> Dialect;

    /// Execute one statement with positional parameters, returning the
    /// number of affected rows.
    fn execute(&mut self, sql: &str, params: &[&Value]) -> DbResult<usize>;

    /// Execute one or more statements without parameters.
    fn execute_script(&mut self, sql: &str) -> DbResult<()>;

    /// Snapshot of a table, or `None` when it does not exist.
    fn describe_table(&mut self, table: &str) -> DbResult<Option<TargetTable>>;

    fn begin(&mut self) -> DbResult<()>;

    fn commit(&mut self) -> DbResult<()>;

    fn rollback(&mut self) -> DbResult<()>;

    /// Largest number of bind parameters accepted by one statement.
    fn max_bind_params(&self) -> usize {
        32_766
    }
}
