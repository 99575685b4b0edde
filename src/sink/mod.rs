//! Destination sinks.
//!
//! A [`Sink`] is the capability the sync engine writes through. Two
//! implementations exist and must stay behaviorally identical:
//!
//! - [`LiveSink`] - applies DDL/DML through a [`Connection`](crate::storage::Connection),
//!   committing every batch on its own
//! - [`ScriptSink`] - never touches a connection; renders an equivalent,
//!   self-contained SQL script
//!
//! Replaying a script against an empty destination yields the same table
//! contents as running the live sink with the same request.
//!
//! # Partial completion
//!
//! Batches commit independently. When a batch fails, earlier batches stay
//! applied and later ones are never attempted; nothing is rolled back across
//! batches. Callers get at-least-partial completion, not all-or-nothing.

mod dialect;
mod live;
mod script;

pub use dialect::{quote_ident, quote_literal, Dialect};
pub use live::LiveSink;
pub use script::ScriptSink;

use crate::error::Result;
use crate::model::{AddColumn, KeySpec, Record, TableSchema, TargetState};
use crate::storage::DbResult;

/// Default rows per batch for live writes.
pub const LIVE_BATCH_SIZE: usize = 500;

/// Default rows per statement for rendered scripts.
pub const SCRIPT_BATCH_SIZE: usize = 100;

/// How a bulk insert treats rows already in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfExists {
    /// The load owns the table: existing rows are cleared before the batch,
    /// unless this sink created the table during the same pass.
    Replace,
    /// Rows are added next to whatever is already there.
    Append,
}

/// Write capability used by the sync engine.
pub trait Sink {
    /// SQL flavour this sink speaks.
    fn dialect(&self) -> Dialect;

    /// Records per batch.
    fn batch_size(&self) -> usize;

    /// What the sink knows about `table` right now.
    fn describe_table(&mut self, table: &str) -> DbResult<TargetState>;

    /// `DROP TABLE IF EXISTS`.
    fn drop_table(&mut self, table: &str) -> DbResult<()>;

    /// Create a table with every column and the key constraint.
    fn create_table(&mut self, schema: &TableSchema, key: &KeySpec) -> DbResult<()>;

    /// Add one column to an existing table.
    fn add_column(&mut self, table: &str, column: &AddColumn) -> DbResult<()>;

    /// Make sure a column exists without knowing whether it already does.
    fn ensure_table_has_column(&mut self, table: &str, column: &AddColumn) -> DbResult<()>;

    /// Insert one batch. Missing fields are written as NULL.
    fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        if_exists: IfExists,
    ) -> DbResult<usize>;

    /// Insert one batch, overwriting every non-key column of rows whose key
    /// already exists.
    fn upsert_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        pk: &str,
    ) -> DbResult<usize>;

    /// Flush anything buffered (the script file).
    ///
    /// # Errors
    ///
    /// Returns an error if the output cannot be written.
    fn finish(&mut self) -> Result<()>;
}
