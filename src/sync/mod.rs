//! JSON-to-table synchronization.
//!
//! This module turns a JSON array of records into rows of a destination
//! table:
//!
//! - [`source`] - reading and validating the JSON document
//! - [`infer`] - per-column type inference
//! - [`duplicates`] - duplicate primary-key detection and resolution
//! - [`reconcile`] - additive schema evolution
//! - [`profile`] - column statistics and key suggestions
//! - [`engine`] - the mode state machine driving a [`Sink`](crate::sink::Sink)
//! - [`report`] - progress lines and the run outcome
//!
//! # Modes
//!
//! - **Nuke**: drop, recreate, load everything
//! - **Append**: insert into the table as it is
//! - **Upsert**: insert or overwrite by key, adding new columns first

pub mod duplicates;
pub mod engine;
pub mod file;
pub mod hash;
pub mod infer;
pub mod profile;
pub mod reconcile;
pub mod report;
pub mod source;

pub use duplicates::{find_duplicates, resolve, DuplicateReport, Resolution};
pub use engine::{EngineSettings, SyncEngine, IMPLICIT_KEY};
pub use file::atomic_write;
pub use hash::content_hash;
pub use infer::{apply_selection, infer_schema, infer_type};
pub use profile::{profile_records, ColumnProfile, Profile};
pub use reconcile::reconcile;
pub use report::{LogLevel, LogLine, Outcome, SyncReport, SyncStats};
pub use source::{normalize_currency, parse_records, read_records, suggest_table_name};
