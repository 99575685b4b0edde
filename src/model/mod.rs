//! Data models for Phoenix.
//!
//! This module contains the domain types shared by every stage:
//! - Value, Record (the incoming data)
//! - Column, TableSchema, TargetTable (schemas on both sides)
//! - ImportRequest, Mode, DuplicateKeyPolicy (what the caller asks for)

pub mod record;
pub mod request;
pub mod schema;
pub mod value;

pub use record::Record;
pub use request::{ColumnSelection, DuplicateKeyPolicy, ImportRequest, Mode};
pub use schema::{
    AddColumn, Column, ColumnType, KeySpec, TableSchema, TargetColumn, TargetState, TargetTable,
};
pub use value::Value;
