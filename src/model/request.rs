//! The finalized import request handed to the sync engine.

use std::collections::HashMap;

use serde::Serialize;

use super::record::Record;
use super::schema::ColumnType;

/// Reconciliation mode selected by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Drop and recreate the table, then load everything.
    Nuke,
    /// Insert into the existing table without touching its schema.
    Append,
    /// Insert-or-update keyed by the primary key, adding new columns.
    Upsert,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nuke => write!(f, "nuke"),
            Self::Append => write!(f, "append"),
            Self::Upsert => write!(f, "upsert"),
        }
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nuke" => Ok(Self::Nuke),
            "append" => Ok(Self::Append),
            "upsert" => Ok(Self::Upsert),
            _ => Err(format!("Unknown mode: {s}")),
        }
    }
}

/// What to do with records that repeat a primary-key value.
///
/// There is deliberately no default: the caller must choose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateKeyPolicy {
    /// Abort the whole sync, naming the field and example values.
    Strict,
    /// Keep only the last record (by input order) for each key.
    LastWins,
}

impl std::fmt::Display for DuplicateKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strict => write!(f, "strict"),
            Self::LastWins => write!(f, "last-wins"),
        }
    }
}

/// Per-column choices made by the caller before the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    /// When set, only these fields are imported.
    pub include: Option<Vec<String>>,
    /// Types that replace the inferred ones.
    pub type_overrides: HashMap<String, ColumnType>,
}

impl ColumnSelection {
    /// Whether a field takes part in the import.
    #[must_use]
    pub fn includes(&self, name: &str) -> bool {
        self.include
            .as_ref()
            .is_none_or(|fields| fields.iter().any(|f| f == name))
    }
}

/// One invocation of the engine. Immutable once built.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub records: Vec<Record>,
    pub table: String,
    pub mode: Mode,
    pub primary_key: Option<String>,
    pub duplicate_policy: DuplicateKeyPolicy,
    pub columns: ColumnSelection,
}

impl ImportRequest {
    #[must_use]
    pub fn new(
        records: Vec<Record>,
        table: impl Into<String>,
        mode: Mode,
        duplicate_policy: DuplicateKeyPolicy,
    ) -> Self {
        Self {
            records,
            table: table.into(),
            mode,
            primary_key: None,
            duplicate_policy,
            columns: ColumnSelection::default(),
        }
    }

    /// Set the primary-key field. Empty names are ignored.
    #[must_use]
    pub fn with_primary_key(mut self, field: impl Into<String>) -> Self {
        let field = field.into();
        self.primary_key = (!field.is_empty()).then_some(field);
        self
    }

    /// Restrict the import to the given fields.
    #[must_use]
    pub fn with_columns(mut self, fields: Vec<String>) -> Self {
        self.columns.include = Some(fields);
        self
    }

    /// Force a column type instead of the inferred one.
    #[must_use]
    pub fn with_type_override(mut self, field: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.type_overrides.insert(field.into(), column_type);
        self
    }
}
