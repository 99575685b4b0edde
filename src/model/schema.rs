//! Column and table schema types.
//!
//! A [`TableSchema`] describes either the incoming side (derived from the
//! records) or, through [`TargetTable`], a snapshot of the destination.
//! Reconciliation always runs incoming → target.

use serde::{Deserialize, Serialize};

use super::value::Value;

/// Semantic column type produced by inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Text,
    Integer,
    Decimal,
    Boolean,
    /// Nested objects or arrays.
    Json,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Integer => write!(f, "integer"),
            Self::Decimal => write!(f, "decimal"),
            Self::Boolean => write!(f, "boolean"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ColumnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "string" | "varchar" => Ok(Self::Text),
            "integer" | "int" | "bigint" => Ok(Self::Integer),
            "decimal" | "numeric" | "float" => Ok(Self::Decimal),
            "boolean" | "bool" => Ok(Self::Boolean),
            "json" | "jsonb" => Ok(Self::Json),
            _ => Err(format!("Unknown column type: {s}")),
        }
    }
}

/// An incoming column, fixed for the duration of one sync pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    /// Longest observed value, in characters.
    pub max_text_len: usize,
    /// Text too long for the bounded text type.
    pub long_text: bool,
    /// Bounded sample of non-null values the type was inferred from.
    #[serde(skip)]
    pub samples: Vec<Value>,
}

impl Column {
    #[must_use]
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            max_text_len: 0,
            long_text: false,
            samples: Vec::new(),
        }
    }
}

/// How the table's primary key is provided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "column", rename_all = "snake_case")]
pub enum KeySpec {
    /// A column present in the data.
    Column(String),
    /// A generated identity column added by the destination.
    Synthesized(String),
}

impl KeySpec {
    /// Name of the key column.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Column(name) | Self::Synthesized(name) => name,
        }
    }

    /// The key column when it comes from the data.
    #[must_use]
    pub fn data_column(&self) -> Option<&str> {
        match self {
            Self::Column(name) => Some(name),
            Self::Synthesized(_) => None,
        }
    }
}

/// An ordered set of uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    columns: Vec<Column>,
    pub primary_key: Option<String>,
}

impl TableSchema {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            primary_key: None,
        }
    }

    /// Add a column. Returns `false` (and leaves the schema untouched) when
    /// a column with the same case-sensitive name already exists.
    pub fn push(&mut self, column: Column) -> bool {
        if self.contains(&column.name) {
            return false;
        }
        self.columns.push(column);
        true
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Keep only the columns accepted by `keep`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Column) -> bool) {
        self.columns.retain(|c| keep(c));
    }

    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A column as declared in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetColumn {
    pub name: String,
    pub declared_type: String,
}

/// Snapshot of an existing destination table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTable {
    pub columns: Vec<TargetColumn>,
    /// Columns that are individually guaranteed unique (primary key or a
    /// single-column unique index).
    pub unique_columns: Vec<String>,
}

impl TargetTable {
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    #[must_use]
    pub fn is_unique(&self, name: &str) -> bool {
        self.unique_columns.iter().any(|c| c == name)
    }
}

/// What a sink knows about the destination table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetState {
    Missing,
    Existing(TargetTable),
    /// The sink cannot inspect the destination (script without snapshot).
    Unknown,
}

/// Additive DDL action computed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddColumn {
    pub name: String,
    pub column_type: ColumnType,
    /// Whether the text rendering should be unbounded.
    pub long_text: bool,
}
