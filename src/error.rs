//! Error types for Phoenix.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 4=validation, 5=integrity, etc.)
//! - Retryability flags for callers that fix input and try again
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

use crate::storage::{DbError, DbErrorKind};

/// Result type alias for Phoenix operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,
    MissingConstraint,

    // Validation (exit 4)
    InvalidInput,
    MissingField,
    DuplicateKey,
    PrimaryKeyRequired,
    SchemaMismatch,

    // Integrity (exit 5)
    IntegrityError,

    // Sync (exit 6)
    DdlFailure,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::MissingConstraint => "MISSING_CONSTRAINT",
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingField => "MISSING_FIELD",
            Self::DuplicateKey => "DUPLICATE_KEY",
            Self::PrimaryKeyRequired => "PRIMARY_KEY_REQUIRED",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::IntegrityError => "INTEGRITY_ERROR",
            Self::DdlFailure => "DDL_FAILURE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
        }
    }

    /// Category-based exit code (2-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::DatabaseError | Self::MissingConstraint => 2,
            Self::InvalidInput
            | Self::MissingField
            | Self::DuplicateKey
            | Self::PrimaryKeyRequired
            | Self::SchemaMismatch => 4,
            Self::IntegrityError => 5,
            Self::DdlFailure => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running with corrected input or options can succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MissingField
                | Self::DuplicateKey
                | Self::PrimaryKeyRequired
                | Self::SchemaMismatch
                | Self::IntegrityError
                | Self::DdlFailure
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur during an import.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Primary key field '{field}' not found in the data")]
    MissingField { field: String },

    #[error(
        "Duplicate values for primary key '{field}' in {rows} rows (e.g. {})",
        examples.join(", ")
    )]
    DuplicateKey {
        field: String,
        /// Rows that share a key value with at least one other row.
        rows: usize,
        /// Up to five distinct offending values.
        examples: Vec<String>,
    },

    #[error("Table '{table}' has no unique constraint on '{field}'; upsert cannot be expressed safely")]
    MissingConstraint { table: String, field: String },

    #[error("Integrity error on '{table}': {message}")]
    Integrity { table: String, message: String },

    #[error("DDL failure ({action}): {source}")]
    Ddl { action: String, source: DbError },

    #[error("UPSERT mode requires a primary key")]
    PrimaryKeyRequired,

    #[error("Table '{table}' has no column(s): {}", columns.join(", "))]
    SchemaMismatch { table: String, columns: Vec<String> },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Destination error: {0}")]
    Destination(#[from] DbError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::MissingField { .. } => ErrorCode::MissingField,
            Self::DuplicateKey { .. } => ErrorCode::DuplicateKey,
            Self::MissingConstraint { .. } => ErrorCode::MissingConstraint,
            Self::Integrity { .. } => ErrorCode::IntegrityError,
            Self::Ddl { .. } => ErrorCode::DdlFailure,
            Self::PrimaryKeyRequired => ErrorCode::PrimaryKeyRequired,
            Self::SchemaMismatch { .. } => ErrorCode::SchemaMismatch,
            Self::Database(_) | Self::Destination(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::InvalidInput(_) => {
                Some("The file must contain a JSON array of objects: [{...}, {...}]".to_string())
            }

            Self::MissingField { field } => Some(format!(
                "Run `phoenix inspect <file>` to list the available fields; '{field}' is not one of them \
                 (or was excluded with --columns)."
            )),

            Self::DuplicateKey { field, .. } => Some(format!(
                "Deduplicate '{field}' in the source, pick a unique key, \
                 or re-run with `--on-duplicate last-wins` to keep the last occurrence."
            )),

            Self::MissingConstraint { table, field } => Some(format!(
                "Add a PRIMARY KEY or UNIQUE constraint on \"{table}\".\"{field}\", \
                 or rebuild the table with `--mode nuke`."
            )),

            Self::Integrity { .. } => Some(
                "You are inserting records whose primary key already exists. Use `--mode upsert` instead."
                    .to_string(),
            ),

            Self::PrimaryKeyRequired => {
                Some("Pass `--pk <field>` to choose the key to upsert on.".to_string())
            }

            Self::SchemaMismatch { .. } => Some(
                "APPEND never alters the table. Use `--mode upsert` to add the new columns, \
                 or `--columns` to leave them out."
                    .to_string(),
            ),

            Self::Ddl { source, .. } | Self::Destination(source)
                if source.kind == DbErrorKind::Locked =>
            {
                Some(
                    "The database is locked by another process. Close other sessions and retry."
                        .to_string(),
                )
            }

            Self::Ddl { .. }
            | Self::Database(_)
            | Self::Destination(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::Config(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
