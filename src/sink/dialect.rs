//! SQL dialects: native type mapping and literal rendering.
//!
//! Both sinks go through the same rendering so that a script replayed
//! against a destination produces exactly what the live path would have
//! written.

use serde::{Deserialize, Serialize};

use crate::model::{AddColumn, Column, ColumnType, KeySpec, TableSchema, Value};

/// Destination flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    #[default]
    Postgres,
    Sqlite,
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "sqlite" | "sqlite3" => Ok(Self::Sqlite),
            _ => Err(format!("Unknown dialect: {s}")),
        }
    }
}

impl Dialect {
    /// Closest native type for a semantic column type.
    #[must_use]
    pub fn native_type(self, column_type: ColumnType, long_text: bool) -> &'static str {
        match (self, column_type) {
            (Self::Postgres, ColumnType::Json) => "JSONB",
            (Self::Postgres, ColumnType::Integer) => "BIGINT",
            (Self::Sqlite, ColumnType::Json) => "TEXT",
            (Self::Sqlite, ColumnType::Integer) => "INTEGER",
            (_, ColumnType::Decimal) => "NUMERIC",
            (_, ColumnType::Boolean) => "BOOLEAN",
            (_, ColumnType::Text) if long_text => "TEXT",
            (_, ColumnType::Text) => "VARCHAR(255)",
        }
    }

    /// Column definition for a generated identity key.
    #[must_use]
    pub fn identity_column(self, name: &str) -> String {
        match self {
            Self::Postgres => format!("{} SERIAL PRIMARY KEY", quote_ident(name)),
            Self::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote_ident(name)),
        }
    }

    /// Bind-parameter placeholder for 1-based position `n`.
    #[must_use]
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Self::Postgres => format!("${n}"),
            Self::Sqlite => format!("?{n}"),
        }
    }

    /// Whether `ALTER TABLE .. ADD COLUMN IF NOT EXISTS` is understood.
    #[must_use]
    pub fn supports_add_column_if_not_exists(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Render a value as an SQL literal.
    ///
    /// Values are rendered by their own tag; convert them with
    /// [`Value::stored_as`] first so a column's rows share one form.
    #[must_use]
    pub fn literal(self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(true) => "TRUE".to_string(),
            Value::Bool(false) => "FALSE".to_string(),
            Value::Number(n) => n.to_string(),
            Value::Text(s) => quote_literal(s),
            Value::Json(v) => match self {
                Self::Postgres => format!("{}::jsonb", quote_literal(&v.to_string())),
                Self::Sqlite => quote_literal(&v.to_string()),
            },
        }
    }

    /// `CREATE TABLE` with every column and the key constraint inline.
    #[must_use]
    pub fn create_table(self, schema: &TableSchema, key: &KeySpec) -> String {
        let mut defs = Vec::with_capacity(schema.len() + 2);
        if let KeySpec::Synthesized(name) = key {
            defs.push(self.identity_column(name));
        }
        for column in schema.columns() {
            defs.push(self.column_definition(column));
        }
        if let KeySpec::Column(name) = key {
            defs.push(format!("PRIMARY KEY ({})", quote_ident(name)));
        }
        format!(
            "CREATE TABLE {} (\n    {}\n)",
            quote_ident(&schema.name),
            defs.join(",\n    ")
        )
    }

    fn column_definition(self, column: &Column) -> String {
        format!(
            "{} {}",
            quote_ident(&column.name),
            self.native_type(column.column_type, column.long_text)
        )
    }

    /// `ALTER TABLE .. ADD COLUMN`, optionally guarded with `IF NOT EXISTS`.
    #[must_use]
    pub fn add_column(self, table: &str, column: &AddColumn, if_not_exists: bool) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {}{} {}",
            quote_ident(table),
            if if_not_exists { "IF NOT EXISTS " } else { "" },
            quote_ident(&column.name),
            self.native_type(column.column_type, column.long_text)
        )
    }

    /// `INSERT .. VALUES` head with the column list.
    #[must_use]
    pub fn insert_head(self, table: &str, columns: &[&str]) -> String {
        let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        format!("INSERT INTO {} ({}) VALUES ", quote_ident(table), cols.join(", "))
    }

    /// Insert of a single row made only of defaults.
    #[must_use]
    pub fn insert_default_values(self, table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", quote_ident(table))
    }

    /// `ON CONFLICT` tail for an upsert keyed on `pk`.
    ///
    /// When every column is the key there is nothing to update and
    /// conflicting rows are left untouched.
    #[must_use]
    pub fn upsert_tail(self, columns: &[&str], pk: &str) -> String {
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| **c != pk)
            .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
            .collect();
        if updates.is_empty() {
            format!(" ON CONFLICT ({}) DO NOTHING", quote_ident(pk))
        } else {
            format!(
                " ON CONFLICT ({}) DO UPDATE SET {}",
                quote_ident(pk),
                updates.join(", ")
            )
        }
    }
}

/// Quote an identifier. Names are passed through as given.
#[must_use]
pub fn quote_ident(name: &str) -> String {
    format!("\"{name}\"")
}

/// Single-quote a string literal, doubling embedded quotes.
#[must_use]
pub fn quote_literal(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
