//! Script sink: renders the run as a self-contained SQL file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::{AddColumn, KeySpec, Record, TableSchema, TargetState};
use crate::sink::dialect::quote_ident;
use crate::sink::{Dialect, IfExists, Sink, SCRIPT_BATCH_SIZE};
use crate::storage::{DbError, DbErrorKind, DbResult};
use crate::sync::atomic_write;

/// Accumulates SQL statements instead of executing them.
///
/// The script is written atomically on [`Sink::finish`]. Every statement is
/// terminated with `;` and separated by a newline.
#[derive(Debug)]
pub struct ScriptSink {
    path: PathBuf,
    dialect: Dialect,
    batch_size: usize,
    snapshot: Option<TargetState>,
    comments: Vec<String>,
    statements: Vec<String>,
    created: HashSet<String>,
}

impl ScriptSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, dialect: Dialect) -> Self {
        Self {
            path: path.into(),
            dialect,
            batch_size: SCRIPT_BATCH_SIZE,
            snapshot: None,
            comments: Vec::new(),
            statements: Vec::new(),
            created: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Describe the destination from a snapshot taken elsewhere, so upserts
    /// can be reconciled precisely instead of assumed.
    #[must_use]
    pub fn with_snapshot(mut self, state: TargetState) -> Self {
        self.snapshot = Some(state);
        self
    }

    /// Add a `--` comment line to the script header.
    #[must_use]
    pub fn with_comment(mut self, line: impl Into<String>) -> Self {
        self.comments.push(line.into());
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Statements rendered so far, without terminators.
    #[must_use]
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// The full script text.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.comments {
            out.push_str("-- ");
            out.push_str(line);
            out.push('\n');
        }
        if !self.comments.is_empty() {
            out.push('\n');
        }
        for stmt in &self.statements {
            out.push_str(stmt);
            out.push_str(";\n");
        }
        out
    }

    fn values_rows(&self, columns: &[&str], batch: &[Record]) -> String {
        let rows: Vec<String> = batch
            .iter()
            .map(|record| {
                let values: Vec<String> = columns
                    .iter()
                    .map(|c| self.dialect.literal(record.value_or_null(c)))
                    .collect();
                format!("({})", values.join(", "))
            })
            .collect();
        format!("\n  {}", rows.join(",\n  "))
    }

    fn insert_statement(&self, table: &str, columns: &[&str], batch: &[Record]) -> String {
        format!(
            "{}{}",
            self.dialect.insert_head(table, columns).trim_end(),
            self.values_rows(columns, batch)
        )
    }
}

impl Sink for ScriptSink {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn describe_table(&mut self, _table: &str) -> DbResult<TargetState> {
        Ok(self.snapshot.clone().unwrap_or(TargetState::Unknown))
    }

    fn drop_table(&mut self, table: &str) -> DbResult<()> {
        self.statements
            .push(format!("DROP TABLE IF EXISTS {}", quote_ident(table)));
        self.created.remove(table);
        Ok(())
    }

    fn create_table(&mut self, schema: &TableSchema, key: &KeySpec) -> DbResult<()> {
        self.statements.push(self.dialect.create_table(schema, key));
        self.created.insert(schema.name.clone());
        Ok(())
    }

    fn add_column(&mut self, table: &str, column: &AddColumn) -> DbResult<()> {
        self.statements
            .push(self.dialect.add_column(table, column, false));
        Ok(())
    }

    fn ensure_table_has_column(&mut self, table: &str, column: &AddColumn) -> DbResult<()> {
        if !self.dialect.supports_add_column_if_not_exists() {
            return Err(DbError::new(
                DbErrorKind::Unsupported,
                format!(
                    "{} scripts cannot add a column conditionally; assuming \"{}\" exists",
                    self.dialect, column.name
                ),
            ));
        }
        self.statements
            .push(self.dialect.add_column(table, column, true));
        Ok(())
    }

    fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        if_exists: IfExists,
    ) -> DbResult<usize> {
        if if_exists == IfExists::Replace && !self.created.contains(table) {
            self.statements
                .push(format!("DELETE FROM {}", quote_ident(table)));
            self.created.insert(table.to_string());
        }

        if columns.is_empty() {
            let stmt = self.dialect.insert_default_values(table);
            self.statements
                .extend(std::iter::repeat_n(stmt, batch.len()));
        } else {
            let stmt = self.insert_statement(table, columns, batch);
            self.statements.push(stmt);
        }
        Ok(batch.len())
    }

    fn upsert_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        pk: &str,
    ) -> DbResult<usize> {
        let stmt = format!(
            "{}{}",
            self.insert_statement(table, columns, batch),
            self.dialect.upsert_tail(columns, pk)
        );
        self.statements.push(stmt);
        Ok(batch.len())
    }

    fn finish(&mut self) -> Result<()> {
        atomic_write(&self.path, &self.render())
    }
}
