//! Live sink: writes straight to a connection.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{AddColumn, KeySpec, Record, TableSchema, TargetState, Value};
use crate::sink::dialect::quote_ident;
use crate::sink::{Dialect, IfExists, Sink, LIVE_BATCH_SIZE};
use crate::storage::{Connection, DbResult};

/// Applies every operation to a caller-owned connection.
///
/// Each batch runs in its own transaction and is committed before the next
/// one starts.
pub struct LiveSink<'c> {
    conn: &'c mut dyn Connection,
    batch_size: usize,
    created: HashSet<String>,
}

impl<'c> LiveSink<'c> {
    #[must_use]
    pub fn new(conn: &'c mut dyn Connection) -> Self {
        Self {
            conn,
            batch_size: LIVE_BATCH_SIZE,
            created: HashSet::new(),
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Write one batch inside a transaction, rolling back on failure.
    fn write_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        clear_first: bool,
        conflict_key: Option<&str>,
    ) -> DbResult<usize> {
        self.conn.begin()?;
        match self.write_rows(table, columns, batch, clear_first, conflict_key) {
            Ok(written) => {
                self.conn.commit()?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rollback_err) = self.conn.rollback() {
                    warn!(error = %rollback_err, "Rollback after failed batch also failed");
                }
                Err(e)
            }
        }
    }

    fn write_rows(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        clear_first: bool,
        conflict_key: Option<&str>,
    ) -> DbResult<usize> {
        let dialect = self.conn.dialect();

        if clear_first {
            self.conn
                .execute_script(&format!("DELETE FROM {}", quote_ident(table)))?;
        }

        if columns.is_empty() {
            let sql = dialect.insert_default_values(table);
            for _ in batch {
                self.conn.execute(&sql, &[])?;
            }
            return Ok(batch.len());
        }

        let tail = conflict_key
            .map(|pk| dialect.upsert_tail(columns, pk))
            .unwrap_or_default();
        let rows_per_statement = (self.conn.max_bind_params() / columns.len()).max(1);

        let mut written = 0;
        for chunk in batch.chunks(rows_per_statement) {
            let mut sql = dialect.insert_head(table, columns);
            let mut params: Vec<&Value> = Vec::with_capacity(chunk.len() * columns.len());
            for (row_idx, record) in chunk.iter().enumerate() {
                if row_idx > 0 {
                    sql.push_str(", ");
                }
                let placeholders: Vec<String> = (0..columns.len())
                    .map(|col_idx| dialect.placeholder(params.len() + col_idx + 1))
                    .collect();
                sql.push('(');
                sql.push_str(&placeholders.join(", "));
                sql.push(')');
                params.extend(columns.iter().map(|c| record.value_or_null(c)));
            }
            sql.push_str(&tail);

            debug!(table, rows = chunk.len(), "Executing insert statement");
            self.conn.execute(&sql, &params)?;
            written += chunk.len();
        }

        Ok(written)
    }
}

impl Sink for LiveSink<'_> {
    fn dialect(&self) -> Dialect {
        self.conn.dialect()
    }

    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn describe_table(&mut self, table: &str) -> DbResult<TargetState> {
        Ok(match self.conn.describe_table(table)? {
            Some(snapshot) => TargetState::Existing(snapshot),
            None => TargetState::Missing,
        })
    }

    fn drop_table(&mut self, table: &str) -> DbResult<()> {
        self.conn
            .execute_script(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))?;
        self.created.remove(table);
        Ok(())
    }

    fn create_table(&mut self, schema: &TableSchema, key: &KeySpec) -> DbResult<()> {
        let sql = self.conn.dialect().create_table(schema, key);
        self.conn.execute_script(&sql)?;
        self.created.insert(schema.name.clone());
        Ok(())
    }

    fn add_column(&mut self, table: &str, column: &AddColumn) -> DbResult<()> {
        let sql = self.conn.dialect().add_column(table, column, false);
        self.conn.execute_script(&sql)
    }

    fn ensure_table_has_column(&mut self, table: &str, column: &AddColumn) -> DbResult<()> {
        let present = self
            .conn
            .describe_table(table)?
            .is_some_and(|t| t.has_column(&column.name));
        if present {
            return Ok(());
        }
        self.add_column(table, column)
    }

    fn bulk_insert(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        if_exists: IfExists,
    ) -> DbResult<usize> {
        let clear_first = if_exists == IfExists::Replace && !self.created.contains(table);
        let written = self.write_batch(table, columns, batch, clear_first, None)?;
        if clear_first {
            // Cleared once; following batches of the same load append.
            self.created.insert(table.to_string());
        }
        Ok(written)
    }

    fn upsert_batch(
        &mut self,
        table: &str,
        columns: &[&str],
        batch: &[Record],
        pk: &str,
    ) -> DbResult<usize> {
        self.write_batch(table, columns, batch, false, Some(pk))
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
