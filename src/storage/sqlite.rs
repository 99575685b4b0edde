//! SQLite implementation of the destination connection.

use std::path::Path;
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, ErrorCode, OpenFlags};

use crate::error::Result;
use crate::model::{TargetColumn, TargetTable, Value};
use crate::sink::Dialect;
use crate::storage::{Connection, DbError, DbErrorKind, DbResult};

/// A live SQLite destination.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl SqliteConnection {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        Ok(Self { conn })
    }

    /// Open an existing database without write access, for snapshots.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or cannot be opened.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let conn = rusqlite::Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &rusqlite::Connection {
        &self.conn
    }

    fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [table],
            |row| row.get(0),
        )
    }

    fn unique_index_columns(&self, table: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM pragma_index_list(?1) WHERE \"unique\" = 1 AND partial = 0",
        )?;
        let indexes = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut columns = Vec::new();
        let mut info = self.conn.prepare("SELECT name FROM pragma_index_info(?1)")?;
        for index in indexes {
            let names = info
                .query_map([&index], |row| row.get::<_, Option<String>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            // Only single-column indexes make one column unique on its own.
            if let [Some(name)] = names.as_slice() {
                columns.push(name.clone());
            }
        }
        Ok(columns)
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else if let Some(f) = n.as_f64() {
                SqlValue::Real(f)
            } else {
                SqlValue::Text(n.to_string())
            }
        }
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Json(v) => SqlValue::Text(v.to_string()),
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        let kind = match &err {
            rusqlite::Error::SqliteFailure(e, _) => match e.code {
                ErrorCode::ConstraintViolation => DbErrorKind::Constraint,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DbErrorKind::Locked,
                _ => DbErrorKind::Other,
            },
            _ => DbErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[&Value]) -> DbResult<usize> {
        let values = params.iter().map(|v| to_sql_value(v));
        Ok(self.conn.execute(sql, params_from_iter(values))?)
    }

    fn execute_script(&mut self, sql: &str) -> DbResult<()> {
        Ok(self.conn.execute_batch(sql)?)
    }

    fn describe_table(&mut self, table: &str) -> DbResult<Option<TargetTable>> {
        if !self.table_exists(table)? {
            return Ok(None);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let rows = stmt
            .query_map([table], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let pk_columns: Vec<&String> = rows
            .iter()
            .filter(|(_, _, pk)| *pk > 0)
            .map(|(name, _, _)| name)
            .collect();

        let mut unique_columns = Vec::new();
        if let [single] = pk_columns.as_slice() {
            unique_columns.push((*single).clone());
        }
        for name in self.unique_index_columns(table)? {
            if !unique_columns.contains(&name) {
                unique_columns.push(name);
            }
        }

        let columns = rows
            .into_iter()
            .map(|(name, declared_type, _)| TargetColumn { name, declared_type })
            .collect();

        Ok(Some(TargetTable {
            columns,
            unique_columns,
        }))
    }

    fn begin(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("BEGIN IMMEDIATE")?)
    }

    fn commit(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("COMMIT")?)
    }

    fn rollback(&mut self) -> DbResult<()> {
        Ok(self.conn.execute_batch("ROLLBACK")?)
    }
}
