//! The sync engine and its mode state machine.
//!
//! One [`SyncEngine`] handles exactly one [`ImportRequest`]. The pipeline is
//! fixed:
//!
//! 1. Pick the key (explicit, an `id` field in the data, or a synthesized
//!    identity) and validate it before anything is written
//! 2. Infer the incoming schema and apply the caller's column choices
//! 3. Resolve duplicate keys under the request's policy, comparing keys as
//!    the key column stores them
//! 4. Prepare the destination for the selected mode
//! 5. Write the records batch by batch through the [`Sink`]
//!
//! Upsert against a missing table switches to Nuke once, before step 4,
//! and then shares the Nuke path.
//!
//! Every progress line goes to the injected callback and to the returned
//! [`SyncReport`], and is traced at `trace` level. Batches commit independently: a failure
//! leaves earlier batches applied.

use tracing::trace;

use crate::error::{Error, Result};
use crate::model::{
    AddColumn, ColumnType, ImportRequest, KeySpec, Mode, Record, TableSchema, TargetState,
    TargetTable,
};
use crate::sink::{IfExists, Sink};
use crate::storage::{DbError, DbErrorKind};
use crate::sync::duplicates;
use crate::sync::infer::{apply_selection, infer_schema, DEFAULT_SAMPLE_SIZE, DEFAULT_TEXT_THRESHOLD};
use crate::sync::reconcile::{reconcile, unknown_columns};
use crate::sync::report::{LogLevel, LogLine, Outcome, SyncReport, SyncStats};

/// Key column used when the caller picks none.
pub const IMPLICIT_KEY: &str = "id";

/// Inference knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    /// Non-null values sampled per column.
    pub sample_size: usize,
    /// Text length above which the unbounded text type is used.
    pub text_threshold: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            sample_size: DEFAULT_SAMPLE_SIZE,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }
}

/// How each batch is written.
#[derive(Debug, Clone, Copy)]
enum WriteMode<'k> {
    Replace,
    Append,
    Upsert(&'k str),
}

/// Orchestrates one import through a sink.
pub struct SyncEngine<'a> {
    sink: &'a mut dyn Sink,
    log: Box<dyn FnMut(&str, LogLevel) + 'a>,
    settings: EngineSettings,
    lines: Vec<LogLine>,
    warnings: usize,
    stats: SyncStats,
}

impl<'a> SyncEngine<'a> {
    /// Create an engine writing through `sink` and reporting through `log`.
    pub fn new(sink: &'a mut dyn Sink, log: impl FnMut(&str, LogLevel) + 'a) -> Self {
        Self {
            sink,
            log: Box::new(log),
            settings: EngineSettings::default(),
            lines: Vec::new(),
            warnings: 0,
            stats: SyncStats::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Run the request to completion.
    ///
    /// Fatal errors end the run and are returned in the report's outcome;
    /// they are never swallowed.
    #[must_use]
    pub fn run(mut self, request: ImportRequest) -> SyncReport {
        let mode = request.mode;
        let outcome = match self.execute(request) {
            Ok(()) => {
                self.emit(
                    LogLevel::Info,
                    format!("[SUCCESS] Operation '{}' finished!", mode.to_string().to_uppercase()),
                );
                Outcome::Success
            }
            Err(err) => {
                self.emit(LogLevel::Error, format!("[ERROR] {err}"));
                Outcome::Failure(err)
            }
        };

        SyncReport {
            lines: self.lines,
            warnings: self.warnings,
            stats: self.stats,
            outcome,
        }
    }

    fn execute(&mut self, request: ImportRequest) -> Result<()> {
        self.stats.records_read = request.records.len();
        self.emit(
            LogLevel::Info,
            format!("[*] {} records loaded.", request.records.len()),
        );

        let key = key_spec(&request)?;
        let ImportRequest {
            records,
            table,
            mode,
            duplicate_policy,
            columns: selection,
            ..
        } = request;

        let mut schema = infer_schema(
            &table,
            &records,
            self.settings.sample_size,
            self.settings.text_threshold,
        );
        apply_selection(&mut schema, &selection);
        schema.primary_key = key.data_column().map(str::to_string);
        self.emit(LogLevel::Info, describe_schema(&schema));

        let (records, removed) = match key.data_column() {
            Some(pk) => {
                let key_type = schema
                    .column(pk)
                    .map_or(ColumnType::Text, |c| c.column_type);
                let resolution = duplicates::resolve(records, pk, key_type, duplicate_policy)?;
                (resolution.records, resolution.removed)
            }
            None => (records, 0),
        };
        self.stats.duplicates_removed = removed;
        let records = stored_records(records, &schema);

        match key.data_column() {
            Some(pk) if removed > 0 => self.emit(
                LogLevel::Info,
                format!(
                    "[*] Duplicate cleanup on '{pk}': removed {removed} records, last occurrence kept."
                ),
            ),
            Some(pk) => self.emit(
                LogLevel::Info,
                format!("[*] Duplicate check on '{pk}': no repeated values."),
            ),
            None => self.emit(
                LogLevel::Info,
                "[*] No key field in the data; duplicate check skipped.".to_string(),
            ),
        }

        let mut columns: Vec<String> = schema
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();

        let effective = match mode {
            Mode::Nuke => {
                self.rebuild(&schema, &key)?;
                Mode::Nuke
            }
            Mode::Append => {
                let target = self.sink.describe_table(&table)?;
                self.prepare_append(&schema, &key, target)?;
                Mode::Append
            }
            Mode::Upsert => {
                let pk = key.data_column().ok_or(Error::PrimaryKeyRequired)?;
                self.emit(LogLevel::Info, format!("[*] UPSERT mode (key: {pk})..."));
                match self.sink.describe_table(&table)? {
                    TargetState::Missing => {
                        self.emit(
                            LogLevel::Info,
                            "[*] Table does not exist. Creating it with NUKE...".to_string(),
                        );
                        self.rebuild(&schema, &key)?;
                        Mode::Nuke
                    }
                    TargetState::Existing(target) => {
                        self.evolve(&schema, pk, &target, &mut columns)?;
                        Mode::Upsert
                    }
                    TargetState::Unknown => {
                        self.assume_columns(&schema, pk, &mut columns);
                        Mode::Upsert
                    }
                }
            }
        };
        self.stats.effective_mode = Some(effective);

        let write_mode = match (effective, key.data_column()) {
            (Mode::Nuke, _) => WriteMode::Replace,
            (Mode::Upsert, Some(pk)) => WriteMode::Upsert(pk),
            (Mode::Append | Mode::Upsert, _) => WriteMode::Append,
        };
        self.write_batches(&table, &columns, &records, write_mode)?;
        self.sink.finish()
    }

    /// Drop and recreate the table. Both steps are fatal on failure.
    fn rebuild(&mut self, schema: &TableSchema, key: &KeySpec) -> Result<()> {
        let table = &schema.name;
        self.emit(LogLevel::Info, format!("[*] NUKE: dropping table '{table}'..."));
        self.sink.drop_table(table).map_err(|source| Error::Ddl {
            action: format!("drop table \"{table}\""),
            source,
        })?;
        self.create(schema, key)
    }

    fn create(&mut self, schema: &TableSchema, key: &KeySpec) -> Result<()> {
        self.emit(LogLevel::Info, "[*] Creating table...".to_string());
        match key {
            KeySpec::Synthesized(name) => self.emit(
                LogLevel::Info,
                format!("[*] Generating serial ID column '{name}'..."),
            ),
            KeySpec::Column(pk) => {
                self.emit(LogLevel::Info, format!("[*] Setting '{pk}' as PRIMARY KEY..."));
            }
        }
        self.sink.create_table(schema, key).map_err(|source| Error::Ddl {
            action: format!("create table \"{}\"", schema.name),
            source,
        })
    }

    fn prepare_append(
        &mut self,
        schema: &TableSchema,
        key: &KeySpec,
        target: TargetState,
    ) -> Result<()> {
        self.emit(
            LogLevel::Info,
            format!("[*] APPEND mode: inserting into '{}'...", schema.name),
        );
        match target {
            TargetState::Missing => {
                self.emit(LogLevel::Info, "[*] Table does not exist yet.".to_string());
                self.create(schema, key)
            }
            TargetState::Existing(existing) => {
                let unknown = unknown_columns(&existing, schema);
                if unknown.is_empty() {
                    Ok(())
                } else {
                    Err(Error::SchemaMismatch {
                        table: schema.name.clone(),
                        columns: unknown,
                    })
                }
            }
            TargetState::Unknown => {
                self.emit(
                    LogLevel::Info,
                    "[*] Target table not inspected; appending without a schema check.".to_string(),
                );
                Ok(())
            }
        }
    }

    /// Verify the key constraint and add missing columns to an existing table.
    fn evolve(
        &mut self,
        schema: &TableSchema,
        pk: &str,
        target: &TargetTable,
        columns: &mut Vec<String>,
    ) -> Result<()> {
        if !target.is_unique(pk) {
            return Err(Error::MissingConstraint {
                table: schema.name.clone(),
                field: pk.to_string(),
            });
        }

        let actions = reconcile(target, schema);
        if actions.is_empty() {
            self.emit(LogLevel::Debug, "[*] Table already has every column.".to_string());
            return Ok(());
        }

        self.emit(
            LogLevel::Info,
            format!("[*] SCHEMA EVOLUTION: detected {} new columns.", actions.len()),
        );
        let dialect = self.sink.dialect();
        for action in actions {
            self.emit(
                LogLevel::Info,
                format!(
                    "    -> Adding column: {} ({})",
                    action.name,
                    dialect.native_type(action.column_type, action.long_text)
                ),
            );
            match self.sink.add_column(&schema.name, &action) {
                Ok(()) => self.stats.columns_added += 1,
                Err(e) => {
                    self.emit(
                        LogLevel::Warning,
                        format!(
                            "[WARN] Failed adding column {}: {}; column skipped for this run.",
                            action.name, e
                        ),
                    );
                    columns.retain(|c| *c != action.name);
                }
            }
        }
        Ok(())
    }

    /// Upsert into a table the sink cannot inspect.
    fn assume_columns(&mut self, schema: &TableSchema, pk: &str, columns: &mut Vec<String>) {
        self.emit(
            LogLevel::Info,
            "[*] Target table not inspected; existence and constraint checks skipped.".to_string(),
        );
        for column in schema.columns().iter().filter(|c| c.name != pk) {
            let action = AddColumn {
                name: column.name.clone(),
                column_type: column.column_type,
                long_text: column.long_text,
            };
            match self.sink.ensure_table_has_column(&schema.name, &action) {
                Ok(()) => {}
                Err(e) if e.kind == DbErrorKind::Unsupported => {
                    self.emit(LogLevel::Warning, format!("[WARN] {e}"));
                }
                Err(e) => {
                    self.emit(
                        LogLevel::Warning,
                        format!(
                            "[WARN] Failed ensuring column {}: {}; column skipped for this run.",
                            action.name, e
                        ),
                    );
                    columns.retain(|c| *c != action.name);
                }
            }
        }
    }

    fn write_batches(
        &mut self,
        table: &str,
        columns: &[String],
        records: &[Record],
        write_mode: WriteMode<'_>,
    ) -> Result<()> {
        let cols: Vec<&str> = columns.iter().map(String::as_str).collect();
        let batch_size = self.sink.batch_size().max(1);
        self.emit(
            LogLevel::Info,
            format!(
                "[*] Processing {} records in batches of {batch_size}...",
                records.len()
            ),
        );

        for (idx, batch) in records.chunks(batch_size).enumerate() {
            let start = idx * batch_size;
            let result = match write_mode {
                WriteMode::Replace => self.sink.bulk_insert(table, &cols, batch, IfExists::Replace),
                WriteMode::Append => self.sink.bulk_insert(table, &cols, batch, IfExists::Append),
                WriteMode::Upsert(pk) => self.sink.upsert_batch(table, &cols, batch, pk),
            };
            let written = result.map_err(|e| batch_error(table, e))?;

            self.stats.batches += 1;
            self.stats.rows_written += written;
            self.emit(
                LogLevel::Info,
                format!(
                    "    -> [BATCH] Records {} to {} processed.",
                    start + 1,
                    start + batch.len()
                ),
            );
        }
        Ok(())
    }

    fn emit(&mut self, level: LogLevel, message: String) {
        trace!(?level, "{message}");
        if level == LogLevel::Warning {
            self.warnings += 1;
        }
        (self.log)(&message, level);
        self.lines.push(LogLine { level, message });
    }
}

/// Pick and validate the key before any destination access.
fn key_spec(request: &ImportRequest) -> Result<KeySpec> {
    let present = |field: &str| {
        request.columns.includes(field) && request.records.iter().any(|r| r.get(field).is_some())
    };

    match &request.primary_key {
        Some(pk) if present(pk) => Ok(KeySpec::Column(pk.clone())),
        Some(pk) => Err(Error::MissingField { field: pk.clone() }),
        None if request.mode == Mode::Upsert => Err(Error::PrimaryKeyRequired),
        None if present(IMPLICIT_KEY) => Ok(KeySpec::Column(IMPLICIT_KEY.to_string())),
        None => Ok(KeySpec::Synthesized(IMPLICIT_KEY.to_string())),
    }
}

/// Convert every value to the form its column stores.
fn stored_records(mut records: Vec<Record>, schema: &TableSchema) -> Vec<Record> {
    for record in &mut records {
        for (name, value) in record.iter_mut() {
            if let Some(column) = schema.column(name) {
                *value = value.stored_as(column.column_type);
            }
        }
    }
    records
}

fn batch_error(table: &str, err: DbError) -> Error {
    match err.kind {
        DbErrorKind::Constraint => Error::Integrity {
            table: table.to_string(),
            message: err.message,
        },
        _ => Error::Destination(err),
    }
}

fn describe_schema(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|c| format!("{} {}", c.name, c.column_type))
        .collect();
    format!(
        "[*] Schema inferred: {} columns ({}).",
        schema.len(),
        columns.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::model::DuplicateKeyPolicy;
    use crate::sink::{Dialect, LiveSink, ScriptSink};
    use crate::storage::{Connection, SqliteConnection};
    use crate::sync::source::parse_records;
    use rusqlite::types::Value as SqlValue;

    fn request(text: &str, mode: Mode, pk: &str) -> ImportRequest {
        ImportRequest::new(parse_records(text).unwrap(), "items", mode, DuplicateKeyPolicy::Strict)
            .with_primary_key(pk)
    }

    fn run_live(conn: &mut SqliteConnection, request: ImportRequest) -> SyncReport {
        let mut sink = LiveSink::new(conn);
        SyncEngine::new(&mut sink, |_, _| {}).run(request)
    }

    fn rows(conn: &SqliteConnection, sql: &str) -> Vec<Vec<SqlValue>> {
        let mut stmt = conn.conn().prepare(sql).unwrap();
        let n = stmt.column_count();
        let result = stmt
            .query_map([], |row| {
                (0..n)
                    .map(|i| row.get::<_, SqlValue>(i))
                    .collect::<rusqlite::Result<Vec<SqlValue>>>()
            })
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();
        result
    }

    fn table(conn: &mut SqliteConnection) -> TargetTable {
        conn.describe_table("items").unwrap().expect("table should exist")
    }

    fn column_names(table: &TargetTable) -> Vec<&str> {
        table.columns.iter().map(|c| c.name.as_str()).collect()
    }

    const AB: &str = r#"[{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]"#;

    #[test]
    fn test_nuke_with_explicit_key() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(&mut conn, request(AB, Mode::Nuke, "id"));

        assert!(report.is_clean());
        assert_eq!(report.stats.rows_written, 2);
        let t = table(&mut conn);
        assert_eq!(column_names(&t), vec!["id", "name"]);
        assert!(t.is_unique("id"));
        assert_eq!(rows(&conn, "SELECT COUNT(*) FROM items"), vec![vec![SqlValue::Integer(2)]]);
    }

    #[test]
    fn test_nuke_synthesizes_identity_without_key() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(
            &mut conn,
            request(r#"[{"name": "a"}, {"name": "b"}]"#, Mode::Nuke, ""),
        );
        assert!(report.is_success());
        let t = table(&mut conn);
        assert_eq!(column_names(&t), vec!["id", "name"]);
        assert!(t.is_unique("id"));
        assert_eq!(
            rows(&conn, "SELECT id FROM items ORDER BY id"),
            vec![vec![SqlValue::Integer(1)], vec![SqlValue::Integer(2)]]
        );
    }

    #[test]
    fn test_implicit_id_becomes_key() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(&mut conn, request(AB, Mode::Nuke, ""));
        assert!(report.is_success());
        assert!(table(&mut conn).is_unique("id"));
        assert_eq!(column_names(&table(&mut conn)), vec!["id", "name"]);
    }

    #[test]
    fn test_append_key_collision_is_integrity_error() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let seeded = run_live(&mut conn, request(r#"[{"id": 1, "name": "a"}]"#, Mode::Nuke, "id"));
        assert!(seeded.is_success());

        let report = run_live(&mut conn, request(AB, Mode::Append, "id"));
        let err = report.into_result().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::IntegrityError);
        assert!(err.hint().unwrap().contains("upsert"));
        assert_eq!(rows(&conn, "SELECT COUNT(*) FROM items"), vec![vec![SqlValue::Integer(1)]]);
    }

    #[test]
    fn test_strict_duplicates_abort_before_any_write() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(
            &mut conn,
            request(r#"[{"id": 1, "v": "x"}, {"id": 1, "v": "y"}]"#, Mode::Upsert, "id"),
        );
        match report.into_result().unwrap_err() {
            Error::DuplicateKey { field, examples, .. } => {
                assert_eq!(field, "id");
                assert_eq!(examples, vec!["1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(conn.describe_table("items").unwrap().is_none());
    }

    #[test]
    fn test_upsert_adds_new_column_and_keeps_others() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        assert!(run_live(&mut conn, request(AB, Mode::Nuke, "id")).is_success());

        let report = run_live(&mut conn, request(r#"[{"id": 1, "tag": "x"}]"#, Mode::Upsert, "id"));
        assert!(report.is_clean());
        assert_eq!(report.stats.columns_added, 1);
        assert_eq!(report.stats.effective_mode, Some(Mode::Upsert));

        assert_eq!(
            rows(&conn, "SELECT id, name, tag FROM items ORDER BY id"),
            vec![
                vec![SqlValue::Integer(1), SqlValue::Text("a".into()), SqlValue::Text("x".into())],
                vec![SqlValue::Integer(2), SqlValue::Text("b".into()), SqlValue::Null],
            ]
        );
    }

    #[test]
    fn test_upsert_on_missing_table_runs_as_nuke() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(&mut conn, request(AB, Mode::Upsert, "id"));

        assert!(report.is_success());
        assert_eq!(report.stats.effective_mode, Some(Mode::Nuke));
        assert!(report
            .lines
            .iter()
            .any(|l| l.message.contains("Table does not exist")));
        assert!(table(&mut conn).is_unique("id"));
        assert_eq!(rows(&conn, "SELECT COUNT(*) FROM items"), vec![vec![SqlValue::Integer(2)]]);
    }

    #[test]
    fn test_nuke_is_idempotent() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let input = r#"[{"id": 1, "name": "a", "meta": {"k": 1}}, {"id": 2, "price": 2.5}]"#;

        assert!(run_live(&mut conn, request(input, Mode::Nuke, "id")).is_success());
        let first_schema = table(&mut conn);
        let first_rows = rows(&conn, "SELECT * FROM items ORDER BY id");

        assert!(run_live(&mut conn, request(input, Mode::Nuke, "id")).is_success());
        assert_eq!(table(&mut conn), first_schema);
        assert_eq!(rows(&conn, "SELECT * FROM items ORDER BY id"), first_rows);
    }

    #[test]
    fn test_upsert_never_removes_or_retypes_columns() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        conn.execute_script(
            "CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT, legacy NUMERIC);
             INSERT INTO items VALUES (1, 'a', 9.5);",
        )
        .unwrap();
        let before = table(&mut conn);

        let report = run_live(&mut conn, request(r#"[{"id": 1, "name": 42}]"#, Mode::Upsert, "id"));
        assert!(report.is_success());

        let after = table(&mut conn);
        for column in &before.columns {
            assert!(after.columns.contains(column), "lost or retyped {}", column.name);
        }
        assert_eq!(
            rows(&conn, "SELECT legacy FROM items"),
            vec![vec![SqlValue::Real(9.5)]]
        );
    }

    #[test]
    fn test_key_only_upsert_leaves_conflicts_untouched() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        assert!(run_live(&mut conn, request(AB, Mode::Nuke, "id")).is_success());

        let report = run_live(&mut conn, request(r#"[{"id": 1}, {"id": 3}]"#, Mode::Upsert, "id"));
        assert!(report.is_success());
        assert_eq!(
            rows(&conn, "SELECT id, name FROM items ORDER BY id"),
            vec![
                vec![SqlValue::Integer(1), SqlValue::Text("a".into())],
                vec![SqlValue::Integer(2), SqlValue::Text("b".into())],
                vec![SqlValue::Integer(3), SqlValue::Null],
            ]
        );
    }

    #[test]
    fn test_upsert_without_unique_key_is_missing_constraint() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        conn.execute_script("CREATE TABLE items (id INTEGER, name TEXT)").unwrap();

        let err = run_live(&mut conn, request(AB, Mode::Upsert, "id"))
            .into_result()
            .unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::MissingConstraint);
        assert_eq!(rows(&conn, "SELECT COUNT(*) FROM items"), vec![vec![SqlValue::Integer(0)]]);
    }

    #[test]
    fn test_key_validation_happens_first() {
        let mut conn = SqliteConnection::open_memory().unwrap();

        let err = run_live(&mut conn, request(AB, Mode::Upsert, ""))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::PrimaryKeyRequired));

        let err = run_live(&mut conn, request(AB, Mode::Nuke, "sku"))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field } if field == "sku"));

        let excluded = request(AB, Mode::Nuke, "id").with_columns(vec!["name".into()]);
        let err = run_live(&mut conn, excluded).into_result().unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::MissingField);

        assert!(conn.describe_table("items").unwrap().is_none());
    }

    #[test]
    fn test_append_rejects_unknown_fields() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        assert!(run_live(&mut conn, request(AB, Mode::Nuke, "id")).is_success());

        let err = run_live(&mut conn, request(r#"[{"id": 5, "tag": "x"}]"#, Mode::Append, "id"))
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { ref columns, .. } if columns == &["tag"]));
    }

    #[test]
    fn test_append_creates_missing_table() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(&mut conn, request(AB, Mode::Append, "id"));
        assert!(report.is_success());
        assert!(!report.lines.iter().any(|l| l.message.contains("dropping")));
        assert_eq!(rows(&conn, "SELECT COUNT(*) FROM items"), vec![vec![SqlValue::Integer(2)]]);
    }

    #[test]
    fn test_failed_batch_keeps_earlier_batches() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        assert!(run_live(&mut conn, request(r#"[{"id": 3}]"#, Mode::Nuke, "id")).is_success());

        let report = {
            let mut sink = LiveSink::new(&mut conn).with_batch_size(2);
            SyncEngine::new(&mut sink, |_, _| {}).run(request(
                r#"[{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]"#,
                Mode::Append,
                "id",
            ))
        };

        assert_eq!(report.stats.batches, 1);
        assert!(report
            .lines
            .iter()
            .any(|l| l.message.contains("[BATCH] Records 1 to 2 processed.")));
        assert_eq!(
            report.into_result().unwrap_err().error_code(),
            ErrorCode::IntegrityError
        );
        assert_eq!(
            rows(&conn, "SELECT id FROM items ORDER BY id"),
            vec![
                vec![SqlValue::Integer(1)],
                vec![SqlValue::Integer(2)],
                vec![SqlValue::Integer(3)],
            ]
        );
    }

    #[test]
    fn test_rejected_column_is_skipped_with_warning() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        // SQLite column names are case-insensitive, so adding "tag" next to
        // "Tag" is refused by the destination.
        conn.execute_script("CREATE TABLE items (id INTEGER PRIMARY KEY, \"Tag\" TEXT)")
            .unwrap();

        let report = run_live(&mut conn, request(r#"[{"id": 1, "tag": "x"}]"#, Mode::Upsert, "id"));
        assert!(report.is_success());
        assert!(!report.is_clean());
        assert_eq!(report.warnings, 1);
        assert_eq!(report.stats.columns_added, 0);
        assert_eq!(
            rows(&conn, "SELECT id, \"Tag\" FROM items"),
            vec![vec![SqlValue::Integer(1), SqlValue::Null]]
        );
    }

    #[test]
    fn test_progress_checkpoints_in_order() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let mut seen: Vec<(String, LogLevel)> = Vec::new();
        let report = {
            let mut sink = LiveSink::new(&mut conn);
            SyncEngine::new(&mut sink, |message, level| seen.push((message.to_string(), level)))
                .run(request(AB, Mode::Nuke, "id"))
        };

        let position = |needle: &str| {
            seen.iter()
                .position(|(m, _)| m.contains(needle))
                .unwrap_or_else(|| panic!("missing checkpoint {needle}"))
        };
        assert!(position("records loaded") < position("Schema inferred"));
        assert!(position("Schema inferred") < position("Duplicate check"));
        assert!(position("Duplicate check") < position("[BATCH]"));
        assert!(position("[BATCH]") < position("[SUCCESS]"));
        assert_eq!(seen.len(), report.lines.len());
    }

    #[test]
    fn test_last_wins_is_reported() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let records = parse_records(r#"[{"id": 1, "v": "x"}, {"id": 1, "v": "y"}]"#).unwrap();
        let req = ImportRequest::new(records, "items", Mode::Nuke, DuplicateKeyPolicy::LastWins)
            .with_primary_key("id");
        let report = run_live(&mut conn, req);

        assert_eq!(report.stats.duplicates_removed, 1);
        assert_eq!(
            rows(&conn, "SELECT v FROM items"),
            vec![vec![SqlValue::Text("y".into())]]
        );
    }

    #[test]
    fn test_script_and_live_upserts_agree() {
        let seed = r#"[{"id": 1, "name": "a", "price": 1}, {"id": 2, "name": "b", "price": 2}]"#;
        let change = r#"[
            {"id": 2, "name": "it's b", "price": 2.5, "meta": {"k": [1, 2]}, "ok": true},
            {"id": 3, "name": null, "price": 3, "meta": "x", "ok": false},
            {"id": 4, "meta": 5}
        ]"#;
        let dir = tempfile::TempDir::new().unwrap();
        let script_path = dir.path().join("upsert.sql");

        let mut live = SqliteConnection::open_memory().unwrap();
        assert!(run_live(&mut live, request(seed, Mode::Nuke, "id")).is_success());
        assert!(run_live(&mut live, request(change, Mode::Upsert, "id")).is_success());

        let mut replay = SqliteConnection::open_memory().unwrap();
        assert!(run_live(&mut replay, request(seed, Mode::Nuke, "id")).is_success());
        let snapshot = TargetState::Existing(table(&mut replay));
        let report = {
            let mut sink = ScriptSink::new(&script_path, Dialect::Sqlite).with_snapshot(snapshot);
            SyncEngine::new(&mut sink, |_, _| {}).run(request(change, Mode::Upsert, "id"))
        };
        assert!(report.is_clean());
        let script = std::fs::read_to_string(&script_path).unwrap();
        replay.execute_script(&script).unwrap();

        let query = "SELECT id, name, price, meta, ok FROM items ORDER BY id";
        assert_eq!(rows(&live, query), rows(&replay, query));
        assert_eq!(rows(&live, query).len(), 4);
        assert_eq!(
            rows(&live, "SELECT meta FROM items WHERE id >= 3 ORDER BY id"),
            vec![
                vec![SqlValue::Text("\"x\"".into())],
                vec![SqlValue::Text("5".into())]
            ]
        );
    }

    #[test]
    fn test_script_upsert_without_snapshot() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.sql");

        let mut sink = ScriptSink::new(&path, Dialect::Sqlite);
        let report = SyncEngine::new(&mut sink, |_, _| {}).run(request(AB, Mode::Upsert, "id"));
        assert!(report.is_success());
        assert_eq!(report.warnings, 1);

        let mut sink = ScriptSink::new(&path, Dialect::Postgres);
        let report = SyncEngine::new(&mut sink, |_, _| {}).run(request(AB, Mode::Upsert, "id"));
        assert!(report.is_clean());
        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.contains("ADD COLUMN IF NOT EXISTS \"name\""));
        assert!(script.contains("ON CONFLICT (\"id\") DO UPDATE SET \"name\" = excluded.\"name\""));
        assert!(!script.contains("DROP TABLE"));
    }

    #[test]
    fn test_script_nuke_batches_by_hundred() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.sql");
        let text = format!(
            "[{}]",
            (0..250)
                .map(|i| format!("{{\"id\": {i}}}"))
                .collect::<Vec<_>>()
                .join(",")
        );

        let mut sink = ScriptSink::new(&path, Dialect::Postgres);
        let report = SyncEngine::new(&mut sink, |_, _| {}).run(request(&text, Mode::Nuke, "id"));
        assert_eq!(report.stats.batches, 3);

        let statements = sink.statements();
        assert_eq!(statements.len(), 5);
        assert!(statements[0].starts_with("DROP TABLE IF EXISTS"));
        assert!(statements[1].starts_with("CREATE TABLE"));
        assert!(statements[2..].iter().all(|s| s.starts_with("INSERT INTO")));
    }

    #[test]
    fn test_postgres_script_renders_whole_json_column_as_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.sql");
        let mut sink = ScriptSink::new(&path, Dialect::Postgres);
        let report = SyncEngine::new(&mut sink, |_, _| {}).run(request(
            r#"[{"id": 1, "meta": {"k": 1}}, {"id": 2, "meta": 5}, {"id": 3, "meta": "x"}, {"id": 4}]"#,
            Mode::Nuke,
            "id",
        ));
        assert!(report.is_clean());

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.contains("\"meta\" JSONB"));
        assert!(script.contains(r#"(1, '{"k":1}'::jsonb)"#));
        assert!(script.contains("(2, '5'::jsonb)"));
        assert!(script.contains(r#"(3, '"x"'::jsonb)"#));
        assert!(script.contains("(4, NULL)"));
    }

    fn with_policy(text: &str, policy: DuplicateKeyPolicy) -> ImportRequest {
        ImportRequest::new(parse_records(text).unwrap(), "items", Mode::Nuke, policy)
            .with_primary_key("id")
    }

    const TEXT_AND_NUMBER: &str = r#"[{"id": 1, "v": "a"}, {"id": "1", "v": "b"}]"#;
    const INT_AND_FLOAT: &str = r#"[{"id": 1, "v": "a"}, {"id": 1.0, "v": "b"}]"#;

    #[test]
    fn test_strict_catches_keys_equal_once_stored() {
        for text in [TEXT_AND_NUMBER, INT_AND_FLOAT] {
            let mut conn = SqliteConnection::open_memory().unwrap();
            assert!(run_live(&mut conn, request(AB, Mode::Nuke, "id")).is_success());

            let report = run_live(&mut conn, with_policy(text, DuplicateKeyPolicy::Strict));
            let err = report.into_result().unwrap_err();
            assert_eq!(err.error_code(), ErrorCode::DuplicateKey, "input {text}");
            // Rejected before the old table was dropped.
            assert_eq!(
                rows(&conn, "SELECT COUNT(*) FROM items"),
                vec![vec![SqlValue::Integer(2)]]
            );
        }
    }

    #[test]
    fn test_last_wins_collapses_keys_equal_once_stored() {
        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(&mut conn, with_policy(TEXT_AND_NUMBER, DuplicateKeyPolicy::LastWins));
        assert!(report.is_success());
        assert_eq!(report.stats.duplicates_removed, 1);
        assert_eq!(
            rows(&conn, "SELECT id, v FROM items"),
            vec![vec![SqlValue::Text("1".into()), SqlValue::Text("b".into())]]
        );

        let mut conn = SqliteConnection::open_memory().unwrap();
        let report = run_live(&mut conn, with_policy(INT_AND_FLOAT, DuplicateKeyPolicy::LastWins));
        assert!(report.is_success());
        assert_eq!(report.stats.duplicates_removed, 1);
        assert_eq!(
            rows(&conn, "SELECT id, v FROM items"),
            vec![vec![SqlValue::Integer(1), SqlValue::Text("b".into())]]
        );
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'w> tracing_subscriber::fmt::MakeWriter<'w> for Captured {
        type Writer = Self;

        fn make_writer(&'w self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_progress_is_not_repeated_in_debug_logs() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(captured.clone())
            .finish();

        let mut conn = SqliteConnection::open_memory().unwrap();
        conn.execute_script("CREATE TABLE items (id INTEGER PRIMARY KEY, \"Tag\" TEXT)")
            .unwrap();
        let report = tracing::subscriber::with_default(subscriber, || {
            run_live(&mut conn, request(r#"[{"id": 1, "tag": "x"}]"#, Mode::Upsert, "id"))
        });
        assert_eq!(report.warnings, 1);

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(!logged.contains("records loaded"));
        assert!(!logged.contains("[WARN]"));
        assert!(!logged.contains("[SUCCESS]"));
    }
}
