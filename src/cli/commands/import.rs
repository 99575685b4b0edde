//! Import command implementation.
//!
//! Chooses the sink from the flags:
//! - `--db` only: write live to the SQLite database
//! - `--script`: render a script; with `--db` as well, the target table is
//!   read (never written) to plan the upsert precisely
//! - neither: render a script to `exports/<table>.sql`

use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use colored::Colorize;
use tracing::{debug, info};

use crate::cli::ImportArgs;
use crate::config::{default_script_path, resolve_db_path, Settings};
use crate::error::{Error, Result};
use crate::model::{ImportRequest, Mode, TargetState};
use crate::sink::{Dialect, LiveSink, ScriptSink, Sink};
use crate::storage::SqliteConnection;
use crate::sync::{
    content_hash, normalize_currency, parse_records, suggest_table_name, LogLevel, SyncEngine,
    SyncReport,
};

/// Execute the import command.
///
/// The source is fully read and validated before any database is opened.
///
/// # Errors
///
/// Returns the error that stopped the run.
pub fn execute(args: &ImportArgs, settings: &Settings, json: bool, quiet: bool) -> Result<()> {
    let bytes = std::fs::read(&args.file)?;
    let text = std::str::from_utf8(&bytes)
        .map_err(|e| Error::InvalidInput(format!("file is not UTF-8: {e}")))?;
    let mut records = parse_records(text)?;

    if args.clean_currency {
        let converted = normalize_currency(&mut records);
        info!(converted, "Normalized currency values");
    }

    let table = args
        .table
        .clone()
        .unwrap_or_else(|| suggest_table_name(&args.file));
    let mode = Mode::from(args.mode);
    let request = build_request(args, records, &table, mode);

    let show = !json && !quiet;
    let printer = move |message: &str, level: LogLevel| {
        if show {
            print_line(message, level);
        }
    };

    let db_path = resolve_db_path(args.db.as_deref());
    let (report, script) = match (db_path, &args.script) {
        (Some(db), None) => {
            debug!(db = %db.display(), "Writing live");
            let mut conn = SqliteConnection::open(&db)?;
            let mut sink = LiveSink::new(&mut conn).with_batch_size(settings.live_batch_size);
            let report = SyncEngine::new(&mut sink, printer)
                .with_settings(settings.engine())
                .run(request);
            (report, None)
        }
        (db, script) => {
            let path = script
                .as_ref()
                .filter(|p| !p.as_os_str().is_empty())
                .cloned()
                .unwrap_or_else(|| default_script_path(&table));
            let dialect = args.dialect.map_or_else(
                || {
                    if db.is_some() {
                        Dialect::Sqlite
                    } else {
                        settings.dialect
                    }
                },
                Dialect::from,
            );

            let mut sink = ScriptSink::new(&path, dialect)
                .with_batch_size(settings.script_batch_size)
                .with_comment(format!("Generated by phoenix {}", env!("CARGO_PKG_VERSION")))
                .with_comment(format!(
                    "Created: {}",
                    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
                ))
                .with_comment(format!("Mode: {mode}, table: {table}, dialect: {dialect}"))
                .with_comment(format!(
                    "Source: {} (sha256 {})",
                    args.file.display(),
                    content_hash(&bytes)
                ));
            if let Some(db) = db {
                sink = sink.with_snapshot(snapshot(&db, &table)?);
            }

            let report = SyncEngine::new(&mut sink, printer)
                .with_settings(settings.engine())
                .run(request);
            (report, Some(path))
        }
    };

    finish(report, script.as_deref(), json, quiet)
}

fn build_request(
    args: &ImportArgs,
    records: Vec<crate::model::Record>,
    table: &str,
    mode: Mode,
) -> ImportRequest {
    let mut request = ImportRequest::new(records, table, mode, args.on_duplicate.into());
    if let Some(pk) = &args.pk {
        request = request.with_primary_key(pk);
    }
    if !args.columns.is_empty() {
        request = request.with_columns(args.columns.clone());
    }
    for (field, column_type) in &args.types {
        request = request.with_type_override(field, *column_type);
    }
    request
}

/// Read the current shape of `table` without writing to the database.
fn snapshot(db: &Path, table: &str) -> Result<TargetState> {
    let mut conn = SqliteConnection::open_read_only(db)?;
    let state = LiveSink::new(&mut conn).describe_table(table)?;
    debug!(table, ?state, "Read target snapshot");
    Ok(state)
}

fn print_line(message: &str, level: LogLevel) {
    match level {
        // Errors are printed once, with their hint, by the entry point.
        LogLevel::Debug | LogLevel::Error => {}
        LogLevel::Warning => println!("{}", message.yellow()),
        LogLevel::Info if message.starts_with("[SUCCESS]") => {
            println!("{}", message.green().bold());
        }
        LogLevel::Info => println!("{message}"),
    }
}

fn finish(report: SyncReport, script: Option<&Path>, json: bool, quiet: bool) -> Result<()> {
    if json {
        let mut output = report.to_json();
        if let Some(path) = script {
            output["script"] = serde_json::Value::String(path.display().to_string());
        }
        println!("{}", serde_json::to_string(&output)?);
    } else if !quiet && report.is_success() {
        let stats = &report.stats;
        println!();
        println!(
            "  Rows written: {}  Batches: {}  Columns added: {}",
            stats.rows_written, stats.batches, stats.columns_added
        );
        if stats.duplicates_removed > 0 {
            println!("  Duplicates removed: {}", stats.duplicates_removed);
        }
        if report.warnings > 0 {
            println!(
                "  {}",
                format!("Warnings: {}", report.warnings).yellow()
            );
        }
        if let Some(path) = script {
            println!("  Script: {}", display_path(path).bold());
        }
    }

    report.into_result().map(|_| ())
}

fn display_path(path: &Path) -> String {
    std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok().map(PathBuf::from))
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}
