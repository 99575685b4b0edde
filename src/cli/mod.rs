//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::model::{ColumnType, DuplicateKeyPolicy, Mode};
use crate::sink::Dialect;

pub mod commands;

/// Phoenix - reconcile JSON records into a SQL table
#[derive(Parser, Debug)]
#[command(name = "phoenix", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path (default: ~/.phoenix/config.json)
    #[arg(long, global = true, env = "PHOENIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a JSON array into a table
    Import(ImportArgs),

    /// Profile the columns of a JSON file without touching a database
    Inspect {
        /// JSON file holding an array of objects
        file: PathBuf,

        /// Turn "28,00 EUR" style strings into numbers first
        #[arg(long)]
        clean_currency: bool,
    },

    /// Print version information
    Version,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file holding an array of objects
    pub file: PathBuf,

    /// How to reconcile with the destination table
    #[arg(long, value_enum)]
    pub mode: ModeArg,

    /// What to do when the key repeats in the input (no default: choose)
    #[arg(long = "on-duplicate", value_enum)]
    pub on_duplicate: DuplicateArg,

    /// Destination table (default: the file name without extension)
    #[arg(long)]
    pub table: Option<String>,

    /// Primary-key field (required for upsert)
    #[arg(long)]
    pub pk: Option<String>,

    /// SQLite database to write to
    #[arg(long, env = "PHOENIX_DB")]
    pub db: Option<PathBuf>,

    /// Render a SQL script instead of writing (default: exports/<table>.sql)
    #[arg(long, num_args = 0..=1, default_missing_value = "", value_parser = clap::builder::TypedValueParser::map(clap::builder::OsStringValueParser::new(), PathBuf::from))]
    pub script: Option<PathBuf>,

    /// SQL dialect for scripts (default from config)
    #[arg(long, value_enum)]
    pub dialect: Option<DialectArg>,

    /// Only import these fields (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    /// Force a column type: FIELD=text|integer|decimal|boolean|json
    #[arg(long = "type", value_name = "FIELD=KIND", value_parser = parse_type_override)]
    pub types: Vec<(String, ColumnType)>,

    /// Turn "28,00 EUR" style strings into numbers first
    #[arg(long)]
    pub clean_currency: bool,
}

/// Reconciliation mode.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    /// Drop and recreate the table
    Nuke,
    /// Insert only; fails on key collisions
    Append,
    /// Insert or update by key, adding new columns
    Upsert,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Nuke => Self::Nuke,
            ModeArg::Append => Self::Append,
            ModeArg::Upsert => Self::Upsert,
        }
    }
}

/// Duplicate-key policy.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateArg {
    /// Abort when a key value repeats
    Strict,
    /// Keep the last record for each key
    LastWins,
}

impl From<DuplicateArg> for DuplicateKeyPolicy {
    fn from(arg: DuplicateArg) -> Self {
        match arg {
            DuplicateArg::Strict => Self::Strict,
            DuplicateArg::LastWins => Self::LastWins,
        }
    }
}

/// Script dialect.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DialectArg {
    Postgres,
    Sqlite,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Self::Postgres,
            DialectArg::Sqlite => Self::Sqlite,
        }
    }
}

fn parse_type_override(s: &str) -> Result<(String, ColumnType), String> {
    let (field, kind) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=KIND, got '{s}'"))?;
    if field.is_empty() {
        return Err(format!("missing field name in '{s}'"));
    }
    Ok((field.to_string(), kind.parse()?))
}
