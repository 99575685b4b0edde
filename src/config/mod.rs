//! Configuration management.
//!
//! Settings live in a JSON file, `~/.phoenix/config.json` by default or the
//! path in `PHOENIX_CONFIG`. Every key is optional; a missing file means
//! defaults everywhere.
//!
//! ```json
//! { "live_batch_size": 500, "script_batch_size": 100, "dialect": "postgres" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::sink::{Dialect, LIVE_BATCH_SIZE, SCRIPT_BATCH_SIZE};
use crate::sync::infer::{DEFAULT_SAMPLE_SIZE, DEFAULT_TEXT_THRESHOLD};
use crate::sync::EngineSettings;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "PHOENIX_CONFIG";

/// Environment variable naming the destination database.
pub const DB_ENV: &str = "PHOENIX_DB";

/// Directory scripts are written to when no path is given.
pub const EXPORT_DIR: &str = "exports";

/// Tunables read from the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Rows per committed batch for live writes.
    pub live_batch_size: usize,
    /// Rows per `INSERT` statement in rendered scripts.
    pub script_batch_size: usize,
    /// Non-null values sampled per column for type inference.
    pub sample_size: usize,
    /// Text length above which columns get an unbounded text type.
    pub text_threshold: usize,
    /// Dialect for scripts when `--dialect` is not given.
    pub dialect: Dialect,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            live_batch_size: LIVE_BATCH_SIZE,
            script_batch_size: SCRIPT_BATCH_SIZE,
            sample_size: DEFAULT_SAMPLE_SIZE,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            dialect: Dialect::default(),
        }
    }
}

impl Settings {
    /// Inference settings for the engine.
    #[must_use]
    pub fn engine(&self) -> EngineSettings {
        EngineSettings {
            sample_size: self.sample_size,
            text_threshold: self.text_threshold,
        }
    }

    fn validate(self) -> Result<Self> {
        for (key, value) in [
            ("live_batch_size", self.live_batch_size),
            ("script_batch_size", self.script_batch_size),
            ("sample_size", self.sample_size),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{key} must be greater than zero")));
            }
        }
        Ok(self)
    }
}

/// Default config file location.
fn default_config_path() -> Result<PathBuf> {
    directories::BaseDirs::new()
        .map(|b| b.home_dir().join(".phoenix").join("config.json"))
        .ok_or_else(|| Error::Config("Could not determine home directory".into()))
}

/// Resolve the config file path.
///
/// Priority:
/// 1. `explicit_path` (the `--config` flag)
/// 2. `PHOENIX_CONFIG` environment variable
/// 3. `~/.phoenix/config.json`
///
/// # Errors
///
/// Returns an error if no home directory can be determined.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit_path {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Load settings from a file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be read or parsed, or holds
/// a zero batch or sample size.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Settings::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    let settings: Settings = serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))?;

    settings.validate()
}

/// Load settings from the resolved config location.
///
/// # Errors
///
/// See [`resolve_config_path`] and [`load_settings_from`].
pub fn load_settings(explicit_path: Option<&Path>) -> Result<Settings> {
    load_settings_from(&resolve_config_path(explicit_path)?)
}

/// Resolve the destination database path.
///
/// Priority:
/// 1. `explicit_path` (the `--db` flag)
/// 2. `PHOENIX_DB` environment variable
///
/// There is no default: without either, the import renders a script.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    std::env::var(DB_ENV)
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from)
}

/// Default script location for a table: `exports/<table>.sql`.
#[must_use]
pub fn default_script_path(table: &str) -> PathBuf {
    Path::new(EXPORT_DIR).join(format!("{table}.sql"))
}
