//! Version command implementation.

use crate::error::Result;
use crate::sink::{Dialect, LIVE_BATCH_SIZE, SCRIPT_BATCH_SIZE};
use serde::Serialize;

#[derive(Serialize)]
struct VersionOutput<'a> {
    version: &'a str,
    build: &'a str,
    dialects: [Dialect; 2],
    live_batch_size: usize,
    script_batch_size: usize,
}

/// Execute the version command.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn execute(json: bool) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    let build = if cfg!(debug_assertions) {
        "dev"
    } else {
        "release"
    };

    if json {
        let output = VersionOutput {
            version,
            build,
            dialects: [Dialect::Postgres, Dialect::Sqlite],
            live_batch_size: LIVE_BATCH_SIZE,
            script_batch_size: SCRIPT_BATCH_SIZE,
        };
        let payload = serde_json::to_string(&output)?;
        println!("{payload}");
        return Ok(());
    }

    println!("phoenix version {version} ({build})");
    Ok(())
}
