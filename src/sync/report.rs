//! Progress lines and the final outcome of a sync run.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::model::Mode;

/// Severity of a progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

/// One line sent through the progress channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
}

/// Counters accumulated during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub records_read: usize,
    pub duplicates_removed: usize,
    pub columns_added: usize,
    pub batches: usize,
    pub rows_written: usize,
    /// Mode actually executed; differs from the requested one after the
    /// Upsert → Nuke transition.
    pub effective_mode: Option<Mode>,
}

/// Terminal state of a run.
#[derive(Debug)]
pub enum Outcome {
    Success,
    Failure(Error),
}

/// Everything a run produced. Frozen once returned by the engine.
#[derive(Debug)]
pub struct SyncReport {
    pub lines: Vec<LogLine>,
    /// Recoverable problems (skipped columns, unverifiable columns).
    pub warnings: usize,
    pub stats: SyncStats,
    pub outcome: Outcome,
}

impl SyncReport {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success)
    }

    /// Success with zero warnings.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.is_success() && self.warnings == 0
    }

    /// Collapse the report into the run's result.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that stopped the run.
    pub fn into_result(self) -> Result<SyncStats> {
        match self.outcome {
            Outcome::Success => Ok(self.stats),
            Outcome::Failure(err) => Err(err),
        }
    }

    /// Summary object for `--json` output.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut obj = serde_json::json!({
            "success": self.is_success(),
            "warnings": self.warnings,
            "stats": self.stats,
            "log": self.lines,
        });
        if let Outcome::Failure(err) = &self.outcome {
            obj["error"] = err.to_structured_json()["error"].clone();
        }
        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: Outcome, warnings: usize) -> SyncReport {
        SyncReport {
            lines: vec![LogLine {
                level: LogLevel::Info,
                message: "[*] 2 records loaded.".into(),
            }],
            warnings,
            stats: SyncStats {
                records_read: 2,
                ..SyncStats::default()
            },
            outcome,
        }
    }

    #[test]
    fn test_clean_vs_warned_success() {
        assert!(report(Outcome::Success, 0).is_clean());
        let warned = report(Outcome::Success, 1);
        assert!(warned.is_success());
        assert!(!warned.is_clean());
    }

    #[test]
    fn test_into_result_surfaces_failure() {
        let stats = report(Outcome::Success, 0).into_result().unwrap();
        assert_eq!(stats.records_read, 2);
        let err = report(Outcome::Failure(Error::PrimaryKeyRequired), 0)
            .into_result()
            .unwrap_err();
        assert!(matches!(err, Error::PrimaryKeyRequired));
    }

    #[test]
    fn test_json_summary() {
        let json = report(Outcome::Failure(Error::PrimaryKeyRequired), 0).to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"]["code"], "PRIMARY_KEY_REQUIRED");
        assert_eq!(json["stats"]["records_read"], 2);
        assert_eq!(json["log"][0]["level"], "info");
    }
}
