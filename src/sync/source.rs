//! Reading the JSON source.
//!
//! The document root must be an array of objects. Anything else is rejected
//! before a destination is ever touched.

use std::path::Path;

use serde_json::Number;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{Record, Value};

/// Suffix recognised by currency normalization.
const CURRENCY_SUFFIX: &str = "EUR";

/// Parse a JSON document into records.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if the text is not JSON, the root is not
/// an array, or any element is not an object.
pub fn parse_records(text: &str) -> Result<Vec<Record>> {
    let root: serde_json::Value =
        serde_json::from_str(text).map_err(|e| Error::InvalidInput(format!("not valid JSON: {e}")))?;

    let serde_json::Value::Array(items) = root else {
        return Err(Error::InvalidInput(format!(
            "root value must be an array, found {}",
            json_kind(&root)
        )));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| match item {
            serde_json::Value::Object(obj) => Ok(Record::from_object(obj)),
            other => Err(Error::InvalidInput(format!(
                "element {idx} must be an object, found {}",
                json_kind(&other)
            ))),
        })
        .collect()
}

/// Read and parse a JSON file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold an array of
/// objects.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let text = std::fs::read_to_string(path)?;
    let records = parse_records(&text)?;
    debug!(path = %path.display(), count = records.len(), "Parsed source file");
    Ok(records)
}

/// Turn strings like `"28.00 EUR"` or `"28,00 EUR"` into numbers.
///
/// Values that do not parse are left as they are. Returns how many values
/// were converted.
pub fn normalize_currency(records: &mut [Record]) -> usize {
    let mut converted = 0;
    for value in records.iter_mut().flat_map(Record::values_mut) {
        if let Some(number) = parse_currency(value) {
            *value = Value::Number(number);
            converted += 1;
        }
    }
    converted
}

fn parse_currency(value: &Value) -> Option<Number> {
    let Value::Text(s) = value else {
        return None;
    };
    let amount = s.trim().strip_suffix(CURRENCY_SUFFIX)?.trim().replace(',', ".");
    let parsed: f64 = amount.parse().ok()?;
    Number::from_f64(parsed)
}

/// Default table name for a source file: its stem.
#[must_use]
pub fn suggest_table_name(path: &Path) -> String {
    path.file_stem()
        .map_or_else(|| "import".to_string(), |s| s.to_string_lossy().into_owned())
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
