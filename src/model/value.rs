//! Tagged value representation for incoming JSON fields.
//!
//! Every field of every record is converted once, at load time, into a
//! [`Value`]. Type inference dispatches on this tag rather than sniffing raw
//! JSON. Duplicate detection and writes first convert the value to the form
//! its column stores ([`Value::stored_as`]).

use serde::{Deserialize, Serialize};
use serde_json::Number;

use super::schema::ColumnType;

/// A single field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// JSON `null` (or a field absent from a record).
    Null,
    /// JSON boolean.
    Bool(bool),
    /// JSON number, kept in its original textual precision.
    Number(Number),
    /// JSON string.
    Text(String),
    /// Structured document: a nested object or array from the input, or any
    /// value bound for a JSON column.
    Json(serde_json::Value),
}

impl Value {
    /// Whether this value is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Whether this value is a nested object or array.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Json(_))
    }

    /// Whether this is a number with no fractional component.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        match self {
            Self::Number(n) => {
                n.is_i64()
                    || n.is_u64()
                    || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
            }
            _ => false,
        }
    }

    /// Text length used for the bounded/unbounded text decision.
    #[must_use]
    pub fn text_len(&self) -> usize {
        match self {
            Self::Null => 0,
            Self::Bool(b) => b.to_string().len(),
            Self::Number(n) => n.to_string().len(),
            Self::Text(s) => s.chars().count(),
            Self::Json(v) => v.to_string().chars().count(),
        }
    }

    /// The value as a column of `column_type` stores it.
    ///
    /// Text columns hold the text form of scalars, JSON columns hold every
    /// non-null value as a document, and numeric columns hold integral
    /// numbers as integers. Both sinks write this form, so live and script
    /// output agree.
    #[must_use]
    pub fn stored_as(&self, column_type: ColumnType) -> Self {
        match (column_type, self) {
            (_, Self::Null) => Self::Null,
            (ColumnType::Json, Self::Json(v)) => Self::Json(v.clone()),
            (ColumnType::Json, scalar) => Self::Json(scalar.to_json()),
            (ColumnType::Text, Self::Bool(b)) => Self::Text(b.to_string()),
            (ColumnType::Text, Self::Number(n)) => Self::Text(n.to_string()),
            (ColumnType::Text, Self::Json(v)) => Self::Text(v.to_string()),
            (ColumnType::Integer | ColumnType::Decimal, Self::Number(n)) => {
                Self::Number(canonical_number(n))
            }
            (_, other) => other.clone(),
        }
    }

    /// Key used to compare values for equality in a column of `column_type`.
    ///
    /// Two values with the same key are the same value once stored, so they
    /// collide on a primary key.
    #[must_use]
    pub fn key_as(&self, column_type: ColumnType) -> String {
        match (column_type, self.stored_as(column_type)) {
            (ColumnType::Integer | ColumnType::Decimal, Self::Text(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map_or_else(|| format!("{s:?}"), |n| canonical_number(&n).to_string()),
            (_, stored) => stored.repr(),
        }
    }

    /// Human-readable rendering for messages.
    #[must_use]
    pub fn display(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            other => other.repr(),
        }
    }

    fn repr(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => n.to_string(),
            Self::Text(s) => format!("{s:?}"),
            Self::Json(v) => v.to_string(),
        }
    }

    fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Null => serde_json::Value::Null,
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Text(s) => serde_json::Value::String(s.clone()),
            Self::Json(v) => v.clone(),
        }
    }
}

/// Integral floats become integers; everything else is kept as parsed.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn canonical_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    match n.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Number::from(f as i64)
        }
        _ => n.clone(),
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n),
            serde_json::Value::String(s) => Self::Text(s),
            nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Self::Json(nested)
            }
        }
    }
}
