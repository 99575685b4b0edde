//! Type inference over sampled column values.
//!
//! The decision table, in priority order:
//!
//! | sample contains                     | type      |
//! |-------------------------------------|-----------|
//! | any nested object or array          | `Json`    |
//! | only integral numbers               | `Integer` |
//! | only numbers, some fractional       | `Decimal` |
//! | only booleans                       | `Boolean` |
//! | anything else, or nothing non-null  | `Text`    |
//!
//! Strings are never read as numbers; `"7"` is text. Inference never fails.

use tracing::debug;

use crate::model::{Column, ColumnSelection, ColumnType, Record, TableSchema, Value};

/// Default number of non-null values sampled per column.
pub const DEFAULT_SAMPLE_SIZE: usize = 100;

/// Default text length above which a column gets an unbounded text type.
pub const DEFAULT_TEXT_THRESHOLD: usize = 255;

/// Pick the type for a column from its non-null samples.
#[must_use]
pub fn infer_type<'a>(samples: impl IntoIterator<Item = &'a Value>) -> ColumnType {
    let mut seen_any = false;
    let mut all_integral = true;
    let mut all_numeric = true;
    let mut all_bool = true;

    for value in samples {
        match value {
            Value::Null => continue,
            Value::Json(_) => return ColumnType::Json,
            Value::Number(_) => {
                all_bool = false;
                all_integral &= value.is_integral();
            }
            Value::Bool(_) => {
                all_numeric = false;
                all_integral = false;
            }
            Value::Text(_) => {
                all_numeric = false;
                all_integral = false;
                all_bool = false;
            }
        }
        seen_any = true;
    }

    if !seen_any {
        ColumnType::Text
    } else if all_integral {
        ColumnType::Integer
    } else if all_numeric {
        ColumnType::Decimal
    } else if all_bool {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

/// Derive the incoming schema from a record set.
///
/// The column set is the union of every record's fields, in first-seen
/// order. Each column's type comes from its first `sample_size` non-null
/// values; `max_text_len` covers every value.
#[must_use]
pub fn infer_schema(
    table: &str,
    records: &[Record],
    sample_size: usize,
    text_threshold: usize,
) -> TableSchema {
    let mut schema = TableSchema::new(table);

    for record in records {
        for (name, value) in record.iter() {
            if !schema.contains(name) {
                schema.push(Column::new(name, ColumnType::Text));
            }
            if value.is_null() {
                continue;
            }
            if let Some(column) = schema.column_mut(name) {
                column.max_text_len = column.max_text_len.max(value.text_len());
                if column.samples.len() < sample_size {
                    column.samples.push(value.clone());
                }
            }
        }
    }

    let names: Vec<String> = schema.column_names().into_iter().map(str::to_string).collect();
    for name in names {
        if let Some(column) = schema.column_mut(&name) {
            column.column_type = infer_type(&column.samples);
            column.long_text = column.max_text_len > text_threshold;
            debug!(
                column = %column.name,
                column_type = %column.column_type,
                samples = column.samples.len(),
                "Inferred column type"
            );
        }
    }

    schema
}

/// Apply the caller's include list and type overrides.
pub fn apply_selection(schema: &mut TableSchema, selection: &ColumnSelection) {
    schema.retain(|c| selection.includes(&c.name));
    for (name, column_type) in &selection.type_overrides {
        if let Some(column) = schema.column_mut(name) {
            column.column_type = *column_type;
        }
    }
}
