//! Per-column profiling used by `phoenix inspect`.
//!
//! A column is a primary-key candidate when every record carries a non-null,
//! scalar, distinct value for it.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::{ColumnType, Record};
use crate::sync::infer::infer_schema;

/// Field names preferred as a key when they qualify, compared case-insensitively.
pub const PREFERRED_KEYS: [&str; 3] = ["sku", "id", "url"];

/// Statistics for one incoming column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub column_type: ColumnType,
    pub max_text_len: usize,
    /// Records where the field is null or absent.
    pub nulls: usize,
    /// Distinct non-null values.
    pub distinct: usize,
    /// Non-null rows sharing their value with another row.
    pub duplicates: usize,
    /// Holds nested objects or arrays.
    pub structured: bool,
    pub key_candidate: bool,
}

/// Profile of a whole record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub records: usize,
    pub columns: Vec<ColumnProfile>,
    pub suggested_key: Option<String>,
}

/// Profile every column of `records`.
#[must_use]
pub fn profile_records(records: &[Record], sample_size: usize, text_threshold: usize) -> Profile {
    let schema = infer_schema("", records, sample_size, text_threshold);

    let columns: Vec<ColumnProfile> = schema
        .columns()
        .iter()
        .map(|column| {
            let mut counts: HashMap<String, usize> = HashMap::new();
            let mut nulls = 0;
            let mut structured = false;
            for record in records {
                let value = record.value_or_null(&column.name);
                if value.is_null() {
                    nulls += 1;
                    continue;
                }
                structured |= value.is_structured();
                *counts.entry(value.key_as(column.column_type)).or_insert(0) += 1;
            }
            let duplicates = counts.values().filter(|&&n| n > 1).sum();
            ColumnProfile {
                name: column.name.clone(),
                column_type: column.column_type,
                max_text_len: column.max_text_len,
                nulls,
                distinct: counts.len(),
                duplicates,
                structured,
                key_candidate: !records.is_empty() && nulls == 0 && duplicates == 0 && !structured,
            }
        })
        .collect();

    let suggested_key = suggest_key(&columns);
    Profile {
        records: records.len(),
        columns,
        suggested_key,
    }
}

fn suggest_key(columns: &[ColumnProfile]) -> Option<String> {
    let candidates: Vec<&ColumnProfile> = columns.iter().filter(|c| c.key_candidate).collect();
    PREFERRED_KEYS
        .iter()
        .find_map(|preferred| {
            candidates
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(preferred))
        })
        .or_else(|| candidates.first())
        .map(|c| c.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::infer::{DEFAULT_SAMPLE_SIZE, DEFAULT_TEXT_THRESHOLD};
    use crate::sync::source::parse_records;

    fn profile(text: &str) -> Profile {
        let records = parse_records(text).unwrap();
        profile_records(&records, DEFAULT_SAMPLE_SIZE, DEFAULT_TEXT_THRESHOLD)
    }

    #[test]
    fn test_column_statistics() {
        let p = profile(
            r#"[{"n": 1, "c": "a", "t": [1]}, {"n": 2, "c": "a", "t": null}, {"n": 3, "c": "b"}]"#,
        );
        assert_eq!(p.records, 3);
        let c = &p.columns[1];
        assert_eq!((c.nulls, c.distinct, c.duplicates), (0, 2, 2));
        assert!(!c.key_candidate);
        let t = &p.columns[2];
        assert_eq!(t.nulls, 2);
        assert!(t.structured);
        assert!(p.columns[0].key_candidate);
    }

    #[test]
    fn test_preferred_key_wins_over_position() {
        let p = profile(r#"[{"n": 1, "URL": "a", "ID": 5}, {"n": 2, "URL": "b", "ID": 6}]"#);
        assert_eq!(p.suggested_key.as_deref(), Some("ID"));
    }

    #[test]
    fn test_non_unique_preferred_key_is_skipped() {
        let p = profile(r#"[{"sku": "x", "code": 1}, {"sku": "x", "code": 2}]"#);
        assert_eq!(p.suggested_key.as_deref(), Some("code"));
    }

    #[test]
    fn test_equal_stored_values_are_not_unique() {
        let p = profile(r#"[{"id": 1}, {"id": 1.0}, {"id": 2}]"#);
        assert_eq!((p.columns[0].distinct, p.columns[0].duplicates), (2, 2));
        assert_eq!(p.suggested_key, None);
    }

    #[test]
    fn test_no_candidate() {
        let p = profile(r#"[{"a": 1}, {"a": 1}]"#);
        assert_eq!(p.suggested_key, None);
        assert_eq!(profile("[]").suggested_key, None);
    }
}
