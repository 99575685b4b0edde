//! Duplicate primary-key detection and resolution.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::model::{ColumnType, DuplicateKeyPolicy, Record};

/// Maximum number of offending values quoted in a duplicate-key error.
pub const MAX_DUPLICATE_EXAMPLES: usize = 5;

/// Duplicated key values found in a record set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DuplicateReport {
    /// Rows that share their key with at least one other row.
    pub flagged_rows: usize,
    /// Every distinct duplicated value, in first-seen order.
    pub values: Vec<String>,
}

impl DuplicateReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Records left after resolution and how many were dropped.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub records: Vec<Record>,
    pub removed: usize,
}

/// Find every key value carried by more than one record.
///
/// Values are compared as a `key_type` column stores them, so `1` and `1.0`
/// collide in a numeric key and `1` and `"1"` collide in a text key.
/// Records without the field, or with a null key, never collide.
#[must_use]
pub fn find_duplicates(records: &[Record], pk: &str, key_type: ColumnType) -> DuplicateReport {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<(String, String)> = Vec::new();

    for record in records {
        let Some(value) = record.get(pk).filter(|v| !v.is_null()) else {
            continue;
        };
        let key = value.key_as(key_type);
        let count = counts.entry(key.clone()).or_insert(0);
        *count += 1;
        if *count == 2 {
            order.push((key, value.display()));
        }
    }

    DuplicateReport {
        flagged_rows: counts.values().filter(|&&n| n > 1).sum(),
        values: order.into_iter().map(|(_, shown)| shown).collect(),
    }
}

/// Apply a duplicate-key policy.
///
/// # Errors
///
/// Returns [`Error::DuplicateKey`] under [`DuplicateKeyPolicy::Strict`] when
/// any key value repeats.
pub fn resolve(
    records: Vec<Record>,
    pk: &str,
    key_type: ColumnType,
    policy: DuplicateKeyPolicy,
) -> Result<Resolution> {
    match policy {
        DuplicateKeyPolicy::Strict => {
            let report = find_duplicates(&records, pk, key_type);
            if !report.is_empty() {
                return Err(Error::DuplicateKey {
                    field: pk.to_string(),
                    rows: report.flagged_rows,
                    examples: report
                        .values
                        .into_iter()
                        .take(MAX_DUPLICATE_EXAMPLES)
                        .collect(),
                });
            }
            Ok(Resolution {
                records,
                removed: 0,
            })
        }
        DuplicateKeyPolicy::LastWins => Ok(keep_last(records, pk, key_type)),
    }
}

fn keep_last(records: Vec<Record>, pk: &str, key_type: ColumnType) -> Resolution {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    for (idx, record) in records.iter().enumerate() {
        if let Some(value) = record.get(pk).filter(|v| !v.is_null()) {
            last_index.insert(value.key_as(key_type), idx);
        }
    }

    let total = records.len();
    let kept: Vec<Record> = records
        .into_iter()
        .enumerate()
        .filter(|(idx, record)| match record.get(pk).filter(|v| !v.is_null()) {
            Some(value) => last_index.get(&value.key_as(key_type)) == Some(idx),
            None => true,
        })
        .map(|(_, record)| record)
        .collect();

    Resolution {
        removed: total - kept.len(),
        records: kept,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Value;
    use crate::sync::source::parse_records;

    #[test]
    fn test_find_duplicates_counts_every_flagged_row() {
        let records = parse_records(
            r#"[{"id": 1}, {"id": 2}, {"id": 1}, {"id": 3}, {"id": 2}, {"id": 1}, {"id": null}, {"id": null}, {}]"#,
        )
        .unwrap();
        let report = find_duplicates(&records, "id", ColumnType::Integer);
        assert_eq!(report.flagged_rows, 5);
        assert_eq!(report.values, vec!["1", "2"]);
    }

    #[test]
    fn test_keys_compare_by_stored_value() {
        let records = parse_records(r#"[{"id": 1}, {"id": "1"}]"#).unwrap();
        assert!(find_duplicates(&records, "id", ColumnType::Json).is_empty());
        let report = find_duplicates(&records, "id", ColumnType::Text);
        assert_eq!(report.flagged_rows, 2);
        assert_eq!(report.values, vec!["1"]);

        let records = parse_records(r#"[{"id": 1}, {"id": 1.0}, {"id": 1.5}]"#).unwrap();
        let report = find_duplicates(&records, "id", ColumnType::Decimal);
        assert_eq!(report.flagged_rows, 2);
    }

    #[test]
    fn test_last_wins_merges_equivalent_numbers() {
        let records =
            parse_records(r#"[{"id": 1, "v": "a"}, {"id": 1.0, "v": "b"}]"#).unwrap();
        let resolution =
            resolve(records, "id", ColumnType::Integer, DuplicateKeyPolicy::LastWins).unwrap();
        assert_eq!(resolution.removed, 1);
        assert_eq!(resolution.records[0].get("v"), Some(&Value::Text("b".into())));
    }

    #[test]
    fn test_strict_policy_fails_with_examples() {
        let records = parse_records(r#"[{"id": 1, "v": "x"}, {"id": 1, "v": "y"}]"#).unwrap();
        let err = resolve(records, "id", ColumnType::Integer, DuplicateKeyPolicy::Strict).unwrap_err();
        match err {
            Error::DuplicateKey {
                field,
                rows,
                examples,
            } => {
                assert_eq!(field, "id");
                assert_eq!(rows, 2);
                assert_eq!(examples, vec!["1"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_strict_examples_are_capped() {
        let text: Vec<String> = (0..8)
            .flat_map(|i| [format!("{{\"k\": \"v{i}\"}}"), format!("{{\"k\": \"v{i}\"}}")])
            .collect();
        let records = parse_records(&format!("[{}]", text.join(","))).unwrap();
        let Err(Error::DuplicateKey { rows, examples, .. }) =
            resolve(records, "k", ColumnType::Text, DuplicateKeyPolicy::Strict)
        else {
            panic!("expected duplicate key error")
        };
        assert_eq!(rows, 16);
        assert_eq!(examples.len(), MAX_DUPLICATE_EXAMPLES);
        assert_eq!(examples[0], "v0");
    }

    #[test]
    fn test_last_wins_keeps_last_occurrence_in_order() {
        let records = parse_records(
            r#"[{"id": 1, "v": "a"}, {"id": 2, "v": "b"}, {"id": 1, "v": "c"}, {"v": "no key"}]"#,
        )
        .unwrap();
        let resolution = resolve(records, "id", ColumnType::Integer, DuplicateKeyPolicy::LastWins).unwrap();
        assert_eq!(resolution.removed, 1);
        let values: Vec<&Value> = resolution
            .records
            .iter()
            .map(|r| r.value_or_null("v"))
            .collect();
        assert_eq!(
            values,
            vec![
                &Value::Text("b".into()),
                &Value::Text("c".into()),
                &Value::Text("no key".into())
            ]
        );
    }

    #[test]
    fn test_clean_input_passes_both_policies() {
        let records = parse_records(r#"[{"id": 1}, {"id": 2}]"#).unwrap();
        assert_eq!(
            resolve(records.clone(), "id", ColumnType::Integer, DuplicateKeyPolicy::Strict)
                .unwrap()
                .records
                .len(),
            2
        );
        assert_eq!(
            resolve(records, "id", ColumnType::Integer, DuplicateKeyPolicy::LastWins)
                .unwrap()
                .removed,
            0
        );
    }
}
