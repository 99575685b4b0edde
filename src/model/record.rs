//! Input records.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::value::Value;

/// One input object: field name → value, in source order.
///
/// Records in the same input may carry different field sets; the union of
/// all fields defines the logical column set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: IndexMap<String, Value>,
}

impl Record {
    /// Build a record from a JSON object.
    #[must_use]
    pub fn from_object(object: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            fields: object
                .into_iter()
                .map(|(name, value)| (name, Value::from(value)))
                .collect(),
        }
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Look up a field, treating an absent field as null.
    #[must_use]
    pub fn value_or_null(&self, name: &str) -> &Value {
        self.fields.get(name).unwrap_or(&Value::Null)
    }

    /// Field names in source order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Fields and values in source order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Fields in source order, with mutable values.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut Value)> {
        self.fields.iter_mut()
    }

    /// Mutable access to every value.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.fields.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (S, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_object_keeps_order() {
        let serde_json::Value::Object(obj) = json!({"z": 1, "a": "x", "m": null}) else {
            unreachable!()
        };
        let record = Record::from_object(obj);
        let names: Vec<_> = record.field_names().collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_missing_field_reads_as_null() {
        let record: Record = [("a", Value::Bool(true))].into_iter().collect();
        assert!(record.value_or_null("b").is_null());
        assert_eq!(record.get("a"), Some(&Value::Bool(true)));
    }
}
