//! Loosely-shaped resource records as returned by the REST API.
//!
//! List endpoints return many different resource shapes (assets, comments,
//! quiz attempts, ...). The cache only needs three things from them: the
//! `id`, the `parent_id` linkage, and the ability to shallow-merge fields and
//! edit a nested collection by name. A record is therefore kept as the JSON
//! object it arrived as.

use crate::error::ValidationError;
use crate::identity::RecordId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field holding the record identity.
pub const ID_FIELD: &str = "id";

/// Field linking a nested record (e.g. a reply) to its parent.
pub const PARENT_FIELD: &str = "parent_id";

/// A JSON object with an `id`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Create a record holding only its id.
    pub fn new(id: impl Into<RecordId>) -> Self {
        let mut fields = Map::new();
        fields.insert(ID_FIELD.to_string(), id.into().to_value());
        Self(fields)
    }

    /// Create a field-only patch with no id, as returned by updater closures.
    pub fn patch() -> Self {
        Self(Map::new())
    }

    /// Wrap a JSON object, requiring an id.
    pub fn from_fields(fields: Map<String, Value>) -> Result<Self, ValidationError> {
        match fields.get(ID_FIELD).and_then(RecordId::from_value) {
            Some(_) => Ok(Self(fields)),
            None => Err(ValidationError::MissingId),
        }
    }

    /// Wrap a JSON value, requiring an object with an id.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(fields) => Self::from_fields(fields),
            other => Err(ValidationError::NotAnObject {
                found: json_kind(&other),
            }),
        }
    }

    /// Builder-style field setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> Option<RecordId> {
        self.0.get(ID_FIELD).and_then(RecordId::from_value)
    }

    pub fn parent_id(&self) -> Option<RecordId> {
        self.0.get(PARENT_FIELD).and_then(RecordId::from_value)
    }

    /// True when both records carry an id and the ids are equal.
    pub fn same_id(&self, other: &Record) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Shallow merge: every top-level field of `patch` replaces ours.
    ///
    /// The id is never rewritten by a merge.
    pub fn merge(&mut self, patch: &Record) {
        for (key, value) in &patch.0 {
            if key == ID_FIELD {
                continue;
            }
            self.0.insert(key.clone(), value.clone());
        }
    }

    /// Decode the nested collection stored under `field`.
    ///
    /// Returns `None` when the field is absent or is not an array of objects.
    pub fn nested(&self, field: &str) -> Option<Vec<Record>> {
        let value = self.0.get(field)?;
        serde_json::from_value(value.clone()).ok()
    }

    /// Replace the nested collection stored under `field`.
    pub fn set_nested(&mut self, field: &str, items: Vec<Record>) {
        let array = items.into_iter().map(Record::into_value).collect();
        self.0.insert(field.to_string(), Value::Array(array));
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        record.into_value()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_requires_id() {
        assert_eq!(
            Record::from_value(json!({"title": "x"})),
            Err(ValidationError::MissingId)
        );
        assert_eq!(
            Record::from_value(json!([1, 2])),
            Err(ValidationError::NotAnObject { found: "array" })
        );
        let record = Record::from_value(json!({"id": 3, "title": "x"})).expect("valid record");
        assert_eq!(record.id(), Some(RecordId::from(3u64)));
    }

    #[test]
    fn test_merge_is_shallow_and_keeps_id() {
        let mut record = Record::new("a")
            .with("title", "old")
            .with("stats", json!({"likes": 1, "views": 10}));
        let patch = Record::new("b").with("stats", json!({"likes": 2}));

        record.merge(&patch);

        assert_eq!(record.id(), Some(RecordId::from("a")));
        assert_eq!(record.get("title"), Some(&json!("old")));
        assert_eq!(record.get("stats"), Some(&json!({"likes": 2})));
    }

    #[test]
    fn test_nested_roundtrip() {
        let mut parent = Record::new("p").with(
            "children",
            json!([{"id": "c1", "body": "one"}, {"id": "c2", "body": "two"}]),
        );
        let mut children = parent.nested("children").expect("children array");
        children.reverse();
        parent.set_nested("children", children);

        let ids: Vec<_> = parent
            .nested("children")
            .expect("children array")
            .iter()
            .filter_map(Record::id)
            .collect();
        assert_eq!(ids, vec![RecordId::from("c2"), RecordId::from("c1")]);
    }

    #[test]
    fn test_nested_rejects_non_object_arrays() {
        let record = Record::new("p").with("tags", json!(["a", "b"]));
        assert!(record.nested("tags").is_none());
        assert!(record.nested("missing").is_none());
    }
}
