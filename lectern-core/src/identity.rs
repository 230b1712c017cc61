//! Record identifiers.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Identifier of a server-side record.
///
/// The REST API is not consistent about id types: some resources use integer
/// ids and others use strings. Both are normalized to their string form so
/// `7` and `"7"` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id out of a JSON value. Only strings and numbers qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self(s.clone())),
            Value::Number(n) => Some(Self(n.to_string())),
            _ => None,
        }
    }

    /// JSON form used when writing the id back into a record.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.clone())
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        RecordId::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("record id must be a string or a number"))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for RecordId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_numeric_and_string_ids_match() {
        let a: RecordId = serde_json::from_value(json!(42)).expect("numeric id");
        let b: RecordId = serde_json::from_value(json!("42")).expect("string id");
        assert_eq!(a, b);
        assert_eq!(a, RecordId::from(42u64));
    }

    #[test]
    fn test_rejects_non_scalar_ids() {
        assert!(serde_json::from_value::<RecordId>(json!({"id": 1})).is_err());
        assert!(serde_json::from_value::<RecordId>(json!(null)).is_err());
        assert!(RecordId::from_value(&json!(true)).is_none());
    }
}
