//! Paginated list results.

use crate::identity::RecordId;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Filter and sort options of a list query.
///
/// Backed by an ordered map so that the same logical query always produces
/// the same canonical form, whatever order the options were set in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryOptions(BTreeMap<String, Value>);

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical JSON text of the options. `null` options are dropped, so
    /// "unset" and "explicitly null" are the same query.
    pub fn canonical(&self) -> String {
        let filtered: BTreeMap<&String, &Value> =
            self.0.iter().filter(|(_, v)| !v.is_null()).collect();
        serde_json::to_string(&filtered).unwrap_or_default()
    }

    /// Options rendered as query-string pairs. Strings are passed through,
    /// everything else is JSON-encoded.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let rendered = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), rendered)
            })
            .collect()
    }
}

/// Offset request for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    /// Zero-based page index.
    pub index: usize,
    /// Page size.
    pub limit: u64,
}

impl PageRequest {
    pub fn new(index: usize, limit: u64) -> Self {
        Self { index, limit }
    }

    pub fn skip(&self) -> u64 {
        self.index as u64 * self.limit
    }
}

/// Cursor metadata kept alongside each cached page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    pub skip: u64,
    pub limit: u64,
    /// Any additional cursor fields the server returned, kept verbatim.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

/// One cached page of a list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub items: Vec<Record>,
    /// Total number of items matching the query. Repeated on every page.
    pub total: u64,
    pub cursor: PageCursor,
}

impl Page {
    pub fn new(items: Vec<Record>, total: u64, cursor: PageCursor) -> Self {
        Self {
            items,
            total,
            cursor,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.id().as_ref() == Some(id))
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.position(id).is_some()
    }
}

/// Wire shape of every list endpoint: `{ items, total, ...cursorFields }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse {
    pub items: Vec<Record>,
    pub total: u64,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl ListResponse {
    /// Attach the request's offset to the response, producing a cache page.
    pub fn into_page(self, request: PageRequest) -> Page {
        let mut extra = self.extra;
        extra.remove("skip");
        extra.remove("limit");
        Page {
            items: self.items,
            total: self.total,
            cursor: PageCursor {
                skip: request.skip(),
                limit: request.limit,
                extra,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_is_order_independent() {
        let a = QueryOptions::new().with("sort", "-created").with("channel", 3);
        let b = QueryOptions::new().with("channel", 3).with("sort", "-created");
        assert_eq!(a.canonical(), b.canonical());
    }

    #[test]
    fn test_canonical_drops_nulls() {
        let a = QueryOptions::new().with("q", Value::Null);
        assert_eq!(a.canonical(), QueryOptions::new().canonical());
    }

    #[test]
    fn test_query_pairs() {
        let options = QueryOptions::new()
            .with("q", "rust")
            .with("limit_to_owner", true)
            .with("level", 2);
        let pairs = options.query_pairs();
        assert!(pairs.contains(&("q".to_string(), "rust".to_string())));
        assert!(pairs.contains(&("limit_to_owner".to_string(), "true".to_string())));
        assert!(pairs.contains(&("level".to_string(), "2".to_string())));
    }

    #[test]
    fn test_list_response_into_page() {
        let response: ListResponse = serde_json::from_value(json!({
            "items": [{"id": 1}, {"id": 2}],
            "total": 9,
            "skip": 20,
            "limit": 10,
            "next_cursor": "abc"
        }))
        .expect("list response");
        let page = response.into_page(PageRequest::new(1, 2));

        assert_eq!(page.total, 9);
        assert_eq!(page.cursor.skip, 2);
        assert_eq!(page.cursor.limit, 2);
        assert_eq!(page.cursor.extra.get("next_cursor"), Some(&json!("abc")));
        assert!(page.contains(&RecordId::from(2u64)));
        assert_eq!(page.position(&RecordId::from("1")), Some(0));
    }
}
