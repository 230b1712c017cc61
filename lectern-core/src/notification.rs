//! User notifications delivered over the message socket.

use crate::identity::RecordId;
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: RecordId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub object_title: String,
    pub time: Timestamp,
    #[serde(default)]
    pub read_time: Option<Timestamp>,
    /// Fields this client does not interpret, kept for display.
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl Notification {
    pub fn is_read(&self) -> bool {
        self.read_time.is_some()
    }
}

/// One inbound socket frame: a single notification or a batch.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum NotificationFrame {
    Batch(Vec<Notification>),
    Single(Box<Notification>),
}

impl NotificationFrame {
    pub fn into_vec(self) -> Vec<Notification> {
        match self {
            NotificationFrame::Batch(items) => items,
            NotificationFrame::Single(item) => vec![*item],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_frame_accepts_single_and_batch() {
        let single: NotificationFrame = serde_json::from_value(json!({
            "id": 1,
            "title": "New reply",
            "object_title": "Intro to Rust",
            "time": "2024-05-01T10:00:00Z"
        }))
        .expect("single frame");
        assert_eq!(single.into_vec().len(), 1);

        let batch: NotificationFrame = serde_json::from_value(json!([
            {"id": 1, "title": "a", "object_title": "x", "time": "2024-05-01T10:00:00Z"},
            {"id": 2, "title": "b", "object_title": "y", "time": "2024-05-01T10:01:00Z",
             "read_time": "2024-05-01T11:00:00Z", "link": "/v/2"}
        ]))
        .expect("batch frame");
        let items = batch.into_vec();
        assert_eq!(items.len(), 2);
        assert!(items[1].is_read());
        assert_eq!(items[1].extra.get("link"), Some(&json!("/v/2")));
    }

    #[test]
    fn test_frame_rejects_missing_time() {
        let result = serde_json::from_value::<NotificationFrame>(json!({"id": 1}));
        assert!(result.is_err());
    }
}
