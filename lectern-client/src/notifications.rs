//! In-memory notification feed for one session.
//!
//! The feed keeps notifications newest-first, drops ids it already holds,
//! and republishes every new notification to any number of subscribers.

use lectern_core::{Notification, NotificationFrame, RecordId, Timestamp};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

/// Socket URL for a user's notification stream.
///
/// `base` is a host, optionally with a scheme. An explicit scheme wins over
/// `secure`; `http`/`https` are mapped to `ws`/`wss`.
pub fn notification_url(base: &str, secure: bool, user_id: &RecordId) -> String {
    let base = base.trim().trim_end_matches('/');
    let (scheme, host) = match base.split_once("://") {
        Some(("https", host)) => ("wss", host),
        Some(("http", host)) => ("ws", host),
        Some((scheme, host)) => (scheme, host),
        None if secure => ("wss", base),
        None => ("ws", base),
    };
    let separator = if host.contains('?') { '&' } else { '?' };
    format!(
        "{scheme}://{host}{separator}user_id={}",
        urlencoding::encode(user_id.as_str())
    )
}

#[derive(Debug)]
struct FeedInner {
    items: RwLock<Vec<Notification>>,
    sender: broadcast::Sender<Notification>,
}

#[derive(Debug, Clone)]
pub struct NotificationFeed {
    inner: Arc<FeedInner>,
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::new(64)
    }
}

impl NotificationFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(FeedInner {
                items: RwLock::new(Vec::new()),
                sender,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Notification>> {
        self.inner.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Notification>> {
        self.inner.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Receive every notification added after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.sender.subscribe()
    }

    /// Add notifications, skipping ids already present. Returns the ones
    /// that were added, in arrival order.
    pub fn ingest(&self, incoming: Vec<Notification>) -> Vec<Notification> {
        let fresh = {
            let mut items = self.write();
            let mut fresh: Vec<Notification> = Vec::new();
            for notification in incoming {
                let known = items.iter().any(|n| n.id == notification.id)
                    || fresh.iter().any(|n| n.id == notification.id);
                if !known {
                    fresh.push(notification);
                }
            }
            items.splice(0..0, fresh.iter().cloned());
            fresh
        };

        for notification in &fresh {
            // no receivers is fine
            let _ = self.inner.sender.send(notification.clone());
        }
        fresh
    }

    /// Parse one socket frame and ingest it.
    pub fn ingest_frame(&self, text: &str) -> Result<Vec<Notification>, serde_json::Error> {
        let frame: NotificationFrame = serde_json::from_str(text)?;
        Ok(self.ingest(frame.into_vec()))
    }

    /// Replace the feed with a server listing, keeping its order.
    pub fn replace(&self, listing: Vec<Notification>) {
        let mut items = self.write();
        items.clear();
        for notification in listing {
            if !items.iter().any(|n| n.id == notification.id) {
                items.push(notification);
            }
        }
    }

    pub fn items(&self) -> Vec<Notification> {
        self.read().clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<Notification> {
        self.read().iter().find(|n| &n.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn unread_count(&self) -> usize {
        self.read().iter().filter(|n| !n.is_read()).count()
    }

    /// Returns false when the id is unknown or already read.
    pub fn mark_read(&self, id: &RecordId, at: Timestamp) -> bool {
        let mut items = self.write();
        match items.iter_mut().find(|n| &n.id == id) {
            Some(n) if n.read_time.is_none() => {
                n.read_time = Some(at);
                true
            }
            _ => false,
        }
    }

    pub fn mark_all_read(&self, at: Timestamp) -> usize {
        let mut items = self.write();
        let mut marked = 0;
        for n in items.iter_mut().filter(|n| n.read_time.is_none()) {
            n.read_time = Some(at);
            marked += 1;
        }
        marked
    }

    pub fn clear(&self) {
        self.write().clear();
    }
}
