//! Lectern Core - Shared Data Model
//!
//! Plain data types shared by the cache, the tracker and the client.
//! Nothing in this crate performs I/O.

pub mod error;
pub mod identity;
pub mod notification;
pub mod page;
pub mod record;
pub mod resource;
pub mod watch;

pub use error::{FetchError, ValidationError};
pub use identity::RecordId;
pub use notification::{Notification, NotificationFrame};
pub use page::{ListResponse, Page, PageCursor, PageRequest, QueryOptions};
pub use record::Record;
pub use resource::{ResourceKind, ServiceId};
pub use watch::{ProgressUpdate, WatchRecord, MAX_TRACKED_DURATION_SECS};

/// Timestamp type using UTC timezone.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
