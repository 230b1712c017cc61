//! Lectern Client
//!
//! Session-scoped client state for the Lectern learning platform: the REST
//! client, the notification socket and feed, the watch-progress tracker and
//! the local store, tied together by [`session::Session`].

pub mod api_client;
pub mod config;
pub mod error;
pub mod notifications;
pub mod persistence;
pub mod realtime;
pub mod session;
pub mod watch;

pub use api_client::{ClientError, RestClient, SERVER_FIELD};
pub use config::{ClientConfig, ConfigError};
pub use error::{LecternError, LecternResult};
pub use notifications::{notification_url, NotificationFeed};
pub use persistence::{LocalStore, PersistenceError};
pub use realtime::{spawn_notification_socket, NotificationSocket, SocketExit};
pub use session::{LoginRedirect, Session, SessionUser};
pub use watch::{
    watched_bitmap, PageEvent, ProgressSink, TrackerConfig, WatchHandle, WatchPositions,
    WatchState, WatchTracker,
};
