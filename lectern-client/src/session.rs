//! Per-login session context.
//!
//! A `Session` owns everything that must not outlive a login: the list
//! cache, the watch positions, the notification feed and the socket task.
//! Logging out tears all of it down; only the display mode survives.

use crate::api_client::{ClientError, RestClient};
use crate::config::ClientConfig;
use crate::error::LecternResult;
use crate::notifications::{notification_url, NotificationFeed};
use crate::persistence::{LocalStore, LOGIN_EXPIRE_KEY, MODE_KEY, USER_KEY};
use crate::realtime::{spawn_notification_socket, NotificationSocket, SocketExit};
use crate::watch::{WatchPositions, WatchTracker};
use chrono::Utc;
use lectern_cache::{CacheError, InfiniteCache};
use lectern_core::{FetchError, RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// The logged-in user as kept in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl SessionUser {
    pub fn new(id: impl Into<RecordId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            token: None,
            extra: Map::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// Where to send the user after a forced logout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRedirect {
    pub path: String,
}

impl LoginRedirect {
    pub fn preserving(origin: &str) -> Self {
        Self {
            path: format!("/login?redirect={}", urlencoding::encode(origin)),
        }
    }
}

pub struct Session {
    config: ClientConfig,
    rest: RestClient,
    store: LocalStore,
    cache: Arc<InfiniteCache>,
    positions: WatchPositions,
    feed: NotificationFeed,
    user: Option<SessionUser>,
    socket: Option<NotificationSocket>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user.as_ref().map(|u| &u.id))
            .field("notifications", &self.feed.len())
            .field("socket", &self.socket.is_some())
            .finish()
    }
}

impl Session {
    pub fn anonymous(config: ClientConfig) -> LecternResult<Self> {
        let rest = RestClient::new(&config)?;
        let store = LocalStore::open(&config.store_path)?;
        Ok(Self {
            cache: Arc::new(InfiniteCache::new(config.cache_config())),
            feed: NotificationFeed::new(config.notifications.channel_capacity),
            positions: WatchPositions::new(),
            user: None,
            socket: None,
            config,
            rest,
            store,
        })
    }

    /// Open a session, resuming a stored login that has not expired.
    pub fn restore(config: ClientConfig) -> LecternResult<Self> {
        let mut session = Self::anonymous(config)?;
        session.restore_login(Utc::now())?;
        Ok(session)
    }

    fn restore_login(&mut self, now: Timestamp) -> LecternResult<()> {
        let user = self.store.get_as::<SessionUser>(USER_KEY).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Discarding unreadable stored user");
            None
        });
        let expires = self
            .store
            .get_as::<Timestamp>(LOGIN_EXPIRE_KEY)
            .unwrap_or(None);

        match (user, expires) {
            (Some(user), Some(expires)) if expires > now => {
                tracing::info!(user_id = %user.id, "Restored login");
                self.rest.set_token(user.token.clone());
                self.user = Some(user);
            }
            (None, None) => {}
            _ => {
                tracing::info!("Stored login expired");
                self.forget_login()?;
            }
        }
        Ok(())
    }

    /// Record a login. A different user already logged in is logged out
    /// first.
    pub fn login(&mut self, user: SessionUser, expires_at: Timestamp) -> LecternResult<()> {
        if self.user.as_ref().is_some_and(|u| u.id != user.id) {
            self.logout()?;
        }
        self.store.set(USER_KEY, &user)?;
        self.store.set(LOGIN_EXPIRE_KEY, &expires_at)?;
        self.store.save()?;
        self.rest.set_token(user.token.clone());
        tracing::info!(user_id = %user.id, "Logged in");
        self.user = Some(user);
        Ok(())
    }

    /// End the login and drop all per-login state.
    pub fn logout(&mut self) -> LecternResult<()> {
        if let Some(socket) = self.socket.take() {
            socket.signal_shutdown();
        }
        self.cache.clear()?;
        self.positions.clear();
        self.feed.clear();
        self.rest.set_token(None);
        if let Some(user) = self.user.take() {
            tracing::info!(user_id = %user.id, "Logged out");
        }
        self.forget_login()
    }

    fn forget_login(&mut self) -> LecternResult<()> {
        let removed = self.store.remove(USER_KEY) | self.store.remove(LOGIN_EXPIRE_KEY);
        if removed {
            self.store.save()?;
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn cache(&self) -> &Arc<InfiniteCache> {
        &self.cache
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn positions(&self) -> &WatchPositions {
        &self.positions
    }

    /// A tracker bound to this session's positions and login state.
    pub fn tracker(&self) -> WatchTracker {
        WatchTracker::new(
            Arc::new(self.rest.clone()),
            self.config.tracker_config(),
            self.is_authenticated(),
        )
        .with_positions(self.positions.clone())
    }

    pub fn mode(&self) -> Option<String> {
        self.store.get_as::<String>(MODE_KEY).ok().flatten()
    }

    pub fn set_mode(&mut self, mode: &str) -> LecternResult<()> {
        self.store.set(MODE_KEY, &mode)?;
        self.store.save()?;
        Ok(())
    }

    /// Connect the notification socket. Returns false when anonymous or
    /// already connected. Must run inside a Tokio runtime.
    pub fn start_notifications(&mut self) -> bool {
        let Some(user) = &self.user else {
            return false;
        };
        if self.socket.as_ref().is_some_and(|s| !s.is_finished()) {
            return false;
        }
        let url = notification_url(
            &self.config.user_message_url,
            self.config.notifications.secure,
            &user.id,
        );
        self.socket = Some(spawn_notification_socket(
            url,
            self.config.reconnect_delay(),
            self.feed.clone(),
        ));
        true
    }

    pub async fn stop_notifications(&mut self) -> Option<SocketExit> {
        match self.socket.take() {
            Some(socket) => Some(socket.shutdown().await),
            None => None,
        }
    }

    /// Load the notification list from the server.
    pub async fn refresh_notifications(&self) -> Result<usize, ClientError> {
        let listing = self.rest.list_notifications().await?;
        self.feed.replace(listing);
        Ok(self.feed.len())
    }

    /// Mark locally, then tell the server. The server call is best effort.
    pub async fn mark_notification_read(&self, id: &RecordId) -> bool {
        let now = Utc::now();
        if !self.feed.mark_read(id, now) {
            return false;
        }
        if let Err(err) = self.rest.mark_notification_read(id, now).await {
            tracing::warn!(notification_id = %id, error = %err, "Failed to sync read receipt");
        }
        true
    }

    /// Refetch every cache entry whose data or optimistic writes are stale.
    pub async fn revalidate_stale(&self) -> Result<usize, CacheError> {
        let keys = self.cache.stale_keys()?;
        for key in &keys {
            self.cache
                .revalidate(key, Arc::new(self.rest.clone()))
                .await?;
        }
        Ok(keys.len())
    }

    /// React to a failed request. A 401 forces a logout and yields the
    /// login redirect that brings the user back to `origin`.
    pub fn handle_error(&mut self, err: &ClientError, origin: &str) -> Option<LoginRedirect> {
        err.is_unauthorized().then(|| self.force_logout(origin))
    }

    pub fn handle_cache_error(&mut self, err: &CacheError, origin: &str) -> Option<LoginRedirect> {
        matches!(err, CacheError::Fetch(FetchError::Unauthorized)).then(|| self.force_logout(origin))
    }

    fn force_logout(&mut self, origin: &str) -> LoginRedirect {
        tracing::warn!(origin = origin, "Unauthorized response, logging out");
        if let Err(err) = self.logout() {
            tracing::warn!(error = %err, "Logout after unauthorized response failed");
        }
        LoginRedirect::preserving(origin)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(socket) = &self.socket {
            socket.signal_shutdown();
        }
    }
}
