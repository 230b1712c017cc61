//! Receive-only notification socket with fixed-delay reconnect.
//!
//! A clean close is followed by a reconnect after `reconnect_delay`. Clean
//! means the stream ended without error or the server sent a close frame
//! with no code, `1000 Normal` or `1001 Away`. Any other close code and any
//! transport error are logged and end the task without a reconnect.

use crate::notifications::NotificationFeed;
use futures_util::{Stream, StreamExt};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

/// Why the socket task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketExit {
    Shutdown,
    ConnectFailed,
    TransportError,
}

/// How one connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Closed {
    Clean,
    Error,
    Shutdown,
}

/// Handle to the running socket task.
#[derive(Debug)]
pub struct NotificationSocket {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<SocketExit>,
}

impl NotificationSocket {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the task to stop without waiting for it.
    pub fn signal_shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Stop the task and wait for it.
    pub async fn shutdown(self) -> SocketExit {
        self.signal_shutdown();
        self.task.await.unwrap_or(SocketExit::Shutdown)
    }
}

pub fn spawn_notification_socket(
    url: String,
    reconnect_delay: Duration,
    feed: NotificationFeed,
) -> NotificationSocket {
    let (shutdown, shutdown_rx) = watch::channel(false);
    let task = tokio::spawn(run_socket(url, reconnect_delay, feed, shutdown_rx));
    NotificationSocket { shutdown, task }
}

async fn run_socket(
    url: String,
    reconnect_delay: Duration,
    feed: NotificationFeed,
    mut shutdown: watch::Receiver<bool>,
) -> SocketExit {
    loop {
        let connected = tokio::select! {
            _ = shutdown.changed() => return SocketExit::Shutdown,
            result = tokio_tungstenite::connect_async(url.as_str()) => result,
        };

        let mut stream = match connected {
            Ok((stream, _)) => {
                tracing::info!(url = %url, "Notification socket connected");
                stream
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "Notification socket failed to connect");
                return SocketExit::ConnectFailed;
            }
        };

        match pump(&mut stream, &feed, &mut shutdown).await {
            Closed::Clean => {
                tracing::info!(
                    delay_ms = reconnect_delay.as_millis() as u64,
                    "Notification socket closed, reconnecting"
                );
                tokio::select! {
                    _ = shutdown.changed() => return SocketExit::Shutdown,
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
            }
            Closed::Error => return SocketExit::TransportError,
            Closed::Shutdown => {
                let _ = stream.close(None).await;
                tracing::info!("Notification socket shut down");
                return SocketExit::Shutdown;
            }
        }
    }
}

/// Feed inbound frames into `feed` until the connection ends.
pub(crate) async fn pump<S>(
    stream: &mut S,
    feed: &NotificationFeed,
    shutdown: &mut watch::Receiver<bool>,
) -> Closed
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            _ = shutdown.changed() => return Closed::Shutdown,
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => match feed.ingest_frame(&text) {
                    Ok(added) => {
                        if !added.is_empty() {
                            tracing::debug!(count = added.len(), "Received notifications");
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "Ignoring invalid notification frame");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    if is_clean_close(frame.as_ref()) {
                        tracing::debug!(frame = ?frame, "Close frame received");
                        return Closed::Clean;
                    }
                    tracing::warn!(frame = ?frame, "Notification socket closed abnormally");
                    return Closed::Error;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::warn!(error = %err, "Notification socket error");
                    return Closed::Error;
                }
                None => return Closed::Clean,
            },
        }
    }
}

fn is_clean_close(frame: Option<&CloseFrame<'_>>) -> bool {
    match frame {
        None => true,
        Some(frame) => matches!(frame.code, CloseCode::Normal | CloseCode::Away),
    }
}
