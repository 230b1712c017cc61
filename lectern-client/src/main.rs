//! Lectern client entry point.
//!
//! Restores the stored session, loads notifications and follows the
//! notification socket until interrupted.

use lectern_client::config::ClientConfig;
use lectern_client::error::LecternError;
use lectern_client::session::Session;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LecternError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let config = ClientConfig::load()?;
    tracing::info!(
        api_server = %config.api_server,
        ai_chat_enabled = config.ai_chat_enabled,
        "Configuration loaded"
    );

    let mut session = Session::restore(config)?;
    let Some(user) = session.user().cloned() else {
        tracing::info!("No stored login; nothing to follow");
        return Ok(());
    };
    tracing::info!(user_id = %user.id, name = %user.name, "Session restored");

    match session.refresh_notifications().await {
        Ok(count) => tracing::info!(count, unread = session.feed().unread_count(), "Notifications loaded"),
        Err(err) => {
            if let Some(redirect) = session.handle_error(&err, "/") {
                tracing::warn!(redirect = %redirect.path, "Login required");
                return Ok(());
            }
            tracing::warn!(error = %err, "Failed to load notifications");
        }
    }

    let mut incoming = session.feed().subscribe();
    session.start_notifications();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            received = incoming.recv() => match received {
                Ok(notification) => tracing::info!(
                    id = %notification.id,
                    title = %notification.title,
                    object = %notification.object_title,
                    "Notification"
                ),
                Err(RecvError::Lagged(skipped)) => tracing::warn!(skipped, "Notification listener lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    if let Some(exit) = session.stop_notifications().await {
        tracing::debug!(exit = ?exit, "Notification socket stopped");
    }
    Ok(())
}
