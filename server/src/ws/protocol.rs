//! JSON event protocol spoken over the WebSocket.
//!
//! Every frame is a text frame holding one object tagged by `event`.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::db::models::{Notification, NotificationKind};
use crate::state::AppState;
use crate::ws::ConnectionSender;

/// Which channel a notification push arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The recipient's private channel
    User,
    /// Shared channel received by every connected client
    Public,
}

/// Notification fields pushed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub image: Option<String>,
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: String,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.clone(),
            kind: n.kind,
            title: n.title.clone(),
            message: n.message.clone(),
            image: n.image.clone(),
            link: n.link.clone(),
            is_read: n.is_read,
            created_at: n.created_at.clone(),
        }
    }
}

/// Server → client events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    Notification {
        channel: Channel,
        notification: NotificationPayload,
    },
    NotificationRead {
        id: String,
    },
    Error {
        code: u16,
        message: String,
    },
}

impl ServerEvent {
    pub fn notification(channel: Channel, notification: &Notification) -> Self {
        Self::Notification {
            channel,
            notification: notification.into(),
        }
    }

    /// Encode as a text frame. None only if serialization fails.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode server event");
                None
            }
        }
    }
}

/// Client → server events.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientEvent {
    ReadNotification {
        #[serde(rename = "notificationId")]
        notification_id: String,
    },
}

/// Handle an incoming text frame from an authenticated client.
pub async fn handle_text_message(text: &str, tx: &ConnectionSender, state: &AppState, user_id: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(
                user_id = %user_id,
                error = %e,
                "Failed to decode client event"
            );
            send_event(tx, &ServerEvent::Error {
                code: 400,
                message: "Invalid event".to_string(),
            });
            return;
        }
    };

    match event {
        ClientEvent::ReadNotification { notification_id } => {
            handle_read_notification(&notification_id, tx, state, user_id).await;
        }
    }
}

/// Mark one of the caller's own notifications read and acknowledge it.
async fn handle_read_notification(
    notification_id: &str,
    tx: &ConnectionSender,
    state: &AppState,
    user_id: &str,
) {
    let reply = match state.notifications.mark_read(notification_id, user_id).await {
        Ok(Some(notification)) => {
            tracing::debug!(
                user_id = %user_id,
                notification_id = %notification.id,
                "Notification read over WebSocket"
            );
            ServerEvent::NotificationRead { id: notification.id }
        }
        Ok(None) => ServerEvent::Error {
            code: 404,
            message: "Notification not found".to_string(),
        },
        Err(e) => {
            tracing::warn!(user_id = %user_id, error = %e, "Failed to mark notification read");
            ServerEvent::Error {
                code: 500,
                message: "Failed to mark notification as read".to_string(),
            }
        }
    };
    send_event(tx, &reply);
}

fn send_event(tx: &ConnectionSender, event: &ServerEvent) {
    if let Some(msg) = event.to_message() {
        let _ = tx.send(msg);
    }
}
