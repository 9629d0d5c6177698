//! WebSocket streaming API.
//!
//! Each connection belongs to one authenticated user and receives the
//! notifications and chat messages addressed to that user.

#![allow(missing_docs)]

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use sawab_core::StreamEvent;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::middleware::AppState;

/// Streaming query parameters.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// Access token for authentication.
    #[serde(rename = "i")]
    pub token: String,
}

/// Client-to-server message.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Mark a notification as read.
    ReadNotification { id: String },
    /// Mark every notification as read.
    ReadAllNotifications,
}

/// Server-to-client message.
#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum ServerMessage<'a> {
    /// Sent once after the upgrade.
    Connected { user_id: &'a str },
    /// An event addressed to the connected user.
    Event(&'a StreamEvent),
    /// Unread notification count after a read from this connection.
    UnreadCount { count: u64 },
}

/// WebSocket handler for streaming.
pub async fn streaming_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> Response {
    let user = match state.user_service.authenticate(&query.token).await {
        Ok(user) => user,
        Err(e) => {
            warn!(error = %e, "Streaming auth failed");
            return e.into_response();
        }
    };

    info!(user_id = %user.id, "New streaming connection");
    ws.on_upgrade(move |socket| handle_socket(socket, user.id, state))
}

/// Serialize `event` if it is addressed to `user_id`.
fn frame_for(user_id: &str, event: &StreamEvent) -> Option<String> {
    if event.recipient_id() != user_id {
        return None;
    }
    serde_json::to_string(&ServerMessage::Event(event)).ok()
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, user_id: String, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.events.subscribe();

    let hello = serde_json::to_string(&ServerMessage::Connected { user_id: &user_id })
        .unwrap_or_default();
    if sender.send(Message::Text(hello.into())).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_client_message(client_msg, &user_id, &state).await,
                            Err(e) => {
                                warn!(error = %e, "Failed to parse client message");
                                None
                            }
                        };
                        if let Some(json) = reply
                            && sender.send(Message::Text(json.into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(user_id = %user_id, "Client closed connection");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if let Some(json) = frame_for(&user_id, &event)
                            && sender.send(Message::Text(json.into())).await.is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "Streaming connection lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!(user_id = %user_id, "Streaming connection closed");
}

/// Handle a client message, returning the reply frame if any.
async fn handle_client_message(
    msg: ClientMessage,
    user_id: &str,
    state: &AppState,
) -> Option<String> {
    let result = match msg {
        ClientMessage::ReadNotification { id } => state
            .notification_service
            .mark_as_read(user_id, &id)
            .await
            .map(|_| ()),
        ClientMessage::ReadAllNotifications => state
            .notification_service
            .mark_all_as_read(user_id)
            .await
            .map(|_| ()),
    };
    if let Err(e) = result {
        warn!(error = %e, "Failed to mark notifications as read");
        return None;
    }

    let count = state.notification_service.unread_count(user_id).await.ok()?;
    serde_json::to_string(&ServerMessage::UnreadCount { count }).ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sawab_core::MessagePayload;

    fn message_for(user_id: &str) -> StreamEvent {
        StreamEvent::Message {
            user_id: user_id.to_string(),
            message: MessagePayload {
                id: "m1".to_string(),
                conversation_id: "c1".to_string(),
                user_id: "sender".to_string(),
                body: "On my way".to_string(),
                created_at: Utc::now().into(),
            },
        }
    }

    #[test]
    fn test_frames_are_filtered_by_recipient() {
        assert!(frame_for("u1", &message_for("u2")).is_none());

        let json = frame_for("u1", &message_for("u1")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["body"]["type"], "message");
        assert_eq!(value["body"]["message"]["body"], "On my way");
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"read_notification","body":{"id":"n1"}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ReadNotification { ref id } if id == "n1"));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"read_all_notifications"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ReadAllNotifications));
    }
}
