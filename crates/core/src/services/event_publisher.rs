//! Event publisher service.
//!
//! Provides an abstraction for pushing realtime events to connected clients.
//! Delivery is fire-and-forget: a recipient with no open connection simply
//! misses the event. The cross-process implementation lives in the queue
//! crate (Redis Pub/Sub).

use async_trait::async_trait;
use sawab_common::AppResult;
use sawab_db::entities::message;
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::services::notification::NotificationView;

/// A chat message as pushed to the other participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: String,
    pub conversation_id: String,
    pub user_id: String,
    pub body: String,
    pub created_at: DateTimeWithTimeZone,
}

impl From<&message::Model> for MessagePayload {
    fn from(message: &message::Model) -> Self {
        Self {
            id: message.id.clone(),
            conversation_id: message.conversation_id.clone(),
            user_id: message.user_id.clone(),
            body: message.body.clone(),
            created_at: message.created_at,
        }
    }
}

/// Events addressed to a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A notification was created for the user.
    Notification {
        user_id: String,
        notification: NotificationView,
    },
    /// A chat message was posted in one of the user's conversations.
    Message {
        user_id: String,
        message: MessagePayload,
    },
}

impl StreamEvent {
    /// The user this event is addressed to.
    #[must_use]
    pub fn recipient_id(&self) -> &str {
        match self {
            Self::Notification { user_id, .. } | Self::Message { user_id, .. } => user_id,
        }
    }
}

/// Trait for publishing realtime events.
///
/// This allows the core services to push events
/// without directly depending on the queue/pubsub implementation.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to its recipient.
    async fn publish(&self, event: StreamEvent) -> AppResult<()>;

    /// Publish a rendered notification.
    async fn publish_notification(
        &self,
        user_id: &str,
        notification: &NotificationView,
    ) -> AppResult<()> {
        self.publish(StreamEvent::Notification {
            user_id: user_id.to_string(),
            notification: notification.clone(),
        })
        .await
    }

    /// Publish a chat message.
    async fn publish_message(&self, user_id: &str, message: &MessagePayload) -> AppResult<()> {
        self.publish(StreamEvent::Message {
            user_id: user_id.to_string(),
            message: message.clone(),
        })
        .await
    }
}

/// A no-op implementation of `EventPublisher` for when realtime events are disabled.
#[derive(Clone, Default)]
pub struct NoOpEventPublisher;

#[async_trait]
impl EventPublisher for NoOpEventPublisher {
    async fn publish(&self, _event: StreamEvent) -> AppResult<()> {
        Ok(())
    }
}

/// In-process publisher backed by a broadcast channel.
///
/// Websocket connections held by this process subscribe to it; the Redis
/// bridge feeds it with events published by other processes.
#[derive(Clone)]
pub struct LocalEventPublisher {
    tx: broadcast::Sender<StreamEvent>,
}

impl LocalEventPublisher {
    /// Create a publisher buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Receive every event published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.tx.subscribe()
    }

    /// Hand an event to local subscribers. Returns how many received it.
    pub fn dispatch(&self, event: StreamEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }
}

impl Default for LocalEventPublisher {
    fn default() -> Self {
        Self::new(1024)
    }
}

#[async_trait]
impl EventPublisher for LocalEventPublisher {
    async fn publish(&self, event: StreamEvent) -> AppResult<()> {
        let receivers = self.dispatch(event);
        tracing::trace!(receivers, "Dispatched local stream event");
        Ok(())
    }
}

/// Wrapper for boxed `EventPublisher` trait object.
pub type EventPublisherService = Arc<dyn EventPublisher>;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn payload() -> MessagePayload {
        MessagePayload {
            id: "m1".to_string(),
            conversation_id: "c1".to_string(),
            user_id: "u1".to_string(),
            body: "On my way".to_string(),
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_local_publisher_delivers_to_subscribers() {
        let publisher = LocalEventPublisher::new(8);
        let mut rx = publisher.subscribe();

        publisher.publish_message("u2", &payload()).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.recipient_id(), "u2");
        assert!(matches!(event, StreamEvent::Message { .. }));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let publisher = LocalEventPublisher::new(8);
        assert!(publisher.publish_message("u2", &payload()).await.is_ok());
        assert_eq!(publisher.dispatch(StreamEvent::Message {
            user_id: "u2".to_string(),
            message: payload(),
        }), 0);
    }

    #[test]
    fn test_stream_event_serialization() {
        let event = StreamEvent::Message {
            user_id: "u2".to_string(),
            message: payload(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"message\""));

        let parsed: StreamEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
