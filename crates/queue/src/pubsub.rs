//! Redis Pub/Sub for cross-instance event distribution.
//!
//! Every process publishes realtime events to one Redis channel and feeds
//! what it receives from that channel into its [`LocalEventPublisher`], where
//! the websocket connections it holds pick them up.

#![allow(missing_docs)]

use async_trait::async_trait;
use fred::clients::{Client, SubscriberClient};
use fred::error::Error as RedisError;
use fred::interfaces::{ClientLike, EventInterface, PubsubInterface};
use fred::types::config::Config as RedisConfig;
use sawab_common::{AppError, AppResult};
use sawab_core::{EventPublisher, LocalEventPublisher, StreamEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// Channel carrying stream events for the given key prefix.
#[must_use]
pub fn stream_channel(prefix: &str) -> String {
    format!("{prefix}:stream")
}

/// Decode a Pub/Sub payload.
fn decode(payload: &str) -> Option<StreamEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Failed to parse Pub/Sub message");
            None
        }
    }
}

/// Feed decoded messages into `local` until the channel closes.
///
/// A lagging receiver drops the missed messages and keeps going.
async fn relay<T: Clone>(
    mut rx: broadcast::Receiver<T>,
    local: LocalEventPublisher,
    payload: impl Fn(&T) -> Option<String>,
) {
    loop {
        match rx.recv().await {
            Ok(message) => {
                if let Some(event) = payload(&message).as_deref().and_then(decode) {
                    let receivers = local.dispatch(event);
                    debug!(receivers, "Received Pub/Sub event");
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(missed = n, "Pub/Sub relay lagged, events dropped");
            }
            Err(RecvError::Closed) => {
                info!("Pub/Sub message stream ended");
                break;
            }
        }
    }
}

/// Redis Pub/Sub manager for event distribution.
#[derive(Clone)]
pub struct RedisPubSub {
    publisher: Client,
    subscriber: SubscriberClient,
    channel: String,
    local: LocalEventPublisher,
}

impl RedisPubSub {
    /// Create a new Redis Pub/Sub manager delivering into `local`.
    pub async fn new(
        redis_url: &str,
        prefix: &str,
        local: LocalEventPublisher,
    ) -> Result<Self, RedisError> {
        let config = RedisConfig::from_url(redis_url)?;

        let publisher = Client::new(config.clone(), None, None, None);
        publisher.init().await?;

        let subscriber = SubscriberClient::new(config, None, None, None);
        subscriber.init().await?;

        info!("Redis Pub/Sub initialized");

        Ok(Self {
            publisher,
            subscriber,
            channel: stream_channel(prefix),
            local,
        })
    }

    /// Subscribe to the stream channel and start the event loop.
    pub async fn start(&self) -> Result<(), RedisError> {
        self.subscriber.subscribe(self.channel.as_str()).await?;
        info!(channel = %self.channel, "Subscribed to Redis Pub/Sub channel");

        tokio::spawn(relay(
            self.subscriber.message_rx(),
            self.local.clone(),
            |message| message.value.as_string(),
        ));

        Ok(())
    }

    /// Shutdown the Pub/Sub manager.
    pub async fn shutdown(&self) -> Result<(), RedisError> {
        self.subscriber.quit().await?;
        self.publisher.quit().await?;
        info!("Redis Pub/Sub shutdown");
        Ok(())
    }
}

/// Implementation of `EventPublisher` for `RedisPubSub`.
///
/// Events reach local connections through the subscription loop, this process
/// included.
#[async_trait]
impl EventPublisher for RedisPubSub {
    async fn publish(&self, event: StreamEvent) -> AppResult<()> {
        let payload = serde_json::to_string(&event)
            .map_err(|e| AppError::Internal(format!("Serialization error: {e}")))?;
        let _: () = self
            .publisher
            .publish(self.channel.as_str(), payload)
            .await
            .map_err(|e| AppError::Redis(e.to_string()))?;
        debug!(channel = %self.channel, recipient = event.recipient_id(), "Published Pub/Sub event");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sawab_core::MessagePayload;

    #[test]
    fn test_stream_channel_name() {
        assert_eq!(stream_channel("sawab"), "sawab:stream");
    }

    fn message_event() -> StreamEvent {
        StreamEvent::Message {
            user_id: "u2".to_string(),
            message: MessagePayload {
                id: "m1".to_string(),
                conversation_id: "c1".to_string(),
                user_id: "u1".to_string(),
                body: "Running late".to_string(),
                created_at: chrono::Utc::now().into(),
            },
        }
    }

    #[test]
    fn test_decode_round_trips_events() {
        let event = message_event();
        let payload = serde_json::to_string(&event).unwrap();
        assert_eq!(decode(&payload), Some(event));
    }

    #[tokio::test]
    async fn test_relay_survives_lag() {
        let (tx, rx) = broadcast::channel::<String>(2);
        let local = LocalEventPublisher::new(8);
        let mut events = local.subscribe();
        let handle = tokio::spawn(relay(rx, local.clone(), |s: &String| Some(s.clone())));

        // Overflow the channel before the relay gets to read it
        for _ in 0..4 {
            tx.send("not json".to_string()).unwrap();
        }
        let event = message_event();
        tx.send(serde_json::to_string(&event).unwrap()).unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received, event);

        drop(tx);
        handle.await.unwrap();
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("{\"type\":\"note\"}").is_none());
        assert!(decode("not json").is_none());
    }
}
