//! Redis integration tests.
//!
//! These tests require a running Redis instance.
//! Run with: `cargo test --test redis_integration -- --ignored`
//!
//! Set `REDIS_URL` environment variable to point to your Redis instance.
//! Default: <redis://localhost:6379>

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use sawab_core::{EventPublisher, LocalEventPublisher, MessagePayload, StreamEvent};
use sawab_queue::RedisPubSub;

fn get_redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string())
}

fn message_for(user_id: &str) -> MessagePayload {
    MessagePayload {
        id: "m1".to_string(),
        conversation_id: "c1".to_string(),
        user_id: user_id.to_string(),
        body: "Hello from integration test!".to_string(),
        created_at: chrono::Utc::now().into(),
    }
}

/// Test that we can connect to Redis.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_redis_connection() {
    let pubsub = RedisPubSub::new(&get_redis_url(), "sawab-test", LocalEventPublisher::new(8)).await;
    assert!(pubsub.is_ok(), "Failed to connect to Redis: {:?}", pubsub.err());
}

/// Events published on one manager reach the local subscribers of another.
#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_events_cross_processes() {
    let url = get_redis_url();
    let receiving_local = LocalEventPublisher::new(8);
    let receiving = RedisPubSub::new(&url, "sawab-test", receiving_local.clone())
        .await
        .expect("Failed to connect to Redis");
    receiving.start().await.expect("Failed to subscribe");
    let mut rx = receiving_local.subscribe();

    let sending = RedisPubSub::new(&url, "sawab-test", LocalEventPublisher::new(8))
        .await
        .expect("Failed to connect to Redis");
    sending
        .publish_message("u2", &message_for("u1"))
        .await
        .expect("Failed to publish");

    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("Timed out waiting for event")
        .unwrap();
    assert_eq!(event.recipient_id(), "u2");
    assert!(matches!(event, StreamEvent::Message { .. }));

    receiving.shutdown().await.expect("Failed to shutdown");
    sending.shutdown().await.expect("Failed to shutdown");
}
