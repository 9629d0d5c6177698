//! Notification fan-out and read model tests.

#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::Harness;
use sawab_common::{AppError, AppResult, CounterCache, CounterKey, InMemoryCounterCache};
use sawab_core::{NotificationIntent, NotificationService, StreamEvent};
use sawab_db::entities::notification::{Notifiable, NotificationAction};
use sawab_db::entities::request::RequestStatus;
use sawab_db::repositories::RequestRepository;
use sawab_db::test_utils::{days_ago, insert_notification, insert_request};
use sea_orm::DatabaseConnection;

#[tokio::test]
async fn test_notify_invalidates_cache_and_pushes() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;
    let request = insert_request(
        h.db.connection(),
        &asker.id,
        &category,
        RequestStatus::Open,
        days_ago(0),
    )
    .await
    .unwrap();

    assert_eq!(h.notifications.unread_count(&asker.id).await.unwrap(), 0);
    let key = CounterKey::unread_notifications(&asker.id);
    assert_eq!(h.cache.get(&key).await.unwrap(), Some(0));

    let mut rx = h.events.subscribe();
    let stored = h
        .notifications
        .notify(
            NotificationIntent::new(
                NotificationAction::NewOffer,
                asker.id.clone(),
                Notifiable::Request(request.id.clone()),
            )
            .by(helper.id.clone()),
        )
        .await
        .unwrap();

    assert_eq!(h.cache.get(&key).await.unwrap(), None);
    assert_eq!(h.notifications.unread_count(&asker.id).await.unwrap(), 1);

    let event = rx.recv().await.unwrap();
    assert_eq!(event.recipient_id(), asker.id);
    match event {
        StreamEvent::Notification { notification, .. } => {
            assert_eq!(notification.id, stored.id);
            assert_eq!(notification.url, format!("/requests/{}", request.id));
            assert_eq!(notification.target.unwrap().label, "Need a ride");
        }
        StreamEvent::Message { .. } => unreachable!("expected a notification event"),
    }
}

#[tokio::test]
async fn test_intent_without_recipient_is_dropped() {
    let h = Harness::new().await;
    let intent = NotificationIntent {
        action: NotificationAction::UserWarned,
        recipient_id: None,
        actor_id: None,
        target: Some(Notifiable::Report("missing".to_string())),
    };

    assert!(h.notifications.notify(intent).await.is_none());
}

#[tokio::test]
async fn test_mark_read_and_delete_update_unread_count() {
    let h = Harness::new().await;
    let user = h.user("user").await;
    let other = h.user("other").await;
    let target = Notifiable::User(other.id.clone());

    let first = h
        .notifications
        .notify(NotificationIntent::new(
            NotificationAction::UserWarned,
            user.id.clone(),
            target.clone(),
        ))
        .await
        .unwrap();
    let second = h
        .notifications
        .notify(NotificationIntent::new(
            NotificationAction::UserWarned,
            user.id.clone(),
            target,
        ))
        .await
        .unwrap();
    assert_eq!(h.notifications.unread_count(&user.id).await.unwrap(), 2);

    let view = h.notifications.mark_as_read(&user.id, &first.id).await.unwrap();
    assert!(view.is_read);
    assert_eq!(h.notifications.unread_count(&user.id).await.unwrap(), 1);

    // Marking twice is a no-op
    h.notifications.mark_as_read(&user.id, &first.id).await.unwrap();
    assert_eq!(h.notifications.unread_count(&user.id).await.unwrap(), 1);

    // Deleting a read notification leaves the unread count alone
    h.notifications.delete(&user.id, &first.id).await.unwrap();
    assert_eq!(h.notifications.unread_count(&user.id).await.unwrap(), 1);

    let err = h
        .notifications
        .mark_as_read(&other.id, &second.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    assert_eq!(h.notifications.mark_all_as_read(&user.id).await.unwrap(), 1);
    assert_eq!(h.notifications.unread_count(&user.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_dangling_target_renders_without_target() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let category = h.category("Transport").await;
    let request = insert_request(
        h.db.connection(),
        &asker.id,
        &category,
        RequestStatus::Open,
        days_ago(0),
    )
    .await
    .unwrap();

    h.notifications
        .notify(NotificationIntent::new(
            NotificationAction::RequestCompleted,
            asker.id.clone(),
            Notifiable::Request(request.id.clone()),
        ))
        .await
        .unwrap();

    RequestRepository::new(h.db.arc())
        .delete(request)
        .await
        .unwrap();

    let views = h
        .notifications
        .list(&asker.id, 20, None, false)
        .await
        .unwrap();
    assert_eq!(views.len(), 1);
    assert!(views[0].target.is_none());
    assert_eq!(views[0].url, "/notifications");
}

#[tokio::test]
async fn test_unread_only_listing() {
    let h = Harness::new().await;
    let user = h.user("user").await;
    let target = Notifiable::User(user.id.clone());

    let read = h
        .notifications
        .notify(NotificationIntent::new(
            NotificationAction::UserWarned,
            user.id.clone(),
            target.clone(),
        ))
        .await
        .unwrap();
    h.notifications
        .notify(NotificationIntent::new(
            NotificationAction::UserWarned,
            user.id.clone(),
            target,
        ))
        .await
        .unwrap();
    h.notifications.mark_as_read(&user.id, &read.id).await.unwrap();

    let all = h.notifications.list(&user.id, 20, None, false).await.unwrap();
    let unread = h.notifications.list(&user.id, 20, None, true).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(unread.len(), 1);
    assert!(!unread[0].is_read);
}

/// Counter cache where a notification lands, and invalidates, right before
/// the first store.
struct InterleavedWriteCache {
    inner: InMemoryCounterCache,
    db: Arc<DatabaseConnection>,
    recipient_id: String,
    fired: AtomicBool,
}

#[async_trait]
impl CounterCache for InterleavedWriteCache {
    async fn get(&self, key: &CounterKey) -> AppResult<Option<u64>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &CounterKey, value: u64) -> AppResult<()> {
        if !self.fired.swap(true, Ordering::SeqCst) {
            insert_notification(
                self.db.as_ref(),
                &self.recipient_id,
                NotificationAction::UserWarned,
                &Notifiable::User(self.recipient_id.clone()),
                days_ago(0),
                None,
            )
            .await
            .unwrap();
            self.inner.invalidate(key).await?;
        }
        self.inner.set(key, value).await
    }

    async fn invalidate(&self, key: &CounterKey) -> AppResult<()> {
        self.inner.invalidate(key).await
    }
}

#[tokio::test]
async fn test_unread_count_does_not_cache_over_a_concurrent_write() {
    let h = Harness::new().await;
    let user = h.user("user").await;
    let cache = Arc::new(InterleavedWriteCache {
        inner: InMemoryCounterCache::new(),
        db: h.db.arc(),
        recipient_id: user.id.clone(),
        fired: AtomicBool::new(false),
    });
    let notifications = NotificationService::new(h.db.arc(), cache.clone());

    assert_eq!(notifications.unread_count(&user.id).await.unwrap(), 1);
    assert_ne!(
        cache.get(&CounterKey::unread_notifications(&user.id)).await.unwrap(),
        Some(0)
    );
    assert_eq!(notifications.unread_count(&user.id).await.unwrap(), 1);
}
