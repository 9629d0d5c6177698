//! Background job tests.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use sawab_common::{BadgeConfig, LifecycleConfig};
use sawab_db::entities::{
    Notification,
    notification::{Notifiable, NotificationAction},
    offer::OfferStatus,
    request::RequestStatus,
};
use sawab_db::test_utils::{
    days_ago, hours_ago, insert_notification, insert_offer, insert_request,
};
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn test_cleanup_keeps_unread_and_recent_notifications() {
    let h = Harness::with_config(
        LifecycleConfig {
            cleanup_batch_size: 2,
            cleanup_pause_ms: 1,
            ..LifecycleConfig::default()
        },
        BadgeConfig::default(),
    )
    .await;
    let user = h.user("user").await;
    let conn = h.db.connection();
    let target = Notifiable::User(user.id.clone());

    for _ in 0..5 {
        insert_notification(
            conn,
            &user.id,
            NotificationAction::UserWarned,
            &target,
            days_ago(40),
            Some(days_ago(39)),
        )
        .await
        .unwrap();
    }
    let unread_old = insert_notification(
        conn,
        &user.id,
        NotificationAction::UserWarned,
        &target,
        days_ago(40),
        None,
    )
    .await
    .unwrap();
    let read_recent = insert_notification(
        conn,
        &user.id,
        NotificationAction::UserWarned,
        &target,
        days_ago(5),
        Some(days_ago(4)),
    )
    .await
    .unwrap();

    let report = h.jobs.cleanup_notifications().await.unwrap();
    assert_eq!(report.succeeded, 5);

    let remaining = Notification::find().all(conn).await.unwrap();
    let mut ids: Vec<_> = remaining.into_iter().map(|n| n.id).collect();
    ids.sort();
    let mut expected = vec![unread_old.id, read_recent.id];
    expected.sort();
    assert_eq!(ids, expected);

    let again = h.jobs.cleanup_notifications().await.unwrap();
    assert_eq!(again.succeeded, 0);
}

#[tokio::test]
async fn test_dispute_escalation_is_deduplicated() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let admin_a = h.admin("admin_a").await;
    let admin_b = h.admin("admin_b").await;
    let category = h.category("Transport").await;

    let (stale, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::Disputed,
            days_ago(4),
        )
        .await;
    // Recent disputes are left alone
    h.request_with_helper(
        &asker,
        &helper,
        &category,
        RequestStatus::Disputed,
        days_ago(1),
    )
    .await;

    // admin_a was told about the dispute a few hours ago
    insert_notification(
        h.db.connection(),
        &admin_a.id,
        NotificationAction::DisputeCreated,
        &Notifiable::Request(stale.id.clone()),
        hours_ago(5),
        None,
    )
    .await
    .unwrap();

    let report = h.jobs.escalate_disputes().await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, 1);

    assert!(
        h.notifications_of(&admin_a.id, NotificationAction::DisputeEscalation)
            .await
            .is_empty()
    );
    assert_eq!(
        h.notifications_of(&admin_b.id, NotificationAction::DisputeEscalation)
            .await
            .len(),
        1
    );

    // A second run inside the window sends nothing new
    let again = h.jobs.escalate_disputes().await.unwrap();
    assert_eq!(again.succeeded, 0);
    assert_eq!(again.skipped, 2);
}

#[tokio::test]
async fn test_inactivity_reminder_respects_cooldown() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let other_helper = h.user("other_helper").await;
    let category = h.category("Transport").await;

    let (quiet, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::InProgress,
            days_ago(6),
        )
        .await;
    let (reminded, _) = h
        .request_with_helper(
            &asker,
            &other_helper,
            &category,
            RequestStatus::InProgress,
            days_ago(10),
        )
        .await;
    // Active requests are not candidates
    h.request_with_helper(
        &asker,
        &helper,
        &category,
        RequestStatus::InProgress,
        days_ago(2),
    )
    .await;

    insert_notification(
        h.db.connection(),
        &other_helper.id,
        NotificationAction::InactiveRequestReminder,
        &Notifiable::Request(reminded.id.clone()),
        days_ago(2),
        None,
    )
    .await
    .unwrap();

    let report = h.jobs.remind_inactive().await.unwrap();
    assert_eq!(report.candidates, 2);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, 1);

    let sent = h
        .notifications_of(&helper.id, NotificationAction::InactiveRequestReminder)
        .await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].notifiable_id, quiet.id);
    assert_eq!(sent[0].actor_id.as_deref(), Some(asker.id.as_str()));

    let again = h.jobs.remind_inactive().await.unwrap();
    assert_eq!(again.succeeded, 0);
    assert_eq!(
        Notification::find()
            .count(h.db.connection())
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_auto_complete_continues_past_broken_items() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let other_helper = h.user("other_helper").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    // Oldest first: two accepted offers break the single-helper invariant
    let broken = insert_request(
        conn,
        &asker.id,
        &category,
        RequestStatus::PendingCompletion,
        days_ago(10),
    )
    .await
    .unwrap();
    insert_offer(conn, &broken.id, &helper.id, OfferStatus::Accepted)
        .await
        .unwrap();
    insert_offer(conn, &broken.id, &other_helper.id, OfferStatus::Accepted)
        .await
        .unwrap();

    // No accepted offer at all: skipped, not failed
    let orphan = insert_request(
        conn,
        &asker.id,
        &category,
        RequestStatus::PendingCompletion,
        days_ago(9),
    )
    .await
    .unwrap();

    let (eligible, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(8),
        )
        .await;

    let report = h.jobs.auto_complete().await.unwrap();
    assert_eq!(report.candidates, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.succeeded, 1);

    assert_eq!(
        h.requests.get(&broken.id).await.unwrap().status,
        RequestStatus::PendingCompletion
    );
    assert_eq!(
        h.requests.get(&orphan.id).await.unwrap().status,
        RequestStatus::PendingCompletion
    );
    assert_eq!(
        h.requests.get(&eligible.id).await.unwrap().status,
        RequestStatus::Completed
    );
    assert_eq!(h.reload_user(&helper.id).await.sawab_balance, 1);
    assert_eq!(h.reload_user(&other_helper.id).await.sawab_balance, 0);
}
