//! Staff and member direct message tests.

#![allow(clippy::unwrap_used)]

mod common;

use common::Harness;
use sawab_common::{AppError, CounterCache, CounterKey};
use sawab_core::SendAdminMessageInput;

fn to(recipient_id: &str, body: &str) -> SendAdminMessageInput {
    SendAdminMessageInput {
        recipient_id: recipient_id.to_string(),
        body: body.to_string(),
    }
}

#[tokio::test]
async fn test_only_staff_and_members_talk() {
    let h = Harness::new().await;
    let alice = h.user("alice").await;
    let bob = h.user("bob").await;
    let admin = h.admin("admin").await;
    let moderator = h.moderator("moderator").await;

    let err = h.admin_messages.send(&alice, to(&bob.id, "Hello bob")).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = h
        .admin_messages
        .send(&admin, to(&moderator.id, "Hello colleague"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = h.admin_messages.send(&alice, to(&alice.id, "Hello me")).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = h.admin_messages.send(&alice, to("missing", "Hello there")).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = h.admin_messages.send(&alice, to(&admin.id, "hey")).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let message = h
        .admin_messages
        .send(&alice, to(&admin.id, "I need help with my account"))
        .await
        .unwrap();
    assert_eq!(message.member_id, alice.id);
    assert_eq!(message.staff_id(), admin.id);
}

#[tokio::test]
async fn test_send_and_read_keep_the_counter_fresh() {
    let h = Harness::new().await;
    let alice = h.user("alice").await;
    let admin = h.admin("admin").await;
    let key = CounterKey::unread_admin_messages(&alice.id);

    assert_eq!(h.admin_messages.unread_count(&alice.id).await.unwrap(), 0);
    assert_eq!(h.cache.get(&key).await.unwrap(), Some(0));

    h.admin_messages
        .send(&admin, to(&alice.id, "Your request was edited"))
        .await
        .unwrap();
    assert_eq!(h.cache.get(&key).await.unwrap(), None);
    assert_eq!(h.admin_messages.unread_count(&alice.id).await.unwrap(), 1);

    // The notification counter is a separate entry
    assert_eq!(h.notifications.unread_count(&alice.id).await.unwrap(), 0);

    let thread = h.admin_messages.thread(&alice, &admin.id).await.unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(h.cache.get(&key).await.unwrap(), None);
    assert_eq!(h.admin_messages.unread_count(&alice.id).await.unwrap(), 0);

    // Nothing left to mark
    assert_eq!(h.admin_messages.mark_thread_read(&alice, &admin.id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_staff_share_one_thread_per_member() {
    let h = Harness::new().await;
    let alice = h.user("alice").await;
    let admin = h.admin("admin").await;
    let moderator = h.moderator("moderator").await;

    h.admin_messages
        .send(&admin, to(&alice.id, "Welcome to the community"))
        .await
        .unwrap();
    h.admin_messages
        .send(&moderator, to(&alice.id, "Please add a city"))
        .await
        .unwrap();
    h.admin_messages
        .send(&alice, to(&moderator.id, "Done, thank you"))
        .await
        .unwrap();

    // Alice sees one thread per staff user
    let threads = h.admin_messages.threads(&alice, 20).await.unwrap();
    assert_eq!(threads.len(), 2);
    let with_moderator = threads.iter().find(|t| t.counterpart_id == moderator.id).unwrap();
    assert_eq!(with_moderator.unread, 1);
    assert_eq!(
        h.admin_messages.thread(&alice, &moderator.id).await.unwrap().len(),
        2
    );

    // Staff see the whole conversation with alice
    let threads = h.admin_messages.threads(&admin, 20).await.unwrap();
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].counterpart_id, alice.id);
    assert_eq!(h.admin_messages.thread(&admin, &alice.id).await.unwrap().len(), 3);

    // Reading alice's thread as admin leaves the moderator's unread reply alone
    assert_eq!(h.admin_messages.unread_count(&moderator.id).await.unwrap(), 1);
    let marked = h.admin_messages.mark_thread_read(&moderator, &alice.id).await.unwrap();
    assert_eq!(marked, 1);
    assert_eq!(h.admin_messages.unread_count(&moderator.id).await.unwrap(), 0);

    let err = h.admin_messages.thread(&admin, &moderator.id).await.unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
}
