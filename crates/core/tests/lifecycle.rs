//! Request lifecycle integration tests.
//!
//! Run against an in-memory `SQLite` database migrated with the production
//! migrator.

#![allow(clippy::unwrap_used, clippy::panic)]

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::Harness;
use sawab_common::{AppError, AppResult, BadgeConfig, CounterCache, CounterKey, LifecycleConfig};
use sawab_core::{
    BadgeEngine, CompletionTrigger, CreateOfferInput, CreateRequestInput, EventPublisher,
    NotificationService, RequestService, StreamEvent,
};
use sawab_db::entities::{
    institution_member::MemberRole, notification::NotificationAction, offer::OfferStatus,
    request::RequestStatus, user::UserRole,
};
use sawab_db::repositories::OfferRepository;
use sawab_db::test_utils::{
    TestDatabase, days_ago, insert_badge, insert_category, insert_institution, insert_member,
    insert_offer, insert_request, insert_user,
};

#[tokio::test]
async fn test_accepting_an_offer_rejects_the_others() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper_a = h.user("helper_a").await;
    let helper_b = h.user("helper_b").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let request = insert_request(conn, &asker.id, &category, RequestStatus::Open, days_ago(1))
        .await
        .unwrap();
    let o1 = insert_offer(conn, &request.id, &helper_a.id, OfferStatus::Pending)
        .await
        .unwrap();
    let o2 = insert_offer(conn, &request.id, &helper_b.id, OfferStatus::Pending)
        .await
        .unwrap();

    let outcome = h.offers.accept(&asker.id, &o1.id).await.unwrap();
    assert_eq!(outcome.offer.status, OfferStatus::Accepted);
    assert_eq!(outcome.request.status, RequestStatus::InProgress);
    assert!(outcome.request.entered_in_progress_at.is_some());
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].id, o2.id);

    let o2_now = h.offers.get(&o2.id).await.unwrap();
    assert_eq!(o2_now.status, OfferStatus::Rejected);

    let err = h.offers.accept(&asker.id, &o2.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(ref m) if m == "Request is not open"));

    assert_eq!(
        h.notifications_of(&helper_a.id, NotificationAction::OfferAccepted)
            .await
            .len(),
        1
    );
    assert_eq!(
        h.notifications_of(&helper_b.id, NotificationAction::OfferRejected)
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_concurrent_acceptances_leave_one_accepted_offer() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper_a = h.user("helper_a").await;
    let helper_b = h.user("helper_b").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let request = insert_request(conn, &asker.id, &category, RequestStatus::Open, days_ago(1))
        .await
        .unwrap();
    let o1 = insert_offer(conn, &request.id, &helper_a.id, OfferStatus::Pending)
        .await
        .unwrap();
    let o2 = insert_offer(conn, &request.id, &helper_b.id, OfferStatus::Pending)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        h.offers.accept(&asker.id, &o1.id),
        h.offers.accept(&asker.id, &o2.id)
    );
    assert_eq!(u8::from(first.is_ok()) + u8::from(second.is_ok()), 1);

    let accepted = h
        .offers
        .list_for_request(&request.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|o| o.status == OfferStatus::Accepted)
        .count();
    assert_eq!(accepted, 1);
}

#[tokio::test]
async fn test_auto_complete_credits_helper_once() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(8),
        )
        .await;

    let report = h.jobs.auto_complete().await.unwrap();
    assert_eq!(report.candidates, 1);
    assert_eq!(report.succeeded, 1);

    let request = h.requests.get(&request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Completed);
    assert!(request.completed_at.is_some());
    assert_eq!(h.reload_user(&helper.id).await.sawab_balance, 1);

    assert_eq!(
        h.notifications_of(&asker.id, NotificationAction::RequestAutoCompleted)
            .await
            .len(),
        1
    );
    assert_eq!(
        h.notifications_of(&helper.id, NotificationAction::RequestCompleted)
            .await
            .len(),
        1
    );

    // A second run finds nothing left to complete
    let again = h.jobs.auto_complete().await.unwrap();
    assert_eq!(again.candidates, 0);
    assert_eq!(h.reload_user(&helper.id).await.sawab_balance, 1);
}

#[tokio::test]
async fn test_auto_complete_waits_for_grace_period() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(3),
        )
        .await;

    let report = h.jobs.auto_complete().await.unwrap();
    assert_eq!(report.candidates, 0);

    let request = h.requests.get(&request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::PendingCompletion);
    assert_eq!(h.reload_user(&helper.id).await.sawab_balance, 0);
}

#[tokio::test]
async fn test_category_mastery_badge_is_awarded_once() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Транспорт").await;
    let conn = h.db.connection();
    let mastery = insert_badge(conn, "Эксперт: Транспорт").await.unwrap();

    for _ in 0..4 {
        h.request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::Completed,
            days_ago(20),
        )
        .await;
    }

    let (fifth, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(1),
        )
        .await;
    let completion = h
        .requests
        .complete(CompletionTrigger::Asker(asker.id.clone()), &fifth.id)
        .await
        .unwrap();
    assert_eq!(completion.badges.len(), 1);
    assert_eq!(completion.badges[0].badge.id, mastery.id);

    let (sixth, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(1),
        )
        .await;
    let completion = h
        .requests
        .complete(CompletionTrigger::Asker(asker.id.clone()), &sixth.id)
        .await
        .unwrap();
    assert!(completion.badges.is_empty());

    let held = h.badges.user_badges(&helper.id).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(
        h.notifications_of(&helper.id, NotificationAction::BadgeUnlocked)
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_badge_evaluation_is_idempotent() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();
    insert_badge(conn, "Первый Sawab").await.unwrap();

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::Completed,
            days_ago(1),
        )
        .await;

    let engine = sawab_core::BadgeEngine::new(h.db.arc(), sawab_common::BadgeConfig::default());
    let first = engine.evaluate(conn, &helper.id, 1, &request).await.unwrap();
    let second = engine.evaluate(conn, &helper.id, 1, &request).await.unwrap();

    assert_eq!(first.len(), 1);
    assert!(second.is_empty());
    assert_eq!(h.badges.user_badges(&helper.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_completions_credit_once() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let admin = h.admin("admin").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(2),
        )
        .await;

    let (by_asker, by_staff) = tokio::join!(
        h.requests
            .complete(CompletionTrigger::Asker(asker.id.clone()), &request.id),
        h.requests
            .complete(CompletionTrigger::Staff(admin.id.clone()), &request.id)
    );

    let (ok, err) = match (by_asker, by_staff) {
        (Ok(ok), Err(err)) | (Err(err), Ok(ok)) => (ok, err),
        other => panic!("expected exactly one completion, got {other:?}"),
    };
    assert_eq!(ok.balance, 1);
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(h.reload_user(&helper.id).await.sawab_balance, 1);
}

#[tokio::test]
async fn test_balance_matches_completed_accepted_offers() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    for _ in 0..3 {
        let (request, _) = h
            .request_with_helper(
                &asker,
                &helper,
                &category,
                RequestStatus::InProgress,
                days_ago(2),
            )
            .await;
        h.requests
            .complete(CompletionTrigger::Asker(asker.id.clone()), &request.id)
            .await
            .unwrap();
    }
    // One request cancelled before completion does not count
    let (cancelled, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::InProgress,
            days_ago(2),
        )
        .await;
    h.requests.cancel(&asker, &cancelled.id).await.unwrap();

    let balance = h.reload_user(&helper.id).await.sawab_balance;
    let completed = OfferRepository::new(h.db.arc())
        .count_completed(&helper.id)
        .await
        .unwrap();
    assert_eq!(balance, 3);
    assert_eq!(u64::try_from(balance).unwrap(), completed);
}

#[tokio::test]
async fn test_only_the_asker_confirms_completion() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(1),
        )
        .await;

    let err = h
        .requests
        .complete(CompletionTrigger::Asker(helper.id.clone()), &request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let request = h.requests.get(&request.id).await.unwrap();
    assert_eq!(request.status, RequestStatus::PendingCompletion);
    assert_eq!(h.reload_user(&helper.id).await.sawab_balance, 0);
}

#[tokio::test]
async fn test_mark_pending_requires_seven_days_in_progress() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let stranger = h.user("stranger").await;
    let category = h.category("Transport").await;

    let (recent, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::InProgress,
            days_ago(3),
        )
        .await;
    let err = h
        .requests
        .mark_pending(&helper.id, &recent.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let (old, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::InProgress,
            days_ago(8),
        )
        .await;
    let err = h
        .requests
        .mark_pending(&stranger.id, &old.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let marked = h.requests.mark_pending(&helper.id, &old.id).await.unwrap();
    assert_eq!(marked.status, RequestStatus::PendingCompletion);
    assert!(marked.pending_completion_at.is_some());
    assert_eq!(
        h.notifications_of(&asker.id, NotificationAction::PendingCompletion)
            .await
            .len(),
        1
    );
}

#[tokio::test]
async fn test_dispute_and_admin_resolution() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let admin = h.admin("admin").await;
    let category = h.category("Transport").await;

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(1),
        )
        .await;

    let disputed = h.requests.open_dispute(&helper.id, &request.id).await.unwrap();
    assert_eq!(disputed.status, RequestStatus::Disputed);
    assert_eq!(
        h.notifications_of(&admin.id, NotificationAction::DisputeCreated)
            .await
            .len(),
        1
    );

    // The asker cannot confirm a disputed request
    let err = h
        .requests
        .complete(CompletionTrigger::Asker(asker.id.clone()), &request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));

    let completion = h
        .requests
        .complete(CompletionTrigger::for_actor(&admin, &disputed), &request.id)
        .await
        .unwrap();
    assert_eq!(completion.request.status, RequestStatus::Completed);
    assert_eq!(completion.helper_id, helper.id);
}

#[tokio::test]
async fn test_cancel_permissions() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let stranger = h.user("stranger").await;
    let admin = h.admin("admin").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let open = insert_request(conn, &asker.id, &category, RequestStatus::Open, days_ago(1))
        .await
        .unwrap();
    let err = h.requests.cancel(&stranger, &open.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    let cancelled = h.requests.cancel(&asker, &open.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);

    let (disputed, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::Disputed,
            days_ago(1),
        )
        .await;
    let err = h.requests.cancel(&asker, &disputed.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    let cancelled = h.requests.cancel(&admin, &disputed.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
}

#[tokio::test]
async fn test_offer_creation_rules_and_withdrawal() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let request = insert_request(conn, &asker.id, &category, RequestStatus::Open, days_ago(1))
        .await
        .unwrap();
    let input = || CreateOfferInput {
        message: "I can drive you on Monday".to_string(),
    };

    let err = h
        .offers
        .create(&asker.id, &request.id, input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let offer = h.offers.create(&helper.id, &request.id, input()).await.unwrap();
    assert_eq!(offer.status, OfferStatus::Pending);
    assert_eq!(h.requests.get(&request.id).await.unwrap().offers_count, 1);
    assert_eq!(
        h.notifications_of(&asker.id, NotificationAction::NewOffer)
            .await
            .len(),
        1
    );

    let err = h
        .offers
        .create(&helper.id, &request.id, input())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    h.offers.withdraw(&helper.id, &offer.id).await.unwrap();
    assert_eq!(h.requests.get(&request.id).await.unwrap().offers_count, 0);
}

#[tokio::test]
async fn test_institution_request_notifies_other_members() {
    let h = Harness::new().await;
    let representative = h.user("rep").await;
    let colleague = h.user("colleague").await;
    let member = h.user("member").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let institution = insert_institution(conn, "Care home", true).await.unwrap();
    insert_member(conn, &institution.id, &representative.id, MemberRole::Representative)
        .await
        .unwrap();
    insert_member(conn, &institution.id, &colleague.id, MemberRole::Admin)
        .await
        .unwrap();
    insert_member(conn, &institution.id, &member.id, MemberRole::Member)
        .await
        .unwrap();

    let input = || CreateRequestInput {
        title: "Wheelchair transport".to_string(),
        description: "Transport for three residents to the clinic".to_string(),
        category_id: category.clone(),
        region: "Tatarstan".to_string(),
        city: "Kazan".to_string(),
        institution_id: Some(institution.id.clone()),
    };

    let request = h.requests.create(&representative.id, input()).await.unwrap();
    assert_eq!(request.status, RequestStatus::Open);
    assert_eq!(request.institution_id.as_deref(), Some(institution.id.as_str()));

    for id in [&colleague.id, &member.id] {
        assert_eq!(
            h.notifications_of(id, NotificationAction::InstitutionRequestCreated)
                .await
                .len(),
            1
        );
    }
    assert!(
        h.notifications_of(&representative.id, NotificationAction::InstitutionRequestCreated)
            .await
            .is_empty()
    );

    let err = h.requests.create(&member.id, input()).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_withdraw_racing_accept_keeps_the_accepted_offer() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let request = insert_request(conn, &asker.id, &category, RequestStatus::Open, days_ago(1))
        .await
        .unwrap();
    let offer = insert_offer(conn, &request.id, &helper.id, OfferStatus::Pending)
        .await
        .unwrap();

    let (accepted, withdrawn) = tokio::join!(
        h.offers.accept(&asker.id, &offer.id),
        h.offers.withdraw(&helper.id, &offer.id)
    );
    assert_eq!(u8::from(accepted.is_ok()) + u8::from(withdrawn.is_ok()), 1);

    let request = h.requests.get(&request.id).await.unwrap();
    let offers = h.offers.list_for_request(&request.id).await.unwrap();
    if accepted.is_ok() {
        assert!(matches!(withdrawn, Err(AppError::InvalidState(_))));
        assert_eq!(request.status, RequestStatus::InProgress);
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].status, OfferStatus::Accepted);
    } else {
        assert_eq!(request.status, RequestStatus::Open);
        assert!(offers.is_empty());
        assert_eq!(request.offers_count, 0);
    }
}

#[tokio::test]
async fn test_reject_racing_accept_never_overwrites_acceptance() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;
    let conn = h.db.connection();

    let request = insert_request(conn, &asker.id, &category, RequestStatus::Open, days_ago(1))
        .await
        .unwrap();
    let offer = insert_offer(conn, &request.id, &helper.id, OfferStatus::Pending)
        .await
        .unwrap();

    let (accepted, rejected) = tokio::join!(
        h.offers.accept(&asker.id, &offer.id),
        h.offers.reject(&asker.id, &offer.id)
    );
    assert_eq!(u8::from(accepted.is_ok()) + u8::from(rejected.is_ok()), 1);

    let request = h.requests.get(&request.id).await.unwrap();
    let offer = h.offers.get(&offer.id).await.unwrap();
    if accepted.is_ok() {
        assert_eq!(request.status, RequestStatus::InProgress);
        assert_eq!(offer.status, OfferStatus::Accepted);
    } else {
        assert_eq!(request.status, RequestStatus::Open);
        assert_eq!(offer.status, OfferStatus::Rejected);
    }
}

#[tokio::test]
async fn test_withdrawing_an_accepted_offer_fails() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    let (request, offer) = h
        .request_with_helper(&asker, &helper, &category, RequestStatus::InProgress, days_ago(1))
        .await;

    let err = h.offers.withdraw(&helper.id, &offer.id).await.unwrap_err();
    assert!(matches!(err, AppError::InvalidState(_)));
    assert_eq!(
        h.offers.get(&offer.id).await.unwrap().status,
        OfferStatus::Accepted
    );
    assert_eq!(
        h.requests.get(&request.id).await.unwrap().status,
        RequestStatus::InProgress
    );
}

#[tokio::test]
async fn test_cancel_racing_auto_complete_applies_one_outcome() {
    let h = Harness::new().await;
    let asker = h.user("asker").await;
    let helper = h.user("helper").await;
    let category = h.category("Transport").await;

    let (request, _) = h
        .request_with_helper(
            &asker,
            &helper,
            &category,
            RequestStatus::PendingCompletion,
            days_ago(8),
        )
        .await;

    let (cancelled, report) = tokio::join!(
        h.requests.cancel(&asker, &request.id),
        h.jobs.auto_complete()
    );
    let report = report.unwrap();
    assert_eq!(report.failed, 0);

    let request = h.requests.get(&request.id).await.unwrap();
    let balance = h.reload_user(&helper.id).await.sawab_balance;
    match request.status {
        RequestStatus::Cancelled => {
            assert!(cancelled.is_ok());
            assert_eq!(report.succeeded, 0);
            assert_eq!(balance, 0);
        }
        RequestStatus::Completed => {
            assert!(matches!(cancelled, Err(AppError::InvalidState(_))));
            assert_eq!(report.succeeded, 1);
            assert_eq!(balance, 1);
        }
        other => panic!("unexpected status {other:?}"),
    }
}

struct UnavailableCache;

#[async_trait]
impl CounterCache for UnavailableCache {
    async fn get(&self, _key: &CounterKey) -> AppResult<Option<u64>> {
        Err(AppError::Redis("connection refused".to_string()))
    }

    async fn set(&self, _key: &CounterKey, _value: u64) -> AppResult<()> {
        Err(AppError::Redis("connection refused".to_string()))
    }

    async fn invalidate(&self, _key: &CounterKey) -> AppResult<()> {
        Err(AppError::Redis("connection refused".to_string()))
    }
}

struct UnavailablePublisher;

#[async_trait]
impl EventPublisher for UnavailablePublisher {
    async fn publish(&self, _event: StreamEvent) -> AppResult<()> {
        Err(AppError::Redis("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_completion_commits_when_delivery_fails() {
    let db = TestDatabase::new().await.unwrap();
    let conn = db.arc();
    let mut notifications = NotificationService::new(conn.clone(), Arc::new(UnavailableCache));
    notifications.set_event_publisher(Arc::new(UnavailablePublisher));
    let requests = RequestService::new(
        conn.clone(),
        BadgeEngine::new(conn.clone(), BadgeConfig::default()),
        notifications.clone(),
        LifecycleConfig::default(),
    );

    let c = db.connection();
    let asker = insert_user(c, "asker", UserRole::User).await.unwrap();
    let helper = insert_user(c, "helper", UserRole::User).await.unwrap();
    let category = insert_category(c, "Transport").await.unwrap();
    let request = insert_request(
        c,
        &asker.id,
        &category.id,
        RequestStatus::PendingCompletion,
        days_ago(1),
    )
    .await
    .unwrap();
    insert_offer(c, &request.id, &helper.id, OfferStatus::Accepted)
        .await
        .unwrap();

    let completion = requests
        .complete(CompletionTrigger::Asker(asker.id.clone()), &request.id)
        .await
        .unwrap();
    assert_eq!(completion.request.status, RequestStatus::Completed);
    assert_eq!(completion.balance, 1);
    assert_eq!(
        requests.get(&request.id).await.unwrap().status,
        RequestStatus::Completed
    );

    // The record is stored and the count falls back to the database
    assert_eq!(notifications.unread_count(&helper.id).await.unwrap(), 1);
}
