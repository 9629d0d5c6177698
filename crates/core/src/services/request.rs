//! Help request service.
//!
//! Owns the request lifecycle: creation, editing, and every status
//! transition after an offer was accepted. Transitions that race with each
//! other run under an exclusive lock on the request row and re-check the
//! status they loaded after acquiring it.

use std::sync::Arc;

use chrono::{Duration, Utc};
use sawab_common::{AppError, AppResult, IdGenerator, LifecycleConfig};
use sawab_db::{
    entities::{
        category,
        notification::{Notifiable, NotificationAction},
        request::{self, RequestStatus},
        user,
    },
    repositories::{
        CategoryRepository, InstitutionRepository, OfferRepository, RequestRepository,
        UserRepository,
    },
};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, DatabaseTransaction, Set, TransactionTrait};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::services::badge::{AwardedBadge, BadgeEngine};
use crate::services::notification::{NotificationIntent, NotificationService};
use crate::services::state_machine::RequestEvent;

/// Input for creating a help request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRequestInput {
    #[validate(length(min = 5, max = 100, message = "must be between 5 and 100 characters"))]
    pub title: String,

    #[validate(length(min = 20, message = "must be at least 20 characters"))]
    pub description: String,

    pub category_id: String,

    #[validate(length(min = 1, message = "can't be blank"))]
    pub region: String,

    #[validate(length(min = 1, message = "can't be blank"))]
    pub city: String,

    /// Institution the request is posted on behalf of.
    #[serde(default)]
    pub institution_id: Option<String>,
}

/// Input for editing an open request.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRequestInput {
    #[validate(length(min = 5, max = 100, message = "must be between 5 and 100 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 20, message = "must be at least 20 characters"))]
    pub description: Option<String>,

    pub category_id: Option<String>,

    #[validate(length(min = 1, message = "can't be blank"))]
    pub region: Option<String>,

    #[validate(length(min = 1, message = "can't be blank"))]
    pub city: Option<String>,
}

/// Who asked for a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// The asker confirms the work was done.
    Asker(String),
    /// Staff complete the request, possibly resolving a dispute.
    Staff(String),
    /// The auto-complete job.
    Scheduler,
}

impl CompletionTrigger {
    /// Trigger for `actor` completing `request`.
    #[must_use]
    pub fn for_actor(actor: &user::Model, request: &request::Model) -> Self {
        if actor.is_staff() && actor.id != request.user_id {
            Self::Staff(actor.id.clone())
        } else {
            Self::Asker(actor.id.clone())
        }
    }

    const fn event(&self) -> RequestEvent {
        match self {
            Self::Asker(_) => RequestEvent::Complete,
            Self::Staff(_) => RequestEvent::AdminComplete,
            Self::Scheduler => RequestEvent::AutoComplete,
        }
    }
}

/// Result of a committed completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub request: request::Model,
    pub helper_id: String,
    /// Helper balance after the credit.
    pub balance: i32,
    pub badges: Vec<AwardedBadge>,
}

/// Help request service for business logic.
#[derive(Clone)]
pub struct RequestService {
    db: Arc<DatabaseConnection>,
    request_repo: RequestRepository,
    offer_repo: OfferRepository,
    user_repo: UserRepository,
    category_repo: CategoryRepository,
    institution_repo: InstitutionRepository,
    badge_engine: BadgeEngine,
    notification_service: NotificationService,
    lifecycle: LifecycleConfig,
    id_gen: IdGenerator,
}

impl RequestService {
    /// Create a new request service.
    #[must_use]
    pub fn new(
        db: Arc<DatabaseConnection>,
        badge_engine: BadgeEngine,
        notification_service: NotificationService,
        lifecycle: LifecycleConfig,
    ) -> Self {
        Self {
            request_repo: RequestRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            category_repo: CategoryRepository::new(db.clone()),
            institution_repo: InstitutionRepository::new(db.clone()),
            db,
            badge_engine,
            notification_service,
            lifecycle,
            id_gen: IdGenerator::new(),
        }
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a request by ID.
    pub async fn get(&self, id: &str) -> AppResult<request::Model> {
        self.request_repo.get_by_id(id).await
    }

    /// Request categories, by name.
    pub async fn categories(&self) -> AppResult<Vec<category::Model>> {
        self.category_repo.list().await
    }

    /// List requests, newest first.
    pub async fn list(
        &self,
        status: Option<RequestStatus>,
        category_id: Option<&str>,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<request::Model>> {
        self.request_repo
            .list(status, category_id, limit, until_id)
            .await
    }

    /// Post a new request.
    ///
    /// Posting on behalf of an institution requires a representative or
    /// admin membership of a verified institution; the other members are
    /// notified.
    pub async fn create(
        &self,
        user_id: &str,
        input: CreateRequestInput,
    ) -> AppResult<request::Model> {
        input.validate()?;

        if self.category_repo.find_by_id(&input.category_id).await?.is_none() {
            return Err(AppError::validation("category_id: category does not exist"));
        }

        let mut institution_members = Vec::new();
        if let Some(ref institution_id) = input.institution_id {
            let institution = self
                .institution_repo
                .find_by_id(institution_id)
                .await?
                .ok_or_else(|| AppError::validation("institution_id: institution does not exist"))?;

            if !institution.verified {
                return Err(AppError::validation(
                    "institution_id: institution is not verified",
                ));
            }

            let membership = self
                .institution_repo
                .find_member(&institution.id, user_id)
                .await?;
            if !membership.is_some_and(|m| m.role.can_post_requests()) {
                return Err(AppError::Forbidden(
                    "Only representatives can post on behalf of an institution".to_string(),
                ));
            }

            institution_members = self.institution_repo.find_members(&institution.id).await?;
        }

        let now = Utc::now().into();
        let model = request::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            category_id: Set(input.category_id),
            institution_id: Set(input.institution_id),
            title: Set(input.title),
            description: Set(input.description),
            region: Set(input.region),
            city: Set(input.city),
            status: Set(RequestStatus::Open),
            offers_count: Set(0),
            entered_in_progress_at: Set(None),
            pending_completion_at: Set(None),
            completed_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let request = self.request_repo.create(model).await?;
        info!(request_id = %request.id, user_id, "Request created");

        let intents = institution_members
            .into_iter()
            .filter(|m| m.user_id != user_id)
            .map(|m| {
                NotificationIntent::new(
                    NotificationAction::InstitutionRequestCreated,
                    m.user_id,
                    Notifiable::Request(request.id.clone()),
                )
                .by(user_id)
            })
            .collect::<Vec<_>>();
        self.notification_service.notify_all(intents).await;

        Ok(request)
    }

    /// Edit a request. Only its author may, and only while it is open.
    pub async fn update(
        &self,
        user_id: &str,
        request_id: &str,
        input: UpdateRequestInput,
    ) -> AppResult<request::Model> {
        input.validate()?;

        let request = self.request_repo.get_by_id(request_id).await?;
        if request.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the author can edit this request".to_string(),
            ));
        }
        if request.status != RequestStatus::Open {
            return Err(AppError::InvalidState(
                "Only open requests can be edited".to_string(),
            ));
        }

        let mut active: request::ActiveModel = request.into();
        if let Some(category_id) = input.category_id {
            if self.category_repo.find_by_id(&category_id).await?.is_none() {
                return Err(AppError::validation("category_id: category does not exist"));
            }
            active.category_id = Set(category_id);
        }
        if let Some(title) = input.title {
            active.title = Set(title);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(region) = input.region {
            active.region = Set(region);
        }
        if let Some(city) = input.city {
            active.city = Set(city);
        }
        active.updated_at = Set(Utc::now().into());

        self.request_repo.update(active).await
    }

    /// The accepted helper signals the work is done.
    ///
    /// Allowed once the request has been in progress for the configured
    /// number of days.
    pub async fn mark_pending(
        &self,
        helper_id: &str,
        request_id: &str,
    ) -> AppResult<request::Model> {
        let txn = self.begin().await?;
        let locked = self.request_repo.lock_for_update(&txn, request_id).await?;
        let next = RequestEvent::MarkPending.apply(locked.status)?;

        let accepted = self
            .offer_repo
            .find_accepted(&txn, request_id)
            .await?
            .ok_or_else(|| AppError::InvalidState("Request has no accepted offer".to_string()))?;
        if accepted.user_id != helper_id {
            return Err(AppError::InvalidState(
                "Only the accepted helper can mark the request as done".to_string(),
            ));
        }

        let started = locked.entered_in_progress_at.unwrap_or(locked.updated_at);
        let eligible_at = started + Duration::days(self.lifecycle.pending_completion_after_days);
        let now: DateTimeWithTimeZone = Utc::now().into();
        if now < eligible_at {
            return Err(AppError::InvalidState(format!(
                "Request can be marked as done {} days after work started",
                self.lifecycle.pending_completion_after_days
            )));
        }

        let asker_id = locked.user_id.clone();
        let mut active: request::ActiveModel = locked.into();
        active.status = Set(next);
        active.pending_completion_at = Set(Some(now));
        active.updated_at = Set(now);
        let request = self.request_repo.update_in(&txn, active).await?;
        Self::commit(txn).await?;

        info!(request_id, helper_id, "Request marked pending completion");

        self.notification_service
            .notify(
                NotificationIntent::new(
                    NotificationAction::PendingCompletion,
                    asker_id,
                    Notifiable::Request(request.id.clone()),
                )
                .by(helper_id),
            )
            .await;

        Ok(request)
    }

    /// Complete a request and credit its helper.
    ///
    /// Locks the request row, re-checks the status, requires exactly one
    /// accepted offer, credits one sawab and evaluates badges, all in one
    /// transaction. Of two racing completions the second observes the
    /// completed status and fails without side effects. Notifications go
    /// out after commit.
    pub async fn complete(
        &self,
        trigger: CompletionTrigger,
        request_id: &str,
    ) -> AppResult<Completion> {
        let txn = self.begin().await?;
        let locked = self.request_repo.lock_for_update(&txn, request_id).await?;

        if matches!(trigger, CompletionTrigger::Asker(ref actor_id) if locked.user_id != *actor_id)
        {
            return Err(AppError::Forbidden(
                "Only the asker can confirm completion".to_string(),
            ));
        }
        let next = trigger.event().apply(locked.status)?;

        let accepted = self
            .offer_repo
            .find_accepted(&txn, request_id)
            .await?
            .ok_or_else(|| AppError::InvalidState("Request has no accepted offer".to_string()))?;

        let now = Utc::now().into();
        let mut active: request::ActiveModel = locked.into();
        active.status = Set(next);
        active.completed_at = Set(Some(now));
        active.updated_at = Set(now);
        let request = self.request_repo.update_in(&txn, active).await?;

        let helper_id = accepted.user_id;
        let balance = self
            .user_repo
            .increment_sawab_balance(&txn, &helper_id)
            .await?;
        let badges = self
            .badge_engine
            .evaluate(&txn, &helper_id, balance, &request)
            .await?;

        Self::commit(txn).await?;

        info!(
            request_id,
            helper_id = %helper_id,
            balance,
            badges = badges.len(),
            ?trigger,
            "Request completed"
        );

        let mut intents = vec![
            NotificationIntent::new(
                NotificationAction::RequestCompleted,
                helper_id.clone(),
                Notifiable::Request(request.id.clone()),
            )
            .by(request.user_id.clone()),
        ];
        intents.extend(badges.iter().map(|b| b.notification(&helper_id)));
        if trigger == CompletionTrigger::Scheduler {
            intents.push(
                NotificationIntent::new(
                    NotificationAction::RequestAutoCompleted,
                    request.user_id.clone(),
                    Notifiable::Request(request.id.clone()),
                )
                .by(helper_id.clone()),
            );
        }
        self.notification_service.notify_all(intents).await;

        Ok(Completion {
            request,
            helper_id,
            balance,
            badges,
        })
    }

    /// Contest a pending completion. Every staff member is notified.
    pub async fn open_dispute(
        &self,
        actor_id: &str,
        request_id: &str,
    ) -> AppResult<request::Model> {
        let txn = self.begin().await?;
        let locked = self.request_repo.lock_for_update(&txn, request_id).await?;
        let next = RequestEvent::OpenDispute.apply(locked.status)?;

        let helper_id = self
            .offer_repo
            .find_accepted(&txn, request_id)
            .await?
            .map(|o| o.user_id);
        if locked.user_id != actor_id && helper_id.as_deref() != Some(actor_id) {
            return Err(AppError::Forbidden(
                "Only the asker or the helper can open a dispute".to_string(),
            ));
        }

        let mut active: request::ActiveModel = locked.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now().into());
        let request = self.request_repo.update_in(&txn, active).await?;
        Self::commit(txn).await?;

        info!(request_id, actor_id, "Dispute opened");

        let staff = self.user_repo.find_staff().await?;
        let intents = staff
            .into_iter()
            .map(|admin| {
                NotificationIntent::new(
                    NotificationAction::DisputeCreated,
                    admin.id,
                    Notifiable::Request(request.id.clone()),
                )
                .by(actor_id)
            })
            .collect::<Vec<_>>();
        self.notification_service.notify_all(intents).await;

        Ok(request)
    }

    /// Cancel a request. The asker may cancel until completion is pending;
    /// staff may also cancel disputed requests.
    pub async fn cancel(&self, actor: &user::Model, request_id: &str) -> AppResult<request::Model> {
        let txn = self.begin().await?;
        let locked = self.request_repo.lock_for_update(&txn, request_id).await?;

        let event = if actor.is_staff() {
            RequestEvent::AdminCancel
        } else if locked.user_id == actor.id {
            RequestEvent::Cancel
        } else {
            return Err(AppError::Forbidden(
                "Only the asker or staff can cancel this request".to_string(),
            ));
        };
        let next = event.apply(locked.status)?;

        let mut active: request::ActiveModel = locked.into();
        active.status = Set(next);
        active.updated_at = Set(Utc::now().into());
        let request = self.request_repo.update_in(&txn, active).await?;
        Self::commit(txn).await?;

        info!(request_id, actor_id = %actor.id, "Request cancelled");
        Ok(request)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user(id: &str, role: user::UserRole) -> user::Model {
        let now = Utc::now().into();
        user::Model {
            id: id.to_string(),
            username: id.to_string(),
            username_lower: id.to_lowercase(),
            name: None,
            token: None,
            role,
            sawab_balance: 0,
            banned_at: None,
            banned_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn request_of(asker_id: &str) -> request::Model {
        let now = Utc::now().into();
        request::Model {
            id: "r1".to_string(),
            user_id: asker_id.to_string(),
            category_id: "c1".to_string(),
            institution_id: None,
            title: "Need a ride".to_string(),
            description: "Need a ride to the clinic on Monday".to_string(),
            region: "Tatarstan".to_string(),
            city: "Kazan".to_string(),
            status: RequestStatus::PendingCompletion,
            offers_count: 1,
            entered_in_progress_at: Some(now),
            pending_completion_at: Some(now),
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_trigger_for_actor() {
        let request = request_of("asker");

        assert_eq!(
            CompletionTrigger::for_actor(&user("asker", user::UserRole::User), &request),
            CompletionTrigger::Asker("asker".to_string())
        );
        assert_eq!(
            CompletionTrigger::for_actor(&user("mod", user::UserRole::Moderator), &request),
            CompletionTrigger::Staff("mod".to_string())
        );
        // Staff completing their own request act as the asker
        assert_eq!(
            CompletionTrigger::for_actor(&user("asker", user::UserRole::Admin), &request),
            CompletionTrigger::Asker("asker".to_string())
        );
    }

    #[test]
    fn test_trigger_events() {
        assert_eq!(
            CompletionTrigger::Scheduler.event(),
            RequestEvent::AutoComplete
        );
        assert_eq!(
            CompletionTrigger::Staff("a".to_string()).event(),
            RequestEvent::AdminComplete
        );
    }

    #[test]
    fn test_create_input_validation() {
        let input = CreateRequestInput {
            title: "Hey".to_string(),
            description: "too short".to_string(),
            category_id: "c1".to_string(),
            region: String::new(),
            city: "Kazan".to_string(),
            institution_id: None,
        };

        let err: AppError = input.validate().unwrap_err().into();
        match err {
            AppError::Validation(messages) => {
                assert_eq!(messages.len(), 3);
                assert!(messages[0].starts_with("description:"));
                assert!(messages[1].starts_with("region:"));
                assert!(messages[2].starts_with("title:"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
