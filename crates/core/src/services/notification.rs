//! Notification service.
//!
//! Every domain event reaches users through [`NotificationService::notify`].
//! One call writes the record, invalidates the recipient's unread counter and
//! pushes the rendered notification, so those three never drift apart.
//! Delivery is best-effort: failures are logged and swallowed, and callers
//! only ever notify after their own transaction committed.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, CounterCache, CounterKey, IdGenerator, read_through};
use sawab_db::{
    entities::{
        capabilities::Readable,
        notification::{self, Notifiable, NotifiableKind, NotificationAction},
    },
    repositories::{
        BadgeRepository, ConversationRepository, InstitutionRepository, NotificationRepository,
        OfferRepository, ReportRepository, RequestRepository, UserRepository,
    },
};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{DatabaseConnection, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::services::event_publisher::EventPublisherService;

const LABEL_MAX_CHARS: usize = 80;
const FALLBACK_URL: &str = "/notifications";

/// A notification to be delivered once the triggering change is durable.
///
/// Recipient and target are optional so that callers can pass whatever they
/// resolved; an intent missing either is dropped without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationIntent {
    pub action: NotificationAction,
    pub recipient_id: Option<String>,
    pub actor_id: Option<String>,
    pub target: Option<Notifiable>,
}

impl NotificationIntent {
    /// Notify `recipient_id` about `target`.
    #[must_use]
    pub fn new(
        action: NotificationAction,
        recipient_id: impl Into<String>,
        target: Notifiable,
    ) -> Self {
        Self {
            action,
            recipient_id: Some(recipient_id.into()),
            actor_id: None,
            target: Some(target),
        }
    }

    /// Record who triggered the event.
    #[must_use]
    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// The entity a notification points at, as shown to its recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetView {
    #[serde(rename = "type")]
    pub kind: NotifiableKind,
    pub id: String,
    pub label: String,
}

/// A notification as listed and pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    pub action: NotificationAction,
    pub actor_id: Option<String>,
    /// `None` when the target has been deleted since.
    pub target: Option<TargetView>,
    pub url: String,
    pub is_read: bool,
    pub read_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

/// Looks up notification targets for rendering.
#[derive(Clone)]
struct TargetResolver {
    request_repo: RequestRepository,
    offer_repo: OfferRepository,
    conversation_repo: ConversationRepository,
    report_repo: ReportRepository,
    badge_repo: BadgeRepository,
    institution_repo: InstitutionRepository,
    user_repo: UserRepository,
}

impl TargetResolver {
    fn new(db: &Arc<DatabaseConnection>) -> Self {
        Self {
            request_repo: RequestRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db.clone()),
            conversation_repo: ConversationRepository::new(db.clone()),
            report_repo: ReportRepository::new(db.clone()),
            badge_repo: BadgeRepository::new(db.clone()),
            institution_repo: InstitutionRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
        }
    }

    /// Label and link of a target, `None` if it no longer exists.
    async fn resolve(&self, target: &Notifiable) -> AppResult<Option<(String, String)>> {
        let resolved = match target {
            Notifiable::Request(id) => self
                .request_repo
                .find_by_id(id)
                .await?
                .map(|r| (r.title, format!("/requests/{}", r.id))),
            Notifiable::Offer(id) => match self.offer_repo.find_by_id(id).await? {
                Some(offer) => {
                    let label = self
                        .request_repo
                        .find_by_id(&offer.request_id)
                        .await?
                        .map_or(offer.message, |r| r.title);
                    Some((label, format!("/requests/{}", offer.request_id)))
                }
                None => None,
            },
            Notifiable::Message(id) => self
                .conversation_repo
                .find_message(id)
                .await?
                .map(|m| (m.body, format!("/conversations/{}", m.conversation_id))),
            Notifiable::Report(id) => self
                .report_repo
                .find_by_id(id)
                .await?
                .map(|r| (r.reason, format!("/admin/reports/{}", r.id))),
            Notifiable::Badge(id) => self
                .badge_repo
                .find_by_id(id)
                .await?
                .map(|b| (b.name, "/badges".to_string())),
            Notifiable::Institution(id) => self
                .institution_repo
                .find_by_id(id)
                .await?
                .map(|i| (i.name, format!("/institutions/{}", i.id))),
            Notifiable::User(id) => self
                .user_repo
                .find_by_id(id)
                .await?
                .map(|u| (u.username.clone(), format!("/users/{}", u.username))),
        };

        Ok(resolved.map(|(label, url)| (truncate(&label), url)))
    }
}

fn truncate(label: &str) -> String {
    if label.chars().count() <= LABEL_MAX_CHARS {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(LABEL_MAX_CHARS - 1).collect();
        short.push('…');
        short
    }
}

/// Notification service for business logic.
#[derive(Clone)]
pub struct NotificationService {
    notification_repo: NotificationRepository,
    resolver: TargetResolver,
    cache: Arc<dyn CounterCache>,
    event_publisher: Option<EventPublisherService>,
    id_gen: IdGenerator,
}

impl NotificationService {
    /// Create a new notification service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, cache: Arc<dyn CounterCache>) -> Self {
        Self {
            notification_repo: NotificationRepository::new(db.clone()),
            resolver: TargetResolver::new(&db),
            cache,
            event_publisher: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the event publisher.
    pub fn set_event_publisher(&mut self, event_publisher: EventPublisherService) {
        self.event_publisher = Some(event_publisher);
    }

    /// Deliver one notification.
    ///
    /// Returns the stored record, or `None` when the intent was dropped or
    /// storing it failed. Never fails the caller.
    pub async fn notify(&self, intent: NotificationIntent) -> Option<notification::Model> {
        let NotificationIntent {
            action,
            recipient_id,
            actor_id,
            target,
        } = intent;

        let (Some(recipient_id), Some(target)) = (recipient_id, target) else {
            debug!(?action, "Skipping notification without recipient or target");
            return None;
        };

        let model = notification::ActiveModel {
            id: Set(self.id_gen.generate()),
            recipient_id: Set(recipient_id.clone()),
            actor_id: Set(actor_id),
            action: Set(action),
            notifiable_type: Set(target.kind()),
            notifiable_id: Set(target.id().to_string()),
            read_at: Set(None),
            created_at: Set(Utc::now().into()),
        };

        let notification = match self.notification_repo.create(model).await {
            Ok(notification) => notification,
            Err(e) => {
                error!(
                    error = %e,
                    ?action,
                    recipient_id = %recipient_id,
                    "Failed to create notification"
                );
                return None;
            }
        };

        self.invalidate_unread(&recipient_id).await;

        if let Some(ref event_publisher) = self.event_publisher {
            let view = self.render(&notification).await;
            if let Err(e) = event_publisher
                .publish_notification(&recipient_id, &view)
                .await
            {
                warn!(error = %e, "Failed to publish notification event");
            }
        }

        Some(notification)
    }

    /// Deliver several notifications in order. Returns how many were stored.
    pub async fn notify_all(&self, intents: impl IntoIterator<Item = NotificationIntent>) -> usize {
        let mut delivered = 0;
        for intent in intents {
            if self.notify(intent).await.is_some() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Whether `recipient_id` received one of `actions` about `target` since `since`.
    pub async fn received_since(
        &self,
        recipient_id: &str,
        actions: &[NotificationAction],
        target: &Notifiable,
        since: DateTimeWithTimeZone,
    ) -> AppResult<bool> {
        self.notification_repo
            .exists_since(recipient_id, actions, target, since)
            .await
    }

    /// Render a notification, tolerating a deleted target.
    pub async fn render(&self, notification: &notification::Model) -> NotificationView {
        let target = notification.notifiable();
        let resolved = match self.resolver.resolve(&target).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(error = %e, notification_id = %notification.id, "Failed to resolve notification target");
                None
            }
        };

        let (target, url) = match resolved {
            Some((label, url)) => (
                Some(TargetView {
                    kind: target.kind(),
                    id: target.id().to_string(),
                    label,
                }),
                url,
            ),
            None => (None, FALLBACK_URL.to_string()),
        };

        NotificationView {
            id: notification.id.clone(),
            action: notification.action,
            actor_id: notification.actor_id.clone(),
            target,
            url,
            is_read: notification.is_read(),
            read_at: notification.read_at,
            created_at: notification.created_at,
        }
    }

    /// List a user's notifications, newest first.
    pub async fn list(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<NotificationView>> {
        let notifications = self
            .notification_repo
            .find_by_user(user_id, limit, until_id, unread_only)
            .await?;

        let mut views = Vec::with_capacity(notifications.len());
        for notification in &notifications {
            views.push(self.render(notification).await);
        }
        Ok(views)
    }

    /// Unread notification count, served from the counter cache when possible.
    pub async fn unread_count(&self, user_id: &str) -> AppResult<u64> {
        let key = CounterKey::unread_notifications(user_id);
        let repo = &self.notification_repo;
        read_through(self.cache.as_ref(), &key, move || repo.count_unread(user_id)).await
    }

    /// Mark one of the user's notifications as read. Idempotent.
    pub async fn mark_as_read(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> AppResult<NotificationView> {
        let notification = self.get_owned(user_id, notification_id).await?;
        let notification = self
            .notification_repo
            .mark_as_read(notification, Utc::now().into())
            .await?;

        self.invalidate_unread(user_id).await;
        Ok(self.render(&notification).await)
    }

    /// Mark every notification of the user as read.
    pub async fn mark_all_as_read(&self, user_id: &str) -> AppResult<u64> {
        let updated = self
            .notification_repo
            .mark_all_as_read(user_id, Utc::now().into())
            .await?;

        self.invalidate_unread(user_id).await;
        Ok(updated)
    }

    /// Mark the user's unread `action` notifications about the given targets as read.
    pub async fn mark_targets_as_read(
        &self,
        user_id: &str,
        action: NotificationAction,
        kind: NotifiableKind,
        target_ids: Vec<String>,
    ) -> AppResult<u64> {
        let updated = self
            .notification_repo
            .mark_read_for_targets(user_id, action, kind, target_ids, Utc::now().into())
            .await?;

        self.invalidate_unread(user_id).await;
        Ok(updated)
    }

    /// Delete one of the user's notifications.
    pub async fn delete(&self, user_id: &str, notification_id: &str) -> AppResult<()> {
        let notification = self.get_owned(user_id, notification_id).await?;
        self.notification_repo.delete(notification).await?;

        self.invalidate_unread(user_id).await;
        Ok(())
    }

    async fn get_owned(
        &self,
        user_id: &str,
        notification_id: &str,
    ) -> AppResult<notification::Model> {
        let notification = self
            .notification_repo
            .find_by_id(notification_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Notification {notification_id}")))?;

        if notification.recipient_id != user_id {
            return Err(AppError::Forbidden(
                "Not the recipient of this notification".to_string(),
            ));
        }
        Ok(notification)
    }

    async fn invalidate_unread(&self, user_id: &str) {
        let key = CounterKey::unread_notifications(user_id);
        if let Err(e) = self.cache.invalidate(&key).await {
            warn!(error = %e, user_id, "Failed to invalidate unread counter");
        }
    }
}
