//! Badge award engine and manual badge management.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, BadgeConfig, IdGenerator};
use sawab_db::{
    entities::{
        badge,
        notification::{Notifiable, NotificationAction},
        request, user_badge,
    },
    repositories::{BadgeRepository, CategoryRepository, OfferRepository, UserRepository},
};
use sea_orm::{ConnectionTrait, DatabaseConnection, Set, TransactionTrait};
use tracing::{debug, info, warn};

use crate::services::notification::{NotificationIntent, NotificationService};

/// A badge granted during evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardedBadge {
    pub badge: badge::Model,
    pub award: user_badge::Model,
}

impl AwardedBadge {
    /// The `badge_unlocked` notification for this award.
    #[must_use]
    pub fn notification(&self, actor_id: &str) -> NotificationIntent {
        NotificationIntent::new(
            NotificationAction::BadgeUnlocked,
            self.award.user_id.clone(),
            Notifiable::Badge(self.badge.id.clone()),
        )
        .by(actor_id)
    }
}

/// Evaluates achievement thresholds after a completion.
///
/// Thresholds are exact: a milestone is granted by the completion that lands
/// the balance on it, and the mastery badge by the completion that lands the
/// category count on it. Later completions never re-grant.
#[derive(Clone)]
pub struct BadgeEngine {
    badge_repo: BadgeRepository,
    category_repo: CategoryRepository,
    offer_repo: OfferRepository,
    config: BadgeConfig,
    id_gen: IdGenerator,
}

impl BadgeEngine {
    /// Create a new badge engine.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: BadgeConfig) -> Self {
        Self {
            badge_repo: BadgeRepository::new(db.clone()),
            category_repo: CategoryRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db),
            config,
            id_gen: IdGenerator::new(),
        }
    }

    /// Catalog names unlocked by the helper's new balance.
    #[must_use]
    pub fn milestone_names(&self, balance: i32) -> Vec<String> {
        self.config
            .milestones
            .iter()
            .filter(|m| m.sawab == balance)
            .map(|m| m.name.clone())
            .collect()
    }

    /// Evaluate every rule for `user_id` after `completed` was completed.
    ///
    /// Runs on the completion transaction. Each award is written under its
    /// own savepoint; a failing award is logged and skipped.
    pub async fn evaluate<C>(
        &self,
        conn: &C,
        user_id: &str,
        balance: i32,
        completed: &request::Model,
    ) -> AppResult<Vec<AwardedBadge>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let mut names = self.milestone_names(balance);

        if let Some(category) = self
            .category_repo
            .find_by_id_in(conn, &completed.category_id)
            .await?
        {
            let count = self
                .offer_repo
                .count_completed_in_category(conn, user_id, &category.id)
                .await?;
            if count == self.config.category_mastery_count {
                names.push(self.config.mastery_badge_name(&category.name));
            }
        }

        let mut awarded = Vec::new();
        for name in names {
            match self.award_if_missing(conn, user_id, &name).await {
                Ok(Some(badge)) => awarded.push(badge),
                Ok(None) => {}
                Err(e) => warn!(error = %e, badge = %name, user_id, "Failed to award badge"),
            }
        }
        Ok(awarded)
    }

    async fn award_if_missing<C>(
        &self,
        conn: &C,
        user_id: &str,
        name: &str,
    ) -> AppResult<Option<AwardedBadge>>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let Some(badge) = self.badge_repo.find_by_name(conn, name).await? else {
            debug!(badge = %name, "Badge not in catalog, skipping");
            return Ok(None);
        };

        if self.badge_repo.is_awarded(conn, user_id, &badge.id).await? {
            return Ok(None);
        }

        let savepoint = conn
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let model = user_badge::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            badge_id: Set(badge.id.clone()),
            acquired_at: Set(Utc::now().into()),
        };

        match self.badge_repo.award(&savepoint, model).await {
            Ok(award) => {
                savepoint
                    .commit()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                info!(badge = %badge.name, user_id, "Awarded badge");
                Ok(Some(AwardedBadge { badge, award }))
            }
            Err(e) => {
                savepoint
                    .rollback()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Err(e)
            }
        }
    }
}

/// Manual badge management by staff.
#[derive(Clone)]
pub struct BadgeService {
    db: Arc<DatabaseConnection>,
    badge_repo: BadgeRepository,
    user_repo: UserRepository,
    notification_service: NotificationService,
    id_gen: IdGenerator,
}

impl BadgeService {
    /// Create a new badge service.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, notification_service: NotificationService) -> Self {
        Self {
            badge_repo: BadgeRepository::new(db.clone()),
            user_repo: UserRepository::new(db.clone()),
            db,
            notification_service,
            id_gen: IdGenerator::new(),
        }
    }

    /// The badge catalog.
    pub async fn catalog(&self) -> AppResult<Vec<badge::Model>> {
        self.badge_repo.list().await
    }

    /// Badges held by a user, newest first.
    pub async fn user_badges(&self, user_id: &str) -> AppResult<Vec<badge::Model>> {
        let awards = self.badge_repo.find_by_user(user_id).await?;
        Ok(awards.into_iter().filter_map(|(_, badge)| badge).collect())
    }

    /// Grant a badge by hand. Returns `None` if the user already holds it.
    pub async fn award(
        &self,
        staff_id: &str,
        user_id: &str,
        badge_id: &str,
    ) -> AppResult<Option<user_badge::Model>> {
        let badge = self
            .badge_repo
            .find_by_id(badge_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Badge {badge_id}")))?;
        let user = self.user_repo.get_by_id(user_id).await?;

        let db = self.db.as_ref();
        if self.badge_repo.is_awarded(db, &user.id, &badge.id).await? {
            return Ok(None);
        }

        let award = self
            .badge_repo
            .award(
                db,
                user_badge::ActiveModel {
                    id: Set(self.id_gen.generate()),
                    user_id: Set(user.id.clone()),
                    badge_id: Set(badge.id.clone()),
                    acquired_at: Set(Utc::now().into()),
                },
            )
            .await?;

        info!(badge = %badge.name, user_id = %user.id, staff_id, "Badge awarded manually");

        let awarded = AwardedBadge { badge, award };
        self.notification_service
            .notify(awarded.notification(staff_id))
            .await;

        Ok(Some(awarded.award))
    }

    /// Take a badge away. Returns whether the user held it.
    pub async fn revoke(&self, user_id: &str, badge_id: &str) -> AppResult<bool> {
        let revoked = self.badge_repo.revoke(user_id, badge_id).await?;
        if revoked {
            info!(badge_id, user_id, "Badge revoked");
        }
        Ok(revoked)
    }
}
