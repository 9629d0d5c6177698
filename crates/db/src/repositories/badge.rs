//! Badge catalog and award repository.

use std::sync::Arc;

use crate::entities::{Badge, UserBadge, badge, user_badge};
use sawab_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder,
};

/// Badge repository for database operations.
#[derive(Clone)]
pub struct BadgeRepository {
    db: Arc<DatabaseConnection>,
}

impl BadgeRepository {
    /// Create a new badge repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a catalog badge by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<badge::Model>> {
        Badge::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a catalog badge by its exact name.
    pub async fn find_by_name<C: ConnectionTrait>(
        &self,
        conn: &C,
        name: &str,
    ) -> AppResult<Option<badge::Model>> {
        Badge::find()
            .filter(badge::Column::Name.eq(name))
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The whole catalog.
    pub async fn list(&self) -> AppResult<Vec<badge::Model>> {
        Badge::find()
            .order_by_asc(badge::Column::Name)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add a catalog entry.
    pub async fn create(&self, model: badge::ActiveModel) -> AppResult<badge::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether the user already holds the badge.
    pub async fn is_awarded<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        badge_id: &str,
    ) -> AppResult<bool> {
        let count = UserBadge::find()
            .filter(user_badge::Column::UserId.eq(user_id))
            .filter(user_badge::Column::BadgeId.eq(badge_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Insert an award record.
    pub async fn award<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: user_badge::ActiveModel,
    ) -> AppResult<user_badge::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Remove an award. Returns whether one existed.
    pub async fn revoke(&self, user_id: &str, badge_id: &str) -> AppResult<bool> {
        let existing = UserBadge::find()
            .filter(user_badge::Column::UserId.eq(user_id))
            .filter(user_badge::Column::BadgeId.eq(badge_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        match existing {
            Some(award) => {
                award
                    .delete(self.db.as_ref())
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// A user's badges with their award records, newest first.
    pub async fn find_by_user(
        &self,
        user_id: &str,
    ) -> AppResult<Vec<(user_badge::Model, Option<badge::Model>)>> {
        UserBadge::find()
            .filter(user_badge::Column::UserId.eq(user_id))
            .order_by_desc(user_badge::Column::AcquiredAt)
            .find_also_related(Badge)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
