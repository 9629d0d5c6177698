//! Notification repository.

use std::sync::Arc;

use crate::entities::{Notification, notification};
use sawab_common::{AppError, AppResult};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, sea_query::Expr,
};

/// Notification repository for database operations.
#[derive(Clone)]
pub struct NotificationRepository {
    db: Arc<DatabaseConnection>,
}

impl NotificationRepository {
    /// Create a new notification repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a notification by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<notification::Model>> {
        Notification::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new notification.
    pub async fn create(&self, model: notification::ActiveModel) -> AppResult<notification::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a notification.
    pub async fn delete(&self, notification: notification::Model) -> AppResult<()> {
        notification
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get notifications for a user (paginated).
    pub async fn find_by_user(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
        unread_only: bool,
    ) -> AppResult<Vec<notification::Model>> {
        let mut query = Notification::find()
            .filter(notification::Column::RecipientId.eq(user_id))
            .order_by_desc(notification::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(notification::Column::Id.lt(id));
        }

        if unread_only {
            query = query.filter(notification::Column::ReadAt.is_null());
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark a notification as read. Already-read notifications keep their timestamp.
    pub async fn mark_as_read(
        &self,
        notification: notification::Model,
        now: DateTimeWithTimeZone,
    ) -> AppResult<notification::Model> {
        if notification.read_at.is_some() {
            return Ok(notification);
        }
        let mut active: notification::ActiveModel = notification.into();
        active.read_at = Set(Some(now));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark all notifications as read for a user.
    pub async fn mark_all_as_read(
        &self,
        user_id: &str,
        now: DateTimeWithTimeZone,
    ) -> AppResult<u64> {
        let result = Notification::update_many()
            .filter(notification::Column::RecipientId.eq(user_id))
            .filter(notification::Column::ReadAt.is_null())
            .col_expr(notification::Column::ReadAt, Expr::value(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Mark a user's unread notifications of one action about the given targets as read.
    pub async fn mark_read_for_targets(
        &self,
        user_id: &str,
        action: notification::NotificationAction,
        kind: notification::NotifiableKind,
        target_ids: Vec<String>,
        now: DateTimeWithTimeZone,
    ) -> AppResult<u64> {
        if target_ids.is_empty() {
            return Ok(0);
        }

        let result = Notification::update_many()
            .filter(notification::Column::RecipientId.eq(user_id))
            .filter(notification::Column::Action.eq(action))
            .filter(notification::Column::NotifiableType.eq(kind))
            .filter(notification::Column::NotifiableId.is_in(target_ids))
            .filter(notification::Column::ReadAt.is_null())
            .col_expr(notification::Column::ReadAt, Expr::value(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count unread notifications for a user.
    pub async fn count_unread(&self, user_id: &str) -> AppResult<u64> {
        Notification::find()
            .filter(notification::Column::RecipientId.eq(user_id))
            .filter(notification::Column::ReadAt.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether `recipient` got one of `actions` about `target` since `since`.
    pub async fn exists_since(
        &self,
        recipient_id: &str,
        actions: &[notification::NotificationAction],
        target: &notification::Notifiable,
        since: DateTimeWithTimeZone,
    ) -> AppResult<bool> {
        let count = Notification::find()
            .filter(notification::Column::RecipientId.eq(recipient_id))
            .filter(notification::Column::Action.is_in(actions.iter().copied()))
            .filter(notification::Column::NotifiableType.eq(target.kind()))
            .filter(notification::Column::NotifiableId.eq(target.id()))
            .filter(notification::Column::CreatedAt.gte(since))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Delete up to `limit` read notifications read before `cutoff`.
    ///
    /// Returns the number of rows deleted; zero means nothing is left.
    pub async fn delete_read_before(
        &self,
        cutoff: DateTimeWithTimeZone,
        limit: u64,
    ) -> AppResult<u64> {
        let ids: Vec<String> = Notification::find()
            .select_only()
            .column(notification::Column::Id)
            .filter(notification::Column::ReadAt.is_not_null())
            .filter(notification::Column::CreatedAt.lt(cutoff))
            .order_by_asc(notification::Column::Id)
            .limit(limit)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if ids.is_empty() {
            return Ok(0);
        }

        let result = Notification::delete_many()
            .filter(notification::Column::Id.is_in(ids))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }
}
