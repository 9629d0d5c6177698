//! Admin message repository.

use std::sync::Arc;

use crate::entities::{AdminMessage, admin_message};
use sawab_common::{AppError, AppResult};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Admin message repository for database operations.
#[derive(Clone)]
pub struct AdminMessageRepository {
    db: Arc<DatabaseConnection>,
}

impl AdminMessageRepository {
    /// Create a new admin message repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a new admin message.
    pub async fn create(
        &self,
        model: admin_message::ActiveModel,
    ) -> AppResult<admin_message::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Messages of a member's thread, oldest first.
    ///
    /// With `staff_id` only the messages exchanged with that staff user are
    /// returned; without it, the member's whole thread with staff.
    pub async fn find_thread(
        &self,
        member_id: &str,
        staff_id: Option<&str>,
        limit: u64,
    ) -> AppResult<Vec<admin_message::Model>> {
        let mut query =
            AdminMessage::find().filter(admin_message::Column::MemberId.eq(member_id));

        if let Some(staff_id) = staff_id {
            query = query.filter(
                Condition::any()
                    .add(admin_message::Column::SenderId.eq(staff_id))
                    .add(admin_message::Column::RecipientId.eq(staff_id)),
            );
        }

        query
            .order_by_asc(admin_message::Column::CreatedAt)
            .order_by_asc(admin_message::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A member's messages, newest first.
    pub async fn find_by_member(
        &self,
        member_id: &str,
        limit: u64,
    ) -> AppResult<Vec<admin_message::Model>> {
        AdminMessage::find()
            .filter(admin_message::Column::MemberId.eq(member_id))
            .order_by_desc(admin_message::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The latest message of each member thread, most recently active first.
    pub async fn find_latest_per_member(
        &self,
        limit: u64,
    ) -> AppResult<Vec<admin_message::Model>> {
        let latest_ids: Vec<String> = AdminMessage::find()
            .select_only()
            .column_as(admin_message::Column::Id.max(), "latest_id")
            .group_by(admin_message::Column::MemberId)
            .order_by_desc(admin_message::Column::Id.max())
            .limit(limit)
            .into_tuple()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if latest_ids.is_empty() {
            return Ok(Vec::new());
        }

        AdminMessage::find()
            .filter(admin_message::Column::Id.is_in(latest_ids))
            .order_by_desc(admin_message::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Mark the unread messages `recipient_id` received in a member thread as read.
    ///
    /// `staff_id` narrows the thread the same way as in [`Self::find_thread`].
    pub async fn mark_thread_read(
        &self,
        recipient_id: &str,
        member_id: &str,
        staff_id: Option<&str>,
        now: DateTimeWithTimeZone,
    ) -> AppResult<u64> {
        let mut query = AdminMessage::update_many()
            .filter(admin_message::Column::RecipientId.eq(recipient_id))
            .filter(admin_message::Column::MemberId.eq(member_id))
            .filter(admin_message::Column::ReadAt.is_null());

        if let Some(staff_id) = staff_id {
            query = query.filter(admin_message::Column::SenderId.eq(staff_id));
        }

        let result = query
            .col_expr(admin_message::Column::ReadAt, Expr::value(now))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Count the unread admin messages a user received.
    pub async fn count_unread(&self, recipient_id: &str) -> AppResult<u64> {
        AdminMessage::find()
            .filter(admin_message::Column::RecipientId.eq(recipient_id))
            .filter(admin_message::Column::ReadAt.is_null())
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
