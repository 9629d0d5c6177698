//! Review repository.

use std::sync::Arc;

use crate::entities::{Review, review};
use sawab_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder,
};

/// Review repository for database operations.
#[derive(Clone)]
pub struct ReviewRepository {
    db: Arc<DatabaseConnection>,
}

impl ReviewRepository {
    /// Create a new review repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a review.
    pub async fn create(&self, model: review::ActiveModel) -> AppResult<review::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Whether the reviewer already reviewed the reviewee for this request.
    pub async fn exists(
        &self,
        request_id: &str,
        reviewer_id: &str,
        reviewee_id: &str,
    ) -> AppResult<bool> {
        let count = Review::find()
            .filter(review::Column::RequestId.eq(request_id))
            .filter(review::Column::ReviewerId.eq(reviewer_id))
            .filter(review::Column::RevieweeId.eq(reviewee_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Reviews received by a user, newest first.
    pub async fn find_by_reviewee(&self, user_id: &str) -> AppResult<Vec<review::Model>> {
        Review::find()
            .filter(review::Column::RevieweeId.eq(user_id))
            .order_by_desc(review::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
