//! Offer repository.

use std::sync::Arc;

use crate::entities::{Offer, offer, request};
use sawab_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, JoinType,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    sea_query::Expr,
};

/// Offer repository for database operations.
#[derive(Clone)]
pub struct OfferRepository {
    db: Arc<DatabaseConnection>,
}

impl OfferRepository {
    /// Create a new offer repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an offer by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<offer::Model>> {
        self.find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find an offer by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<offer::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Offer {id}")))
    }

    /// Find an offer by ID on a given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<offer::Model>> {
        Offer::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new offer.
    pub async fn create<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: offer::ActiveModel,
    ) -> AppResult<offer::Model> {
        model
            .insert(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an offer on a given connection.
    pub async fn update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: offer::ActiveModel,
    ) -> AppResult<offer::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete an offer on a given connection.
    pub async fn delete_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        offer: offer::Model,
    ) -> AppResult<()> {
        offer
            .delete(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Offers on a request, oldest first.
    pub async fn find_by_request(&self, request_id: &str) -> AppResult<Vec<offer::Model>> {
        Offer::find()
            .filter(offer::Column::RequestId.eq(request_id))
            .order_by_asc(offer::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Offers on a request with a given status.
    pub async fn find_by_request_and_status<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
        status: offer::OfferStatus,
    ) -> AppResult<Vec<offer::Model>> {
        Offer::find()
            .filter(offer::Column::RequestId.eq(request_id))
            .filter(offer::Column::Status.eq(status))
            .order_by_asc(offer::Column::Id)
            .all(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The accepted offer of a request, if exactly one exists.
    ///
    /// More than one accepted offer is a broken invariant and reported as
    /// an internal error rather than silently picking one.
    pub async fn find_accepted<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
    ) -> AppResult<Option<offer::Model>> {
        let mut accepted = self
            .find_by_request_and_status(conn, request_id, offer::OfferStatus::Accepted)
            .await?;
        match accepted.len() {
            0 | 1 => Ok(accepted.pop()),
            n => Err(AppError::Internal(format!(
                "Request {request_id} has {n} accepted offers"
            ))),
        }
    }

    /// Whether a user already has a pending offer on a request.
    pub async fn has_pending<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        request_id: &str,
    ) -> AppResult<bool> {
        let count = Offer::find()
            .filter(offer::Column::UserId.eq(user_id))
            .filter(offer::Column::RequestId.eq(request_id))
            .filter(offer::Column::Status.eq(offer::OfferStatus::Pending))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Move every listed offer to `status` in one statement.
    pub async fn set_status_many<C: ConnectionTrait>(
        &self,
        conn: &C,
        ids: &[String],
        status: offer::OfferStatus,
        now: sea_orm::entity::prelude::DateTimeWithTimeZone,
    ) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = Offer::update_many()
            .col_expr(offer::Column::Status, Expr::value(status))
            .col_expr(offer::Column::UpdatedAt, Expr::value(now))
            .filter(offer::Column::Id.is_in(ids.to_vec()))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(result.rows_affected)
    }

    /// Accepted offers of a user on completed requests of one category.
    pub async fn count_completed_in_category<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: &str,
        category_id: &str,
    ) -> AppResult<u64> {
        Offer::find()
            .join(JoinType::InnerJoin, offer::Relation::Request.def())
            .filter(offer::Column::UserId.eq(user_id))
            .filter(offer::Column::Status.eq(offer::OfferStatus::Accepted))
            .filter(request::Column::Status.eq(request::RequestStatus::Completed))
            .filter(request::Column::CategoryId.eq(category_id))
            .count(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Accepted offers of a user on completed requests, all categories.
    pub async fn count_completed(&self, user_id: &str) -> AppResult<u64> {
        Offer::find()
            .join(JoinType::InnerJoin, offer::Relation::Request.def())
            .filter(offer::Column::UserId.eq(user_id))
            .filter(offer::Column::Status.eq(offer::OfferStatus::Accepted))
            .filter(request::Column::Status.eq(request::RequestStatus::Completed))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
