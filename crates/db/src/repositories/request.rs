//! Help request repository.

use std::sync::Arc;

use crate::entities::{Request, capabilities::Statusable, request};
use sawab_common::{AppError, AppResult};
use sea_orm::entity::prelude::DateTimeWithTimeZone;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Help request repository for database operations.
#[derive(Clone)]
pub struct RequestRepository {
    db: Arc<DatabaseConnection>,
}

impl RequestRepository {
    /// Create a new request repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a request by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<request::Model>> {
        self.find_by_id_in(self.db.as_ref(), id).await
    }

    /// Find a request by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<request::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Request {id}")))
    }

    /// Find a request by ID on a given connection.
    pub async fn find_by_id_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<Option<request::Model>> {
        Request::find_by_id(id)
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Load a request under an exclusive row lock (`SELECT ... FOR UPDATE`).
    ///
    /// The lock is held until the surrounding transaction ends; callers must
    /// re-check the status they loaded before acting on it.
    pub async fn lock_for_update<C: ConnectionTrait>(
        &self,
        conn: &C,
        id: &str,
    ) -> AppResult<request::Model> {
        Request::find_by_id(id)
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
            .ok_or_else(|| AppError::NotFound(format!("Request {id}")))
    }

    /// Create a new request.
    pub async fn create(&self, model: request::ActiveModel) -> AppResult<request::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a request.
    pub async fn update(&self, model: request::ActiveModel) -> AppResult<request::Model> {
        self.update_in(self.db.as_ref(), model).await
    }

    /// Update a request on a given connection.
    pub async fn update_in<C: ConnectionTrait>(
        &self,
        conn: &C,
        model: request::ActiveModel,
    ) -> AppResult<request::Model> {
        model
            .update(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a request together with its offers and conversation.
    pub async fn delete(&self, request: request::Model) -> AppResult<()> {
        request
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Increment the denormalized offer counter.
    pub async fn increment_offers_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
    ) -> AppResult<()> {
        Request::update_many()
            .col_expr(
                request::Column::OffersCount,
                Expr::col(request::Column::OffersCount).add(1),
            )
            .filter(request::Column::Id.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement the denormalized offer counter, never below zero.
    pub async fn decrement_offers_count<C: ConnectionTrait>(
        &self,
        conn: &C,
        request_id: &str,
    ) -> AppResult<()> {
        Request::update_many()
            .col_expr(
                request::Column::OffersCount,
                Expr::cust("CASE WHEN offers_count > 0 THEN offers_count - 1 ELSE 0 END"),
            )
            .filter(request::Column::Id.eq(request_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List requests, newest first.
    pub async fn list(
        &self,
        status: Option<request::RequestStatus>,
        category_id: Option<&str>,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<request::Model>> {
        let mut query = Request::find().order_by_desc(request::Column::Id);

        if let Some(status) = status {
            query = query.filter(request::Column::Status.eq(status));
        }
        if let Some(category_id) = category_id {
            query = query.filter(request::Column::CategoryId.eq(category_id));
        }
        if let Some(id) = until_id {
            query = query.filter(request::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Requests in `pending_completion` since before `cutoff`.
    pub async fn find_pending_completion_before(
        &self,
        cutoff: DateTimeWithTimeZone,
    ) -> AppResult<Vec<request::Model>> {
        Request::find()
            .filter(request::Column::Status.eq(request::RequestStatus::PendingCompletion))
            .filter(request::Column::PendingCompletionAt.lt(cutoff))
            .order_by_asc(request::Column::PendingCompletionAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Requests in `status` not touched since `cutoff`.
    pub async fn find_inactive(
        &self,
        status: request::RequestStatus,
        cutoff: DateTimeWithTimeZone,
    ) -> AppResult<Vec<request::Model>> {
        Request::find()
            .filter(request::Column::Status.eq(status))
            .filter(request::Column::UpdatedAt.lt(cutoff))
            .order_by_asc(request::Column::UpdatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count requests of one status.
    pub async fn count_by_status(&self, status: request::RequestStatus) -> AppResult<u64> {
        count_by_status::<Request, _>(self.db.as_ref(), status).await
    }
}

/// Count rows of any [`Statusable`] entity with the given status.
pub async fn count_by_status<E, C>(conn: &C, status: E::Status) -> AppResult<u64>
where
    E: Statusable,
    E::Model: Sync,
    C: ConnectionTrait,
{
    E::find()
        .filter(E::status_column().eq(status))
        .count(conn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::entities::user::UserRole;
    use crate::test_utils::{TestDatabase, days_ago, insert_category, insert_request, insert_user};
    use request::RequestStatus;

    #[tokio::test]
    async fn test_find_pending_completion_before_cutoff() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let asker = insert_user(conn, "asker", UserRole::User).await.unwrap();
        let category = insert_category(conn, "Transport").await.unwrap();

        let stale = insert_request(
            conn,
            &asker.id,
            &category.id,
            RequestStatus::PendingCompletion,
            days_ago(8),
        )
        .await
        .unwrap();
        insert_request(
            conn,
            &asker.id,
            &category.id,
            RequestStatus::PendingCompletion,
            days_ago(3),
        )
        .await
        .unwrap();
        insert_request(conn, &asker.id, &category.id, RequestStatus::InProgress, days_ago(9))
            .await
            .unwrap();

        let repo = RequestRepository::new(db.arc());
        let found = repo.find_pending_completion_before(days_ago(7)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, stale.id);
    }

    #[tokio::test]
    async fn test_offers_count_never_negative() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let asker = insert_user(conn, "asker", UserRole::User).await.unwrap();
        let category = insert_category(conn, "Transport").await.unwrap();
        let req = insert_request(conn, &asker.id, &category.id, RequestStatus::Open, days_ago(0))
            .await
            .unwrap();

        let repo = RequestRepository::new(db.arc());
        repo.increment_offers_count(conn, &req.id).await.unwrap();
        repo.decrement_offers_count(conn, &req.id).await.unwrap();
        repo.decrement_offers_count(conn, &req.id).await.unwrap();

        assert_eq!(repo.get_by_id(&req.id).await.unwrap().offers_count, 0);
    }

    #[tokio::test]
    async fn test_count_by_status() {
        let db = TestDatabase::new().await.unwrap();
        let conn = db.connection();
        let asker = insert_user(conn, "asker", UserRole::User).await.unwrap();
        let category = insert_category(conn, "Transport").await.unwrap();
        for status in [RequestStatus::Open, RequestStatus::Open, RequestStatus::Disputed] {
            insert_request(conn, &asker.id, &category.id, status, days_ago(1))
                .await
                .unwrap();
        }

        let repo = RequestRepository::new(db.arc());
        assert_eq!(repo.count_by_status(RequestStatus::Open).await.unwrap(), 2);
        assert_eq!(repo.count_by_status(RequestStatus::Completed).await.unwrap(), 0);
    }
}
