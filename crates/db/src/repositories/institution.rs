//! Institution and membership repository.

use std::sync::Arc;

use crate::entities::{Institution, InstitutionMember, institution, institution_member};
use sawab_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder,
};

/// Institution repository for database operations.
#[derive(Clone)]
pub struct InstitutionRepository {
    db: Arc<DatabaseConnection>,
}

impl InstitutionRepository {
    /// Create a new institution repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an institution by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<institution::Model>> {
        Institution::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get an institution by ID.
    pub async fn get_by_id(&self, id: &str) -> AppResult<institution::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Institution {id}")))
    }

    /// Create an institution.
    pub async fn create(&self, model: institution::ActiveModel) -> AppResult<institution::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update an institution.
    pub async fn update(&self, model: institution::ActiveModel) -> AppResult<institution::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List institutions by name, optionally only verified ones.
    pub async fn list(&self, verified_only: bool) -> AppResult<Vec<institution::Model>> {
        let mut query = Institution::find().order_by_asc(institution::Column::Name);
        if verified_only {
            query = query.filter(institution::Column::Verified.eq(true));
        }
        query
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find one membership.
    pub async fn find_member(
        &self,
        institution_id: &str,
        user_id: &str,
    ) -> AppResult<Option<institution_member::Model>> {
        InstitutionMember::find()
            .filter(institution_member::Column::InstitutionId.eq(institution_id))
            .filter(institution_member::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Members of an institution in join order.
    pub async fn find_members(
        &self,
        institution_id: &str,
    ) -> AppResult<Vec<institution_member::Model>> {
        InstitutionMember::find()
            .filter(institution_member::Column::InstitutionId.eq(institution_id))
            .order_by_asc(institution_member::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Add a membership.
    pub async fn add_member(
        &self,
        model: institution_member::ActiveModel,
    ) -> AppResult<institution_member::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Update a membership.
    pub async fn update_member(
        &self,
        model: institution_member::ActiveModel,
    ) -> AppResult<institution_member::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a membership.
    pub async fn remove_member(&self, member: institution_member::Model) -> AppResult<()> {
        member
            .delete(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Number of `admin` members.
    pub async fn count_admins(&self, institution_id: &str) -> AppResult<u64> {
        InstitutionMember::find()
            .filter(institution_member::Column::InstitutionId.eq(institution_id))
            .filter(institution_member::Column::Role.eq(institution_member::MemberRole::Admin))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// The earliest `admin` member.
    pub async fn first_admin(
        &self,
        institution_id: &str,
    ) -> AppResult<Option<institution_member::Model>> {
        InstitutionMember::find()
            .filter(institution_member::Column::InstitutionId.eq(institution_id))
            .filter(institution_member::Column::Role.eq(institution_member::MemberRole::Admin))
            .order_by_asc(institution_member::Column::Id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
