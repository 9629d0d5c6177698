//! Post-completion reviews.

use std::sync::Arc;

use chrono::Utc;
use sawab_common::{AppError, AppResult, IdGenerator};
use sawab_db::{
    entities::{request::RequestStatus, review},
    repositories::{OfferRepository, RequestRepository, ReviewRepository},
};
use sea_orm::{DatabaseConnection, Set};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateReviewInput {
    pub reviewee_id: String,
    #[validate(range(min = 1, max = 5, message = "must be between 1 and 5"))]
    pub rating: i32,
    #[validate(length(max = 1000, message = "must be at most 1000 characters"))]
    pub comment: Option<String>,
}

/// Lets the asker and the helper of a completed request rate each other once.
#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DatabaseConnection>,
    review_repo: ReviewRepository,
    request_repo: RequestRepository,
    offer_repo: OfferRepository,
    id_gen: IdGenerator,
}

impl ReviewService {
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            review_repo: ReviewRepository::new(db.clone()),
            request_repo: RequestRepository::new(db.clone()),
            offer_repo: OfferRepository::new(db.clone()),
            db,
            id_gen: IdGenerator::new(),
        }
    }

    pub async fn create(
        &self,
        reviewer_id: &str,
        request_id: &str,
        input: CreateReviewInput,
    ) -> AppResult<review::Model> {
        input.validate()?;

        let request = self.request_repo.get_by_id(request_id).await?;
        if request.status != RequestStatus::Completed {
            return Err(AppError::InvalidState(
                "Only completed requests can be reviewed".to_string(),
            ));
        }

        let helper_id = self
            .offer_repo
            .find_accepted(self.db.as_ref(), request_id)
            .await?
            .map(|offer| offer.user_id)
            .ok_or_else(|| AppError::InvalidState("Request has no accepted offer".to_string()))?;

        let pair_ok = (reviewer_id == request.user_id && input.reviewee_id == helper_id)
            || (reviewer_id == helper_id && input.reviewee_id == request.user_id);
        if !pair_ok {
            return Err(AppError::Forbidden(
                "Only the asker and the helper can review each other".to_string(),
            ));
        }

        if self
            .review_repo
            .exists(request_id, reviewer_id, &input.reviewee_id)
            .await?
        {
            return Err(AppError::Conflict(
                "You already reviewed this user for this request".to_string(),
            ));
        }

        let review = self
            .review_repo
            .create(review::ActiveModel {
                id: Set(self.id_gen.generate()),
                request_id: Set(request.id),
                reviewer_id: Set(reviewer_id.to_string()),
                reviewee_id: Set(input.reviewee_id),
                rating: Set(input.rating),
                comment: Set(input.comment),
                created_at: Set(Utc::now().into()),
            })
            .await?;

        info!(review_id = %review.id, request_id, reviewer_id, "Review created");
        Ok(review)
    }

    /// Reviews a user received.
    pub async fn list_for_user(&self, user_id: &str) -> AppResult<Vec<review::Model>> {
        self.review_repo.find_by_reviewee(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_range() {
        let input = |rating| CreateReviewInput {
            reviewee_id: "u2".to_string(),
            rating,
            comment: None,
        };
        assert!(input(0).validate().is_err());
        assert!(input(1).validate().is_ok());
        assert!(input(5).validate().is_ok());
        assert!(input(6).validate().is_err());
    }
}
