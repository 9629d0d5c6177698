//! Review endpoints.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::AppResult;
use sawab_core::CreateReviewInput;
use sawab_db::entities::review;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub request_id: String,
    #[serde(flatten)]
    pub input: CreateReviewInput,
}

#[derive(Debug, Deserialize)]
pub struct UserReviewsRequest {
    pub user_id: String,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateReviewRequest>,
) -> AppResult<ApiResponse<review::Model>> {
    let review = state
        .review_service
        .create(&user.id, &req.request_id, req.input)
        .await?;
    Ok(ApiResponse::ok(review))
}

/// Reviews a user received.
async fn list(
    State(state): State<AppState>,
    Json(req): Json<UserReviewsRequest>,
) -> AppResult<ApiResponse<Vec<review::Model>>> {
    let reviews = state.review_service.list_for_user(&req.user_id).await?;
    Ok(ApiResponse::ok(reviews))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/list", post(list))
}
