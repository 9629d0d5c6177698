//! Badge endpoints.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::AppResult;
use sawab_db::entities::badge;
use serde::{Deserialize, Serialize};

use crate::{
    extractors::StaffUser,
    middleware::AppState,
    response::ApiResponse,
};

#[derive(Debug, Deserialize)]
pub struct UserBadgesRequest {
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
pub struct AwardRequest {
    pub user_id: String,
    pub badge_id: String,
}

/// Whether the call changed anything.
#[derive(Serialize)]
pub struct ChangedResponse {
    pub changed: bool,
}

async fn catalog(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<badge::Model>>> {
    let badges = state.badge_service.catalog().await?;
    Ok(ApiResponse::ok(badges))
}

async fn user_badges(
    State(state): State<AppState>,
    Json(req): Json<UserBadgesRequest>,
) -> AppResult<ApiResponse<Vec<badge::Model>>> {
    let badges = state.badge_service.user_badges(&req.user_id).await?;
    Ok(ApiResponse::ok(badges))
}

async fn award(
    StaffUser(staff): StaffUser,
    State(state): State<AppState>,
    Json(req): Json<AwardRequest>,
) -> AppResult<ApiResponse<ChangedResponse>> {
    let award = state
        .badge_service
        .award(&staff.id, &req.user_id, &req.badge_id)
        .await?;
    Ok(ApiResponse::ok(ChangedResponse {
        changed: award.is_some(),
    }))
}

async fn revoke(
    StaffUser(_staff): StaffUser,
    State(state): State<AppState>,
    Json(req): Json<AwardRequest>,
) -> AppResult<ApiResponse<ChangedResponse>> {
    let changed = state
        .badge_service
        .revoke(&req.user_id, &req.badge_id)
        .await?;
    Ok(ApiResponse::ok(ChangedResponse { changed }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(catalog))
        .route("/user", post(user_badges))
        .route("/award", post(award))
        .route("/revoke", post(revoke))
}
