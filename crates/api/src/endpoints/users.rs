//! Users endpoints.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::{AppError, AppResult};
use sawab_core::LeaderboardEntry;
use sawab_db::entities::user;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// User response.
#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub created_at: String,
    pub username: String,
    pub name: Option<String>,
    pub role: user::UserRole,
    pub sawab_balance: i32,
    pub is_banned: bool,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            is_banned: user.is_banned(),
            id: user.id,
            created_at: user.created_at.to_rfc3339(),
            username: user.username,
            name: user.name,
            role: user.role,
            sawab_balance: user.sawab_balance,
        }
    }
}

/// Get current user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.into())
}

/// Show user request.
#[derive(Debug, Deserialize)]
pub struct ShowUserRequest {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

/// Get a user by ID or username.
async fn show(
    State(state): State<AppState>,
    Json(req): Json<ShowUserRequest>,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = if let Some(user_id) = req.user_id {
        state.user_service.get(&user_id).await?
    } else if let Some(username) = req.username {
        state.user_service.get_by_username(&username).await?
    } else {
        return Err(AppError::BadRequest(
            "Either user_id or username is required".to_string(),
        ));
    };

    Ok(ApiResponse::ok(user.into()))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardRequest {
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    10
}

async fn leaderboard(
    State(state): State<AppState>,
    Json(req): Json<LeaderboardRequest>,
) -> AppResult<ApiResponse<Vec<LeaderboardEntry>>> {
    let entries = state.user_service.leaderboard(req.limit).await?;
    Ok(ApiResponse::ok(entries))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", post(me))
        .route("/show", post(show))
        .route("/leaderboard", post(leaderboard))
}
