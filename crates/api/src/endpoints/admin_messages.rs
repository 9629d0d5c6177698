//! Admin message endpoints.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::AppResult;
use sawab_core::{AdminThread, SendAdminMessageInput};
use sawab_db::entities::admin_message;
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// List threads request.
#[derive(Debug, Deserialize)]
pub struct ListThreadsRequest {
    /// Maximum results (default: 20, max: 100)
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    20
}

/// Thread addressed by the other participant.
#[derive(Debug, Deserialize)]
pub struct ThreadRequest {
    pub user_id: String,
}

/// Count response.
#[derive(Serialize)]
pub struct CountResponse {
    pub count: u64,
}

/// Send a message to staff, or as staff to a member.
async fn send(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<SendAdminMessageInput>,
) -> AppResult<ApiResponse<admin_message::Model>> {
    let message = state.admin_message_service.send(&user, input).await?;
    Ok(ApiResponse::ok(message))
}

/// List the caller's threads.
async fn threads(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListThreadsRequest>,
) -> AppResult<ApiResponse<Vec<AdminThread>>> {
    let threads = state
        .admin_message_service
        .threads(&user, req.limit.min(100))
        .await?;
    Ok(ApiResponse::ok(threads))
}

/// Show one thread and mark it read.
async fn thread(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ThreadRequest>,
) -> AppResult<ApiResponse<Vec<admin_message::Model>>> {
    let messages = state
        .admin_message_service
        .thread(&user, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(messages))
}

/// Mark a thread read without loading it.
async fn mark_as_read(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ThreadRequest>,
) -> AppResult<ApiResponse<CountResponse>> {
    let count = state
        .admin_message_service
        .mark_thread_read(&user, &req.user_id)
        .await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

/// Get unread admin message count.
async fn unread_count(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<CountResponse>> {
    let count = state.admin_message_service.unread_count(&user.id).await?;
    Ok(ApiResponse::ok(CountResponse { count }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/send", post(send))
        .route("/threads", post(threads))
        .route("/thread", post(thread))
        .route("/mark-as-read", post(mark_as_read))
        .route("/unread-count", post(unread_count))
}
