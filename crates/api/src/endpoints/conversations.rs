//! Chat endpoints.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::AppResult;
use sawab_core::SendMessageInput;
use sawab_db::entities::{conversation, message};
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    pub request_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsRequest {
    #[serde(default = "default_limit")]
    pub limit: u64,
}

#[derive(Debug, Deserialize)]
pub struct MessagesRequest {
    pub conversation_id: String,
    #[serde(default = "default_limit")]
    pub limit: u64,
    /// Only messages posted after this one
    pub since_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub conversation_id: String,
    #[serde(flatten)]
    pub input: SendMessageInput,
}

const fn default_limit() -> u64 {
    50
}

async fn open(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<OpenConversationRequest>,
) -> AppResult<ApiResponse<conversation::Model>> {
    let conversation = state
        .conversation_service
        .open(&user.id, &req.request_id)
        .await?;
    Ok(ApiResponse::ok(conversation))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListConversationsRequest>,
) -> AppResult<ApiResponse<Vec<conversation::Model>>> {
    let conversations = state
        .conversation_service
        .list_for_user(&user.id, req.limit.min(100))
        .await?;
    Ok(ApiResponse::ok(conversations))
}

async fn messages(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<MessagesRequest>,
) -> AppResult<ApiResponse<Vec<message::Model>>> {
    let messages = state
        .conversation_service
        .messages(
            &user.id,
            &req.conversation_id,
            req.limit,
            req.since_id.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(messages))
}

async fn send(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<ApiResponse<message::Model>> {
    let message = state
        .conversation_service
        .send(&user.id, &req.conversation_id, req.input)
        .await?;
    Ok(ApiResponse::ok(message))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/open", post(open))
        .route("/list", post(list))
        .route("/messages", post(messages))
        .route("/send", post(send))
}
