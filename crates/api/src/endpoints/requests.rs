//! Help request endpoints.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::AppResult;
use sawab_core::{CompletionTrigger, CreateRequestInput, UpdateRequestInput};
use sawab_db::entities::{category, offer, request};
use serde::{Deserialize, Serialize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Request addressed by ID.
#[derive(Debug, Deserialize)]
pub struct RequestIdRequest {
    pub request_id: String,
}

/// Edit request.
#[derive(Debug, Deserialize)]
pub struct UpdateRequestRequest {
    pub request_id: String,
    #[serde(flatten)]
    pub input: UpdateRequestInput,
}

/// List requests.
#[derive(Debug, Deserialize)]
pub struct ListRequestsRequest {
    pub status: Option<request::RequestStatus>,
    pub category_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    20
}

/// Completion response.
#[derive(Serialize)]
pub struct CompleteResponse {
    pub request: request::Model,
    pub helper_id: String,
    pub helper_balance: i32,
    /// Names of the badges awarded by this completion.
    pub badges: Vec<String>,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateRequestInput>,
) -> AppResult<ApiResponse<request::Model>> {
    let request = state.request_service.create(&user.id, input).await?;
    Ok(ApiResponse::ok(request))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateRequestRequest>,
) -> AppResult<ApiResponse<request::Model>> {
    let request = state
        .request_service
        .update(&user.id, &req.request_id, req.input)
        .await?;
    Ok(ApiResponse::ok(request))
}

async fn show(
    State(state): State<AppState>,
    Json(req): Json<RequestIdRequest>,
) -> AppResult<ApiResponse<request::Model>> {
    let request = state.request_service.get(&req.request_id).await?;
    Ok(ApiResponse::ok(request))
}

async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListRequestsRequest>,
) -> AppResult<ApiResponse<Vec<request::Model>>> {
    let requests = state
        .request_service
        .list(
            req.status,
            req.category_id.as_deref(),
            req.limit,
            req.until_id.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(requests))
}

async fn categories(
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<category::Model>>> {
    let categories = state.request_service.categories().await?;
    Ok(ApiResponse::ok(categories))
}

async fn offers(
    State(state): State<AppState>,
    Json(req): Json<RequestIdRequest>,
) -> AppResult<ApiResponse<Vec<offer::Model>>> {
    let offers = state.offer_service.list_for_request(&req.request_id).await?;
    Ok(ApiResponse::ok(offers))
}

/// The helper reports the work as done.
async fn mark_pending(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RequestIdRequest>,
) -> AppResult<ApiResponse<request::Model>> {
    let request = state
        .request_service
        .mark_pending(&user.id, &req.request_id)
        .await?;
    Ok(ApiResponse::ok(request))
}

/// The asker confirms, or staff resolve a dispute in the helper's favour.
async fn complete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RequestIdRequest>,
) -> AppResult<ApiResponse<CompleteResponse>> {
    let request = state.request_service.get(&req.request_id).await?;
    let completion = state
        .request_service
        .complete(CompletionTrigger::for_actor(&user, &request), &request.id)
        .await?;

    Ok(ApiResponse::ok(CompleteResponse {
        request: completion.request,
        helper_id: completion.helper_id,
        helper_balance: completion.balance,
        badges: completion
            .badges
            .into_iter()
            .map(|awarded| awarded.badge.name)
            .collect(),
    }))
}

async fn dispute(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RequestIdRequest>,
) -> AppResult<ApiResponse<request::Model>> {
    let request = state
        .request_service
        .open_dispute(&user.id, &req.request_id)
        .await?;
    Ok(ApiResponse::ok(request))
}

async fn cancel(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RequestIdRequest>,
) -> AppResult<ApiResponse<request::Model>> {
    let request = state.request_service.cancel(&user, &req.request_id).await?;
    Ok(ApiResponse::ok(request))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/update", post(update))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/categories", post(categories))
        .route("/offers", post(offers))
        .route("/mark-pending", post(mark_pending))
        .route("/complete", post(complete))
        .route("/dispute", post(dispute))
        .route("/cancel", post(cancel))
}
