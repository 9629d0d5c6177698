//! Offer endpoints.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use sawab_common::AppResult;
use sawab_core::CreateOfferInput;
use sawab_db::entities::{offer, request};
use serde::{Deserialize, Serialize};

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Create offer request.
#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub request_id: String,
    #[serde(flatten)]
    pub input: CreateOfferInput,
}

/// Offer addressed by ID.
#[derive(Debug, Deserialize)]
pub struct OfferIdRequest {
    pub offer_id: String,
}

/// Acceptance response.
#[derive(Serialize)]
pub struct AcceptResponse {
    pub offer: offer::Model,
    pub request: request::Model,
    /// IDs of the competing offers rejected in the same transaction.
    pub rejected_offer_ids: Vec<String>,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<CreateOfferRequest>,
) -> AppResult<ApiResponse<offer::Model>> {
    let offer = state
        .offer_service
        .create(&user.id, &req.request_id, req.input)
        .await?;
    Ok(ApiResponse::ok(offer))
}

async fn withdraw(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<OfferIdRequest>,
) -> AppResult<impl IntoResponse> {
    state.offer_service.withdraw(&user.id, &req.offer_id).await?;
    Ok(response::ok())
}

async fn accept(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<OfferIdRequest>,
) -> AppResult<ApiResponse<AcceptResponse>> {
    let outcome = state.offer_service.accept(&user.id, &req.offer_id).await?;
    Ok(ApiResponse::ok(AcceptResponse {
        offer: outcome.offer,
        request: outcome.request,
        rejected_offer_ids: outcome.rejected.into_iter().map(|o| o.id).collect(),
    }))
}

async fn reject(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<OfferIdRequest>,
) -> AppResult<ApiResponse<offer::Model>> {
    let offer = state.offer_service.reject(&user.id, &req.offer_id).await?;
    Ok(ApiResponse::ok(offer))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/withdraw", post(withdraw))
        .route("/accept", post(accept))
        .route("/reject", post(reject))
}
