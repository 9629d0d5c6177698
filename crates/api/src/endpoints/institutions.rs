//! Institution endpoints.

use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
use sawab_common::AppResult;
use sawab_core::{AddMemberInput, CreateInstitutionInput, UpdateMemberInput};
use sawab_db::entities::{institution, institution_member};
use serde::Deserialize;

use crate::{
    extractors::AuthUser,
    middleware::AppState,
    response::{self, ApiResponse},
};

#[derive(Debug, Deserialize)]
pub struct InstitutionIdRequest {
    pub institution_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListInstitutionsRequest {
    #[serde(default)]
    pub verified_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub institution_id: String,
    #[serde(flatten)]
    pub input: AddMemberInput,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub institution_id: String,
    pub user_id: String,
    #[serde(flatten)]
    pub input: UpdateMemberInput,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMemberRequest {
    pub institution_id: String,
    pub user_id: String,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateInstitutionInput>,
) -> AppResult<ApiResponse<institution::Model>> {
    let institution = state.institution_service.create(&user.id, input).await?;
    Ok(ApiResponse::ok(institution))
}

async fn show(
    State(state): State<AppState>,
    Json(req): Json<InstitutionIdRequest>,
) -> AppResult<ApiResponse<institution::Model>> {
    let institution = state.institution_service.get(&req.institution_id).await?;
    Ok(ApiResponse::ok(institution))
}

async fn list(
    State(state): State<AppState>,
    Json(req): Json<ListInstitutionsRequest>,
) -> AppResult<ApiResponse<Vec<institution::Model>>> {
    let institutions = state.institution_service.list(req.verified_only).await?;
    Ok(ApiResponse::ok(institutions))
}

async fn members(
    State(state): State<AppState>,
    Json(req): Json<InstitutionIdRequest>,
) -> AppResult<ApiResponse<Vec<institution_member::Model>>> {
    let members = state
        .institution_service
        .members(&req.institution_id)
        .await?;
    Ok(ApiResponse::ok(members))
}

async fn verify(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<InstitutionIdRequest>,
) -> AppResult<ApiResponse<institution::Model>> {
    let institution = state
        .institution_service
        .verify(&user, &req.institution_id)
        .await?;
    Ok(ApiResponse::ok(institution))
}

async fn unverify(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<InstitutionIdRequest>,
) -> AppResult<ApiResponse<institution::Model>> {
    let institution = state
        .institution_service
        .unverify(&user, &req.institution_id)
        .await?;
    Ok(ApiResponse::ok(institution))
}

async fn add_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<AddMemberRequest>,
) -> AppResult<ApiResponse<institution_member::Model>> {
    let member = state
        .institution_service
        .add_member(&user, &req.institution_id, req.input)
        .await?;
    Ok(ApiResponse::ok(member))
}

async fn update_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<UpdateMemberRequest>,
) -> AppResult<ApiResponse<institution_member::Model>> {
    let member = state
        .institution_service
        .update_member(&user, &req.institution_id, &req.user_id, req.input)
        .await?;
    Ok(ApiResponse::ok(member))
}

async fn remove_member(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<RemoveMemberRequest>,
) -> AppResult<impl IntoResponse> {
    state
        .institution_service
        .remove_member(&user, &req.institution_id, &req.user_id)
        .await?;
    Ok(response::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/members", post(members))
        .route("/verify", post(verify))
        .route("/unverify", post(unverify))
        .route("/members/add", post(add_member))
        .route("/members/update", post(update_member))
        .route("/members/remove", post(remove_member))
}
