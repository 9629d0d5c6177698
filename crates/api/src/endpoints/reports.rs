//! Moderation report endpoints.
//!
//! Anyone signed in may file a report; every other route is checked for
//! staff by the report service.

use axum::{Json, Router, extract::State, routing::post};
use sawab_common::AppResult;
use sawab_core::{CreateReportInput, ResolveReportInput};
use sawab_db::entities::report;
use serde::Deserialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct ReportIdRequest {
    pub report_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListReportsRequest {
    pub status: Option<report::ReportStatus>,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub until_id: Option<String>,
}

const fn default_limit() -> u64 {
    20
}

#[derive(Debug, Deserialize)]
pub struct ResolveReportRequest {
    pub report_id: String,
    #[serde(flatten)]
    pub input: ResolveReportInput,
}

#[derive(Debug, Deserialize)]
pub struct DismissReportRequest {
    pub report_id: String,
    pub note: Option<String>,
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreateReportInput>,
) -> AppResult<ApiResponse<report::Model>> {
    let report = state.report_service.create(&user.id, input).await?;
    Ok(ApiResponse::ok(report))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<report::Model>> {
    let report = state.report_service.get(&user, &req.report_id).await?;
    Ok(ApiResponse::ok(report))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ListReportsRequest>,
) -> AppResult<ApiResponse<Vec<report::Model>>> {
    let reports = state
        .report_service
        .list(&user, req.status, req.limit.min(100), req.until_id.as_deref())
        .await?;
    Ok(ApiResponse::ok(reports))
}

async fn investigate(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ReportIdRequest>,
) -> AppResult<ApiResponse<report::Model>> {
    let report = state
        .report_service
        .investigate(&user, &req.report_id)
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn resolve(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<ResolveReportRequest>,
) -> AppResult<ApiResponse<report::Model>> {
    let report = state
        .report_service
        .resolve(&user, &req.report_id, req.input)
        .await?;
    Ok(ApiResponse::ok(report))
}

async fn dismiss(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(req): Json<DismissReportRequest>,
) -> AppResult<ApiResponse<report::Model>> {
    let report = state
        .report_service
        .dismiss(&user, &req.report_id, req.note)
        .await?;
    Ok(ApiResponse::ok(report))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create))
        .route("/show", post(show))
        .route("/list", post(list))
        .route("/investigate", post(investigate))
        .route("/resolve", post(resolve))
        .route("/dismiss", post(dismiss))
}
