//! API middleware.

#![allow(missing_docs)]

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sawab_common::AppError;
use sawab_core::{
    AdminMessageService, BadgeService, ConversationService, InstitutionService, LocalEventPublisher,
    NotificationService, OfferService, ReportService, RequestService, ReviewService, UserService,
};

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub user_service: UserService,
    pub request_service: RequestService,
    pub offer_service: OfferService,
    pub conversation_service: ConversationService,
    pub notification_service: NotificationService,
    pub report_service: ReportService,
    pub institution_service: InstitutionService,
    pub badge_service: BadgeService,
    pub review_service: ReviewService,
    pub admin_message_service: AdminMessageService,
    /// Realtime events for connections held by this process.
    pub events: LocalEventPublisher,
}

/// Authentication middleware.
///
/// A valid bearer token attaches the user to the request. Unknown tokens are
/// ignored here and rejected by the extractors; banned users are turned away
/// before reaching any handler.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    if let Some(auth_header) = req.headers().get("Authorization")
        && let Ok(auth_str) = auth_header.to_str()
        && let Some(token) = auth_str.strip_prefix("Bearer ")
    {
        match state.user_service.authenticate(token).await {
            Ok(user) => {
                req.extensions_mut().insert(user);
            }
            Err(e @ AppError::Forbidden(_)) => return e.into_response(),
            Err(_) => {}
        }
    }

    next.run(req).await
}
