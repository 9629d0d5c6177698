//! API endpoints.

mod admin_messages;
mod badges;
mod conversations;
mod institutions;
mod meta;
mod notifications;
mod offers;
mod reports;
mod requests;
mod reviews;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/meta", meta::router())
        .nest("/users", users::router())
        .nest("/requests", requests::router())
        .nest("/offers", offers::router())
        .nest("/conversations", conversations::router())
        .nest("/notifications", notifications::router())
        .nest("/admin-messages", admin_messages::router())
        .nest("/reports", reports::router())
        .nest("/institutions", institutions::router())
        .nest("/badges", badges::router())
        .nest("/reviews", reviews::router())
}
