//! HTTP API layer for sawab.
//!
//! This crate provides the REST API and real-time streaming:
//!
//! - **Endpoints**: thin handlers over the core services
//! - **Extractors**: Authentication and staff checks
//! - **Middleware**: Bearer token authentication, ban enforcement
//! - **Streaming**: WebSocket push of notifications and chat messages
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod streaming;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub use endpoints::router;
pub use middleware::AppState;
pub use streaming::streaming_handler;

/// The full HTTP application: API routes under `/api`, the stream at
/// `/streaming`.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/streaming", get(streaming_handler))
        .nest("/api", router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
