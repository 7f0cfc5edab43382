//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// Only the fixed endpoints get routes; everything under `/v2/<name>/...`
/// goes through the fallback because image names may span multiple path
/// segments, which router patterns cannot capture.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/v2/", get(handlers::api_version))
        .fallback(handlers::registry_fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
