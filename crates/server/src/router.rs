//! HTTP router construction.

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use crate::api;
use crate::state::AppState;

fn cors(origin: &str) -> CorsLayer {
    if origin.trim() == "*" {
        return CorsLayer::permissive();
    }
    match HeaderValue::from_str(origin.trim()) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(origin = %origin, error = %e, "Invalid CORS_ORIGIN, allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Build the application router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors(&state.config.server.cors_origin);
    Router::new()
        .route("/health", get(api::health))
        .route(
            "/api/reports",
            get(api::list_reports).post(api::create_report),
        )
        .route("/api/reports/status/{id}", get(api::report_status))
        .route("/api/reports/download/{id}", get(api::download_report))
        .route("/api/reports/{id}/cancel", post(api::cancel_report))
        .layer(cors)
        .with_state(state)
}
