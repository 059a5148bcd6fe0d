use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;

use crate::state::AppState;

#[derive(Serialize)]
pub struct PlatformInfo {
    pub name: String,
    pub templates: Vec<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub jobs: usize,
    pub platforms: Vec<PlatformInfo>,
    pub config: Value,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let jobs = state
        .runner
        .store()
        .list(None)
        .map(|jobs| jobs.len())
        .unwrap_or(0);
    let platforms = state
        .runner
        .registry()
        .describe()
        .into_iter()
        .map(|(name, templates)| PlatformInfo { name, templates })
        .collect();

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        jobs,
        platforms,
        config: state.config.redacted_summary(),
    })
}
