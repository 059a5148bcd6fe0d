//! HTTP handlers.

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

mod health;
mod reports;

pub use health::health;
pub use reports::{cancel_report, create_report, download_report, list_reports, report_status};

/// Error response used by every handler: a status code and `{ "error": ... }`.
pub type ApiError = (StatusCode, Json<Value>);

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}
