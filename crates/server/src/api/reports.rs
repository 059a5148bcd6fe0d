//! Report job endpoints: create, list, status, download and cancel.

use std::path::Path as FsPath;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};
use uuid::Uuid;

use taskpulse_core::{JobStatus, ReportJob};
use taskpulse_storage::{content_type_for, download_file_name, ArtifactError};

use crate::state::AppState;

use super::{api_error, ApiError};

/// Caller identity header, set by the authenticating proxy in front of us.
pub const OWNER_HEADER: &str = "x-owner-id";
const ANONYMOUS: &str = "anonymous";

fn default_template() -> String {
    "standard".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    pub platform: String,
    #[serde(default = "default_template")]
    pub template: String,
    #[serde(default)]
    pub configuration: Value,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub owner: Option<String>,
}

fn owner(headers: &HeaderMap) -> String {
    headers
        .get(OWNER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(ANONYMOUS)
        .to_string()
}

fn not_found(id: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, format!("report job not found: {id}"))
}

fn find_job(state: &AppState, id: &str) -> Result<ReportJob, ApiError> {
    let job_id = Uuid::parse_str(id).map_err(|_| not_found(id))?;
    state
        .runner
        .store()
        .get(job_id)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .ok_or_else(|| not_found(id))
}

/// POST /api/reports: queue a report job and return at once.
pub async fn create_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateReportRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if body.platform.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "platform is required"));
    }
    let configuration = match body.configuration {
        Value::Null => json!({}),
        Value::Object(map) => Value::Object(map),
        _ => {
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                "configuration must be a JSON object",
            ))
        }
    };

    let job = state
        .runner
        .create_job(&owner(&headers), &body.platform, &body.template, configuration)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "id": job.id,
            "status": job.status,
            "progress": job.progress,
        })),
    ))
}

/// GET /api/reports: jobs newest first, optionally for one owner.
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<ReportJob>>, ApiError> {
    let owner = query.owner.as_deref().map(str::trim).filter(|o| !o.is_empty());
    state
        .runner
        .store()
        .list(owner)
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/reports/status/{id}
pub async fn report_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReportJob>, ApiError> {
    find_job(&state, &id).map(Json)
}

/// POST /api/reports/{id}/cancel
pub async fn cancel_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ReportJob>, ApiError> {
    let job = find_job(&state, &id)?;
    state.runner.cancel(job.id).map(Json).map_err(|e| {
        if e.is_conflict() {
            api_error(StatusCode::CONFLICT, e.to_string())
        } else {
            api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })
}

/// GET /api/reports/download/{id}: stream the artifact of a completed job.
///
/// The artifact store is consulted first; path hints it does not know are
/// handed to the multi-root resolver. Anything unresolvable is a 404.
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let job = find_job(&state, &id)?;
    if job.status != JobStatus::Completed {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "report is not ready",
                "jobId": job.id,
                "status": job.status,
            })),
        ));
    }
    let job_id = job.id;

    match state.runner.artifacts().open(job_id).await {
        Ok(Some((artifact, stream))) => {
            let stream = stream.inspect_err(move |e| {
                error!(job_id = %job_id, error = %e, "Artifact stream failed mid-download")
            });
            return attachment(&job, &artifact.path, artifact.size, Body::from_stream(stream));
        }
        Ok(None) => debug!(job_id = %job_id, "No stored artifact, falling back to path resolution"),
        Err(e) => warn!(job_id = %job_id, error = %e, "Artifact store lookup failed, falling back to path resolution"),
    }

    let resolver = state.resolver.clone();
    let hint = job.file_path.clone();
    let key = job_id.to_string();
    let resolved = tokio::task::spawn_blocking(move || resolver.resolve(&key, hint.as_deref()))
        .await
        .unwrap_or_else(|e| {
            Err(ArtifactError::Corrupt {
                job_id: job_id.to_string(),
                reason: e.to_string(),
            })
        })
        .map_err(|e| artifact_missing(job_id, e))?;

    let file = tokio::fs::File::open(&resolved.path).await.map_err(|e| {
        artifact_missing(
            job_id,
            ArtifactError::Corrupt {
                job_id: job_id.to_string(),
                reason: e.to_string(),
            },
        )
    })?;
    let stream = ReaderStream::new(file).inspect_err(move |e| {
        error!(job_id = %job_id, error = %e, "Artifact stream failed mid-download")
    });
    attachment(&job, &resolved.path, resolved.size, Body::from_stream(stream))
}

fn attachment(job: &ReportJob, path: &FsPath, size: u64, body: Body) -> Result<Response, ApiError> {
    let title = job
        .title()
        .or_else(|| job.project_id())
        .unwrap_or_else(|| "report".to_string());
    let date = job.completed_at.unwrap_or(job.created_at).date_naive();
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let file_name = download_file_name(&title, &job.template, date, extension);

    axum::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(path))
        .header(header::CONTENT_LENGTH, size)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{file_name}\""),
        )
        .body(body)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// 404 with diagnostics. Only the hint's file name is exposed, never a path.
fn artifact_missing(job_id: Uuid, err: ArtifactError) -> ApiError {
    warn!(job_id = %job_id, error = %err, "Artifact not available for download");
    let body = match err {
        ArtifactError::NotFound {
            hint_name,
            roots_searched,
            ..
        } => json!({
            "error": "artifact not found",
            "jobId": job_id,
            "storedHint": hint_name,
            "rootsSearched": roots_searched,
        }),
        ArtifactError::Corrupt { .. } => json!({
            "error": "artifact is unreadable",
            "jobId": job_id,
        }),
        ArtifactError::Storage(_) => json!({
            "error": "artifact is unavailable",
            "jobId": job_id,
        }),
    };
    (StatusCode::NOT_FOUND, Json(body))
}
