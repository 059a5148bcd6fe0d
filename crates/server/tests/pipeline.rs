//! Job runner end to end against a scripted platform.

mod common;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::*;
use taskpulse_core::JobStatus;
use taskpulse_server::reports::CANCELLED;

#[tokio::test]
async fn job_runs_from_queued_to_completed() {
    let h = harness();
    let job = h
        .runner
        .create_job("ada", "x", "standard", json!({ "projectId": "P1", "title": "Weekly pulse" }))
        .unwrap();
    assert_eq!(job.status, JobStatus::Queued);
    assert_eq!(job.progress, 0);

    let done = wait_for_terminal(h.store(), job.id).await;
    assert_eq!(done.status, JobStatus::Completed, "error: {:?}", done.error);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());
    assert!(done.error.is_none());

    let path = done.file_path.expect("file path recorded");
    assert!(Path::new(&path).starts_with(h.runner.artifacts().root()));
    let body = std::fs::read_to_string(&path).unwrap();
    assert!(body.starts_with("# Weekly pulse"));
    assert!(body.contains("Apollo"));

    // Sprints kept answering 503: retried up to the budget, then degraded.
    assert_eq!(h.transport.calls(SPRINTS_URL), 3);
    // The rendered work file is moved into the artifact store.
    assert_eq!(std::fs::read_dir(h.work.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn template_name_is_case_insensitive() {
    let h = harness();
    let job = h
        .runner
        .create_job("ada", "X", "Standard", json!({ "projectId": "P1" }))
        .unwrap();

    let done = wait_for_terminal(h.store(), job.id).await;
    assert_eq!(done.status, JobStatus::Completed, "error: {:?}", done.error);
    assert_eq!(done.progress, 100);
    assert_eq!(done.template, "Standard");
}

#[tokio::test]
async fn renderer_failure_keeps_last_checkpoint() {
    let h = harness_with(Arc::new(ExplodingRenderer), Duration::from_secs(30));
    let job = h
        .runner
        .create_job("ada", "x", "standard", json!({ "projectId": "P1" }))
        .unwrap();

    let done = wait_for_terminal(h.store(), job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    // 40 + 50% of the 40..=90 render window
    assert_eq!(done.progress, 65);
    assert_eq!(done.error.as_deref(), Some("renderer exploded"));
    assert!(done.file_path.is_none());
    assert!(done.completed_at.is_some());
}

#[tokio::test]
async fn unsupported_platform_fails_explicitly() {
    let h = harness();
    let job = h
        .runner
        .create_job("ada", "nope", "standard", json!({ "projectId": "P1" }))
        .unwrap();

    let done = wait_for_terminal(h.store(), job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.progress, 0);
    assert_eq!(done.error.as_deref(), Some("unsupported platform: nope"));
}

#[tokio::test]
async fn missing_project_record_fails_the_job() {
    let h = harness();
    let job = h
        .runner
        .create_job("ada", "x", "standard", json!({ "projectId": "GONE" }))
        .unwrap();

    let done = wait_for_terminal(h.store(), job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    let error = done.error.unwrap();
    assert!(error.contains("exhausted for project"), "{error}");
}

#[tokio::test]
async fn missing_project_id_fails_the_job() {
    let h = harness();
    let done = h
        .runner
        .run_inline("ada", "x", "standard", json!({ "title": "No id" }))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.error.as_deref(), Some("configuration has no project id"));
}

#[tokio::test]
async fn run_inline_returns_final_state() {
    let h = harness();
    let done = h
        .runner
        .run_inline("cli", "X", "standard", json!({ "projectId": "P1" }))
        .await
        .unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.progress, 100);
}

#[tokio::test]
async fn second_run_of_same_job_is_ignored() {
    let h = harness();
    let done = h
        .runner
        .run_inline("cli", "x", "standard", json!({ "projectId": "P1" }))
        .await
        .unwrap();
    let project_calls = h.transport.calls(PROJECT_URL);

    h.runner.run(done.id).await;
    assert_eq!(h.transport.calls(PROJECT_URL), project_calls);
    assert_eq!(h.store().get(done.id).unwrap().unwrap(), done);
}

#[tokio::test]
async fn stalled_stage_times_out() {
    let h = harness_with(Arc::new(StalledRenderer), Duration::from_secs(1));
    let job = h
        .runner
        .create_job("ada", "x", "standard", json!({ "projectId": "P1" }))
        .unwrap();

    let done = wait_for_terminal(h.store(), job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert_eq!(done.progress, 50);
    assert_eq!(done.error.as_deref(), Some("render stage timed out after 1s"));
}

#[tokio::test]
async fn cancel_stops_a_processing_job() {
    let h = harness_with(Arc::new(StalledRenderer), Duration::from_secs(300));
    let job = h
        .runner
        .create_job("ada", "x", "standard", json!({ "projectId": "P1" }))
        .unwrap();

    wait_for(h.store(), job.id, |j| j.progress >= 50).await;
    let cancelled = h.runner.cancel(job.id).unwrap();
    assert_eq!(cancelled.status, JobStatus::Failed);
    assert_eq!(cancelled.error.as_deref(), Some(CANCELLED));

    tokio::time::sleep(Duration::from_millis(50)).await;
    let after = h.store().get(job.id).unwrap().unwrap();
    assert_eq!(after, cancelled);

    assert!(h.runner.cancel(job.id).unwrap_err().is_conflict());
}
