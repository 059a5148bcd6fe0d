//! Shared fixtures: a scripted platform "x" wired into a [`JobRunner`].

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use uuid::Uuid;

use taskpulse_connector::testing::{Reply, ScriptedTransport};
use taskpulse_connector::{EndpointCatalog, EndpointFetcher, EndpointSpec, RecordingSleeper, ResourceKind};
use taskpulse_core::config::FetchConfig;
use taskpulse_core::{CanonicalProject, ConnectionConfig, Credential, ReportJob, StaticConnectionProvider};
use taskpulse_render::{MarkdownRenderer, ProgressFn, RenderError, RenderRequest, Renderer};
use taskpulse_server::reports::{JobRunner, JobStore, MemoryJobStore, PlatformRegistry};
use taskpulse_storage::ArtifactStore;

pub const BASE: &str = "http://x.test";
pub const PROJECT_URL: &str = "http://x.test/projects/P1";
pub const TASKS_URL: &str = "http://x.test/projects/P1/tasks";
pub const SPRINTS_URL: &str = "http://x.test/projects/P1/sprints";

pub fn catalog() -> EndpointCatalog {
    EndpointCatalog::new()
        .with(ResourceKind::Project, EndpointSpec::get("/projects/{project_id}").record())
        .with(ResourceKind::Tasks, EndpointSpec::get("/projects/{project_id}/tasks").collection(&["tasks"]))
        .with(ResourceKind::Sprints, EndpointSpec::get("/projects/{project_id}/sprints").collection(&["sprints"]))
        .with(ResourceKind::Team, EndpointSpec::get("/projects/{project_id}/members").collection(&["members"]))
}

/// Project and tasks answer; sprints keep failing with 503; members are unscripted (404).
pub fn transport() -> ScriptedTransport {
    ScriptedTransport::new()
        .on(
            PROJECT_URL,
            Reply::Json(json!({ "data": { "id": "P1", "name": "Apollo", "status": "active" } })),
        )
        .on(
            TASKS_URL,
            Reply::Json(json!({
                "tasks": [
                    { "id": "T1", "title": "Ship it", "status": "done", "assignee": "Ada", "priority": "high" },
                    { "id": "T2", "title": "Test it", "status": "in progress", "assignee": "Grace" }
                ]
            })),
        )
        .on(SPRINTS_URL, Reply::Status(503))
}

pub struct Harness {
    pub runner: Arc<JobRunner>,
    pub transport: Arc<ScriptedTransport>,
    pub artifacts: TempDir,
    pub work: TempDir,
}

impl Harness {
    pub fn store(&self) -> &Arc<dyn JobStore> {
        self.runner.store()
    }
}

pub fn harness() -> Harness {
    harness_with(Arc::new(MarkdownRenderer::new()), Duration::from_secs(30))
}

pub fn harness_with(renderer: Arc<dyn Renderer>, stage_timeout: Duration) -> Harness {
    let transport = Arc::new(transport());
    let artifacts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();

    let registry = PlatformRegistry::empty();
    registry.register("x", catalog()).unwrap();
    registry.register_renderer("x", "standard", renderer).unwrap();

    let connections = StaticConnectionProvider::new()
        .with("x", ConnectionConfig::new(BASE, Credential::None));
    let fetcher = EndpointFetcher::new(
        transport.clone(),
        Arc::new(RecordingSleeper::new()),
        &FetchConfig::default(),
    );

    let runner = JobRunner::new(
        Arc::new(MemoryJobStore::new()),
        Arc::new(registry),
        Arc::new(connections),
        Arc::new(fetcher),
        ArtifactStore::new(artifacts.path()).unwrap(),
        work.path().to_path_buf(),
    )
    .with_stage_timeout(stage_timeout);

    Harness {
        runner: Arc::new(runner),
        transport,
        artifacts,
        work,
    }
}

pub async fn wait_for(store: &Arc<dyn JobStore>, id: Uuid, done: impl Fn(&ReportJob) -> bool) -> ReportJob {
    for _ in 0..500 {
        if let Some(job) = store.get(id).unwrap() {
            if done(&job) {
                return job;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach the expected state");
}

pub async fn wait_for_terminal(store: &Arc<dyn JobStore>, id: Uuid) -> ReportJob {
    wait_for(store, id, |job| job.is_terminal()).await
}

/// Reports half progress, then fails.
pub struct ExplodingRenderer;

#[async_trait]
impl Renderer for ExplodingRenderer {
    fn name(&self) -> &str {
        "exploding"
    }

    async fn render(
        &self,
        _project: &CanonicalProject,
        _request: &RenderRequest,
        progress: ProgressFn,
    ) -> Result<PathBuf, RenderError> {
        progress(50);
        Err(RenderError::Failed("renderer exploded".to_string()))
    }
}

/// Reports 20 % and then never finishes.
pub struct StalledRenderer;

#[async_trait]
impl Renderer for StalledRenderer {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn render(
        &self,
        _project: &CanonicalProject,
        _request: &RenderRequest,
        progress: ProgressFn,
    ) -> Result<PathBuf, RenderError> {
        progress(20);
        tokio::time::sleep(Duration::from_secs(600)).await;
        Err(RenderError::Failed("unreachable".to_string()))
    }
}
