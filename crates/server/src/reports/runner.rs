//! Report job runner: accepts jobs and drives each one through
//! fetch, normalize, render and persist on its own background task.
//!
//! [`JobRunner::create_job`] records the job as `queued` and returns at once.
//! The spawned pipeline claims the job with a compare-and-swap, reports
//! progress at fixed checkpoints (fetch 10, normalize 30, render 40..=90,
//! completed 100) and fails the job with the error message if any stage
//! errors, times out or is cancelled.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Context};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use taskpulse_connector::EndpointFetcher;
use taskpulse_core::{ConnectionProvider, ReportJob};
use taskpulse_ingest::Normalizer;
use taskpulse_render::{ProgressFn, RenderRequest};
use taskpulse_storage::ArtifactStore;

use super::registry::PlatformRegistry;
use super::store::{JobStore, JobStoreError};

pub const FETCHED: u8 = 10;
pub const NORMALIZED: u8 = 30;
pub const RENDER_START: u8 = 40;
pub const RENDER_END: u8 = 90;

/// Error recorded on a job stopped through [`JobRunner::cancel`].
pub const CANCELLED: &str = "cancelled";

/// Map the renderer's own 0..=100 into the orchestrator's render window.
pub fn render_progress(percent: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    let window = u32::from(RENDER_END - RENDER_START);
    RENDER_START + (percent * window / 100) as u8
}

pub struct JobRunner {
    store: Arc<dyn JobStore>,
    registry: Arc<PlatformRegistry>,
    connections: Arc<dyn ConnectionProvider>,
    fetcher: Arc<EndpointFetcher>,
    artifacts: ArtifactStore,
    work_dir: PathBuf,
    stage_timeout: Duration,
    cancellations: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl JobRunner {
    /// Runner with the default five minute stage deadline.
    pub fn new(
        store: Arc<dyn JobStore>,
        registry: Arc<PlatformRegistry>,
        connections: Arc<dyn ConnectionProvider>,
        fetcher: Arc<EndpointFetcher>,
        artifacts: ArtifactStore,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            registry,
            connections,
            fetcher,
            artifacts,
            work_dir,
            stage_timeout: Duration::from_secs(300),
            cancellations: Mutex::new(HashMap::new()),
        }
    }

    /// Deadline applied to each of fetch, normalize, render and persist.
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Job records, shared with the HTTP handlers.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Platforms and templates jobs can be dispatched to.
    pub fn registry(&self) -> &Arc<PlatformRegistry> {
        &self.registry
    }

    /// Where completed jobs' artifacts are kept.
    pub fn artifacts(&self) -> &ArtifactStore {
        &self.artifacts
    }

    /// Record a new queued job and run it on a background task.
    ///
    /// Returns the job as persisted, before any processing has happened.
    pub fn create_job(
        self: &Arc<Self>,
        owner_id: &str,
        platform: &str,
        template: &str,
        configuration: Value,
    ) -> Result<ReportJob, JobStoreError> {
        let job = self.enqueue(owner_id, platform, template, configuration)?;
        let runner = Arc::clone(self);
        let job_id = job.id;
        tokio::spawn(async move {
            runner.run(job_id).await;
        });
        Ok(job)
    }

    /// Record a job and run it on the current task, returning its final state.
    pub async fn run_inline(
        &self,
        owner_id: &str,
        platform: &str,
        template: &str,
        configuration: Value,
    ) -> Result<ReportJob, JobStoreError> {
        let job = self.enqueue(owner_id, platform, template, configuration)?;
        self.run(job.id).await;
        self.store.get(job.id)?.ok_or(JobStoreError::NotFound(job.id))
    }

    fn enqueue(
        &self,
        owner_id: &str,
        platform: &str,
        template: &str,
        configuration: Value,
    ) -> Result<ReportJob, JobStoreError> {
        let job = ReportJob::new(owner_id, platform, template, configuration);
        self.store.insert(job.clone())?;
        if let Ok(mut tokens) = self.cancellations.lock() {
            tokens.insert(job.id, CancellationToken::new());
        }
        info!(
            job_id = %job.id,
            owner = %job.owner_id,
            platform = %job.platform,
            template = %job.template,
            "Report job queued"
        );
        Ok(job)
    }

    /// Fail a queued or processing job with `"cancelled"` and stop its pipeline.
    pub fn cancel(&self, job_id: Uuid) -> Result<ReportJob, JobStoreError> {
        let job = self.store.fail(job_id, CANCELLED)?;
        if let Some(token) = self.token(job_id) {
            token.cancel();
        }
        info!(job_id = %job_id, progress = job.progress, "Report job cancelled");
        Ok(job)
    }

    fn token(&self, job_id: Uuid) -> Option<CancellationToken> {
        self.cancellations
            .lock()
            .ok()
            .and_then(|tokens| tokens.get(&job_id).cloned())
    }

    fn forget(&self, job_id: Uuid) {
        if let Ok(mut tokens) = self.cancellations.lock() {
            tokens.remove(&job_id);
        }
    }

    /// Run the pipeline for a queued job. Exactly one caller wins the
    /// `queued -> processing` claim; everyone else returns immediately.
    pub async fn run(&self, job_id: Uuid) {
        let cancel = self.token(job_id).unwrap_or_default();
        let job = match self.store.try_begin(job_id) {
            Ok(job) => job,
            Err(e) => {
                debug!(job_id = %job_id, error = %e, "Job not claimable, skipping");
                self.forget(job_id);
                return;
            }
        };
        info!(job_id = %job_id, platform = %job.platform, "Report job processing");

        let start = Instant::now();
        let result = self.execute(&job, &cancel).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(file_path) => match self.store.complete(job_id, &file_path) {
                Ok(_) => info!(
                    job_id = %job_id,
                    file_path = %file_path,
                    duration_ms,
                    "Report job completed"
                ),
                Err(e) => warn!(job_id = %job_id, error = %e, "Could not mark job completed"),
            },
            Err(e) => {
                let message = format!("{e:#}");
                match self.store.fail(job_id, &message) {
                    Ok(job) => error!(
                        job_id = %job_id,
                        progress = job.progress,
                        duration_ms,
                        error = %message,
                        "Report job failed"
                    ),
                    Err(store_err) => debug!(
                        job_id = %job_id,
                        error = %message,
                        store_error = %store_err,
                        "Job already terminal, failure not recorded"
                    ),
                }
            }
        }
        self.forget(job_id);
    }

    async fn execute(&self, job: &ReportJob, cancel: &CancellationToken) -> anyhow::Result<String> {
        let dispatch = self.registry.resolve(&job.platform, &job.template)?;
        let project_id = job
            .project_id()
            .ok_or_else(|| anyhow!("configuration has no project id"))?;
        let connection = self.connections.connection_for(&dispatch.platform)?;

        let bundle = self
            .stage(
                "fetch",
                cancel,
                self.fetcher
                    .fetch_bundle(&dispatch.catalog, &project_id, &connection, cancel),
            )
            .await?;
        self.checkpoint(job.id, FETCHED)?;

        let platform = dispatch.platform.clone();
        let project = self
            .stage("normalize", cancel, async move {
                tokio::task::spawn_blocking(move || {
                    Normalizer::new(platform).normalize(
                        &bundle.project,
                        &bundle.task_records(),
                        &bundle.sprints,
                        &bundle.team,
                    )
                })
                .await
            })
            .await?;
        self.checkpoint(job.id, NORMALIZED)?;
        debug!(
            job_id = %job.id,
            tasks = project.tasks.len(),
            sprints = project.sprints.len(),
            team = project.team.len(),
            "Project normalized"
        );

        self.checkpoint(job.id, RENDER_START)?;
        let request = RenderRequest {
            job_id: job.id,
            template: dispatch.template.clone(),
            configuration: job.configuration.clone(),
            output_dir: self.work_dir.clone(),
        };
        let store = Arc::clone(&self.store);
        let job_id = job.id;
        let progress: ProgressFn = Arc::new(move |percent: u8| {
            if let Err(e) = store.advance_progress(job_id, render_progress(percent)) {
                debug!(job_id = %job_id, error = %e, "Render progress not recorded");
            }
        });
        let rendered = self
            .stage(
                "render",
                cancel,
                dispatch.renderer.render(&project, &request, progress),
            )
            .await?;
        debug!(job_id = %job.id, renderer = dispatch.renderer.name(), path = %rendered.display(), "Artifact rendered");

        let stored = self
            .stage("persist", cancel, async {
                self.artifacts
                    .put(job.id, &rendered)
                    .await
                    .context("failed to store artifact")
            })
            .await?;
        if let Err(e) = tokio::fs::remove_file(&rendered).await {
            debug!(path = %rendered.display(), error = %e, "Could not remove rendered work file");
        }

        Ok(stored.path.display().to_string())
    }

    fn checkpoint(&self, job_id: Uuid, progress: u8) -> anyhow::Result<()> {
        match self.store.advance_progress(job_id, progress) {
            Ok(_) => Ok(()),
            Err(e) if e.is_conflict() => bail!(CANCELLED),
            Err(e) => Err(e.into()),
        }
    }

    /// Run one stage under the stage deadline, aborting on cancellation.
    async fn stage<T, E, F>(&self, name: &str, cancel: &CancellationToken, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<anyhow::Error>,
    {
        tokio::select! {
            _ = cancel.cancelled() => bail!(CANCELLED),
            outcome = tokio::time::timeout(self.stage_timeout, fut) => match outcome {
                Ok(result) => result.map_err(Into::into),
                Err(_) => bail!(
                    "{name} stage timed out after {}s",
                    self.stage_timeout.as_secs()
                ),
            },
        }
    }
}
