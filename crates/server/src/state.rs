use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use taskpulse_connector::EndpointFetcher;
use taskpulse_core::{Config, EnvConnectionProvider};
use taskpulse_storage::{ArtifactResolver, ArtifactStore};

use crate::reports::{JobRunner, JobStore, MemoryJobStore, PlatformRegistry};

pub struct AppState {
    pub config: Config,
    pub runner: Arc<JobRunner>,
    /// Fallback lookup for path hints the artifact store does not know.
    pub resolver: ArtifactResolver,
}

impl AppState {
    /// Assemble state from already-built parts.
    pub fn new(config: Config, runner: Arc<JobRunner>, resolver: ArtifactResolver) -> Self {
        Self {
            config,
            runner,
            resolver,
        }
    }

    /// Wire the default stack: journaled job store, built-in platforms,
    /// environment connections and HTTP fetching.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn JobStore> = if config.jobs.journal {
            let dir = config.storage.jobs_dir();
            Arc::new(
                MemoryJobStore::open(&dir)
                    .with_context(|| format!("failed to open job journal in {}", dir.display()))?,
            )
        } else {
            Arc::new(MemoryJobStore::new())
        };

        let artifacts = ArtifactStore::new(&config.storage.artifact_dir).with_context(|| {
            format!(
                "failed to open artifact store at {}",
                config.storage.artifact_dir.display()
            )
        })?;

        let work_dir = config.storage.work_dir();
        std::fs::create_dir_all(&work_dir)
            .with_context(|| format!("failed to create work dir {}", work_dir.display()))?;

        let fetcher = EndpointFetcher::http(reqwest::Client::new(), &config.fetch);
        let runner = JobRunner::new(
            store,
            Arc::new(PlatformRegistry::builtin()),
            Arc::new(EnvConnectionProvider::new(config.clone())),
            Arc::new(fetcher),
            artifacts,
            work_dir,
        )
        .with_stage_timeout(config.jobs.stage_timeout());

        let resolver = ArtifactResolver::from_config(&config.storage);
        info!(roots = resolver.roots().len(), "Artifact resolver ready");

        Ok(Self::new(config, Arc::new(runner), resolver))
    }
}
