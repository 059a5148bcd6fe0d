use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use taskpulse_core::CanonicalProject;

/// Progress callback taking the renderer's own 0..=100 percentage.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Errors raised while producing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("template error: {0}")]
    Template(String),

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Failed(String),
}

/// Inputs a renderer needs besides the project itself.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub job_id: Uuid,
    pub template: String,
    pub configuration: serde_json::Value,
    /// Directory the artifact is written into.
    pub output_dir: PathBuf,
}

/// Produces one artifact per job for a platform/template pair.
///
/// Implementations may call `progress` any number of times with values in
/// `0..=100` before returning the path of the written file.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    async fn render(
        &self,
        project: &CanonicalProject,
        request: &RenderRequest,
        progress: ProgressFn,
    ) -> Result<PathBuf, RenderError>;
}
