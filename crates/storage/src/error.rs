use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not configured: {0}")]
    NotConfigured(String),

    #[error("{0}")]
    Other(String),
}

/// Download-side failures. Both variants surface to callers as 404.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("artifact for job {job_id} not found ({roots_searched} locations searched)")]
    NotFound {
        job_id: String,
        /// File name of the stored hint only, never the full path.
        hint_name: Option<String>,
        roots_searched: usize,
    },

    #[error("artifact for job {job_id} is unreadable: {reason}")]
    Corrupt { job_id: String, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}
