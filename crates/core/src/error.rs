use thiserror::Error;

use crate::job::JobStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Platform not configured: {0}")]
    PlatformNotConfigured(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

/// Rejected job state change. Terminal records reject every mutation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("job is terminal ({0}) and can no longer change")]
    Terminal(JobStatus),

    #[error("invalid transition {from} -> {to}")]
    Invalid { from: JobStatus, to: JobStatus },
}
