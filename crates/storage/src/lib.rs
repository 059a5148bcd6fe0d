//! Artifact storage: a job-keyed store for newly produced artifacts and a
//! multi-root resolver for path hints recorded by earlier deployments.

pub mod download;
pub mod error;
pub mod resolver;
pub mod store;

pub use download::{content_type_for, download_file_name, sanitize};
pub use error::{ArtifactError, StorageError};
pub use resolver::{ArtifactResolver, ResolvedArtifact, SearchRoot};
pub use store::{ArtifactStore, StoredArtifact};
