//! Artifact store keyed by job id, backed by `object_store`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use futures::TryStreamExt;
use object_store::local::LocalFileSystem;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectStore, PutPayload};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StorageError;

/// Metadata of a stored artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredArtifact {
    pub key: String,
    pub file_name: String,
    /// Absolute filesystem location under the store root.
    pub path: PathBuf,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Stores each artifact at `{job_id}/{file_name}` below the artifact root.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
}

impl ArtifactStore {
    /// Store rooted at `root`, created if missing.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created or opened by `object_store`.
    pub fn new(root: &Path) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root)?;
        let canonical = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
        let store = LocalFileSystem::new_with_prefix(&canonical)?;
        info!(root = %canonical.display(), "Artifact store ready");
        Ok(Self {
            store: Arc::new(store),
            root: canonical,
        })
    }

    /// Directory holding `{job_id}/{file}` artifacts.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key(job_id: Uuid, file_name: &str) -> ObjectPath {
        ObjectPath::from(format!("{job_id}/{file_name}"))
    }

    fn local_path(&self, location: &ObjectPath) -> PathBuf {
        location
            .parts()
            .fold(self.root.clone(), |acc, part| acc.join(part.as_ref()))
    }

    /// Copy a rendered file into the store under the job's prefix.
    pub async fn put(&self, job_id: Uuid, source: &Path) -> Result<StoredArtifact, StorageError> {
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StorageError::Other(format!("artifact path has no file name: {}", source.display())))?
            .to_string();

        let bytes = tokio::fs::read(source).await?;
        let size = bytes.len() as u64;
        let location = Self::key(job_id, &file_name);
        self.store
            .put(&location, PutPayload::from(Bytes::from(bytes)))
            .await?;

        debug!(job_id = %job_id, key = %location, size, "Artifact stored");
        Ok(StoredArtifact {
            key: location.to_string(),
            file_name,
            path: self.local_path(&location),
            size,
            last_modified: Utc::now(),
        })
    }

    /// Newest non-empty artifact stored for a job, if any.
    pub async fn locate(&self, job_id: Uuid) -> Result<Option<StoredArtifact>, StorageError> {
        let prefix = ObjectPath::from(job_id.to_string());
        let objects: Vec<_> = self.store.list(Some(&prefix)).try_collect().await?;

        Ok(objects
            .into_iter()
            .filter(|meta| meta.size > 0)
            .max_by_key(|meta| meta.last_modified)
            .map(|meta| StoredArtifact {
                key: meta.location.to_string(),
                file_name: meta.location.filename().unwrap_or_default().to_string(),
                path: self.local_path(&meta.location),
                size: meta.size as u64,
                last_modified: meta.last_modified,
            }))
    }

    /// Open the job's artifact as a byte stream.
    pub async fn open(
        &self,
        job_id: Uuid,
    ) -> Result<Option<(StoredArtifact, BoxStream<'static, Result<Bytes, object_store::Error>>)>, StorageError> {
        let Some(artifact) = self.locate(job_id).await? else {
            return Ok(None);
        };
        let result = self.store.get(&ObjectPath::from(artifact.key.as_str())).await?;
        Ok(Some((artifact, result.into_stream())))
    }
}
