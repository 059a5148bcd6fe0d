//! Multi-root artifact lookup for stored path hints.
//!
//! Jobs written by older deployments recorded a bare file name, a relative
//! path or an absolute path. The resolver tries the hint directly, under
//! each search root, by basename, and finally falls back to a pattern
//! search over the roots.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};
use walkdir::WalkDir;

use taskpulse_core::config::StorageConfig;

use crate::error::ArtifactError;

/// Depth of the fallback walk below each root.
const SEARCH_DEPTH: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRoot {
    pub label: &'static str,
    pub path: PathBuf,
}

/// A located artifact file.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArtifact {
    pub path: PathBuf,
    pub size: u64,
    /// Label of the root the file was found under, if not found directly.
    pub root: Option<&'static str>,
}

#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    roots: Vec<SearchRoot>,
    extension: String,
    recency: Option<Duration>,
}

impl ArtifactResolver {
    pub fn new(roots: Vec<SearchRoot>, extension: &str, recency: Option<Duration>) -> Self {
        let mut unique: Vec<SearchRoot> = Vec::with_capacity(roots.len());
        for root in roots {
            if !unique.iter().any(|r| r.path == root.path) {
                unique.push(root);
            }
        }
        Self {
            roots: unique,
            extension: extension.trim_start_matches('.').to_ascii_lowercase(),
            recency,
        }
    }

    /// Roots in search order: artifact dir, working dir, service-relative
    /// `reports/`, `REPORT_OUTPUT_DIR`, OS temp dir.
    pub fn from_config(storage: &StorageConfig) -> Self {
        let mut roots = vec![SearchRoot {
            label: "artifact_dir",
            path: storage.artifact_dir.clone(),
        }];
        if let Ok(cwd) = std::env::current_dir() {
            roots.push(SearchRoot { label: "working_dir", path: cwd });
        }
        if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf)) {
            roots.push(SearchRoot {
                label: "service_dir",
                path: exe_dir.join("reports"),
            });
        }
        if let Some(dir) = &storage.output_dir_override {
            roots.push(SearchRoot { label: "output_override", path: dir.clone() });
        }
        roots.push(SearchRoot {
            label: "temp_dir",
            path: std::env::temp_dir(),
        });

        let recency = (storage.recency_minutes > 0).then(|| Duration::from_secs(storage.recency_minutes * 60));
        Self::new(roots, &storage.artifact_extension, recency)
    }

    /// Roots in search order, duplicates removed.
    pub fn roots(&self) -> &[SearchRoot] {
        &self.roots
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Find the artifact for a job from its stored path hint.
    ///
    /// Direct candidates are tried first, then a scan of every root.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::NotFound`] carries the hint's file name and the number
    /// of roots searched.
    pub fn resolve(&self, job_id: &str, hint: Option<&str>) -> Result<ResolvedArtifact, ArtifactError> {
        let hint = hint.map(str::trim).filter(|h| !h.is_empty());
        let hint_path = hint.map(PathBuf::from);
        let hint_name = hint_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned());

        if let Some(found) = hint_path.as_deref().and_then(|h| self.direct(h, hint_name.as_deref())) {
            debug!(job_id = %job_id, path = %found.path.display(), root = ?found.root, "Artifact resolved directly");
            return Ok(found);
        }

        if let Some(found) = self.search(job_id) {
            warn!(
                job_id = %job_id,
                hint = ?hint_name,
                path = %found.path.display(),
                "Artifact hint did not resolve, using pattern search match"
            );
            return Ok(found);
        }

        warn!(job_id = %job_id, hint = ?hint_name, roots = self.roots.len(), "Artifact not found");
        Err(ArtifactError::NotFound {
            job_id: job_id.to_string(),
            hint_name,
            roots_searched: self.roots.len(),
        })
    }

    /// Absolute hint, then hint under each root, then basename under each root.
    fn direct(&self, hint: &Path, basename: Option<&str>) -> Option<ResolvedArtifact> {
        if hint.is_absolute() {
            if let Some(size) = usable_size(hint) {
                return Some(ResolvedArtifact { path: hint.to_path_buf(), size, root: None });
            }
        } else {
            for root in &self.roots {
                let candidate = root.path.join(hint);
                if let Some(size) = usable_size(&candidate) {
                    return Some(ResolvedArtifact { path: candidate, size, root: Some(root.label) });
                }
            }
        }

        let basename = basename?;
        self.roots.iter().find_map(|root| {
            let candidate = root.path.join(basename);
            usable_size(&candidate).map(|size| ResolvedArtifact {
                path: candidate,
                size,
                root: Some(root.label),
            })
        })
    }

    /// Files with the artifact extension whose stem ends with the job id;
    /// failing that, files modified within the recency window. Newest wins.
    fn search(&self, job_id: &str) -> Option<ResolvedArtifact> {
        let now = SystemTime::now();
        let mut by_id: Vec<(SystemTime, ResolvedArtifact)> = Vec::new();
        let mut recent: Vec<(SystemTime, ResolvedArtifact)> = Vec::new();

        for root in &self.roots {
            if !root.path.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&root.path)
                .max_depth(SEARCH_DEPTH)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let path = entry.path();
                let ext_matches = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(&self.extension));
                if !ext_matches {
                    continue;
                }
                let Ok(meta) = entry.metadata() else { continue };
                if meta.len() == 0 {
                    continue;
                }
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                let found = ResolvedArtifact {
                    path: path.to_path_buf(),
                    size: meta.len(),
                    root: Some(root.label),
                };

                let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
                if !job_id.is_empty() && stem.ends_with(job_id) {
                    by_id.push((modified, found));
                } else if let Some(window) = self.recency {
                    let age = now.duration_since(modified).unwrap_or_default();
                    if age <= window {
                        recent.push((modified, found));
                    }
                }
            }
        }

        let newest = |mut v: Vec<(SystemTime, ResolvedArtifact)>| {
            v.sort_by(|a, b| b.0.cmp(&a.0));
            v.into_iter().next().map(|(_, a)| a)
        };
        newest(by_id).or_else(|| newest(recent))
    }
}

/// Size of a regular, non-empty file.
fn usable_size(path: &Path) -> Option<u64> {
    let meta = std::fs::metadata(path).ok()?;
    (meta.is_file() && meta.len() > 0).then_some(meta.len())
}
