//! Report job records with conditional, field-level updates.
//!
//! Every mutation runs under a single write lock and goes through the
//! [`ReportJob`] state machine, so a check and its write can never interleave
//! with another writer. When a journal path is configured, each accepted
//! mutation appends the full record as one JSON line; [`MemoryJobStore::open`]
//! replays that file at startup.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use taskpulse_core::{ReportJob, TransitionError};

pub const JOURNAL_FILE: &str = "jobs.jsonl";

/// Error recorded on jobs that were still live when the process stopped.
pub const INTERRUPTED: &str = "interrupted by restart";

#[derive(Error, Debug)]
pub enum JobStoreError {
    #[error("job not found: {0}")]
    NotFound(Uuid),

    #[error("job already exists: {0}")]
    Duplicate(Uuid),

    #[error("job {id}: {source}")]
    Transition {
        id: Uuid,
        #[source]
        source: TransitionError,
    },

    #[error("job store lock poisoned")]
    Poisoned,

    #[error("journal error: {0}")]
    Journal(#[from] std::io::Error),
}

impl JobStoreError {
    /// True when the job exists but its state rejected the write.
    pub fn is_conflict(&self) -> bool {
        matches!(self, JobStoreError::Transition { .. })
    }
}

/// Persistent job records. Terminal records reject every mutation.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: ReportJob) -> Result<(), JobStoreError>;

    fn get(&self, id: Uuid) -> Result<Option<ReportJob>, JobStoreError>;

    /// Jobs newest first, optionally restricted to one owner.
    fn list(&self, owner: Option<&str>) -> Result<Vec<ReportJob>, JobStoreError>;

    /// Compare-and-swap `queued -> processing`. Only one caller can win.
    fn try_begin(&self, id: Uuid) -> Result<ReportJob, JobStoreError>;

    /// Raise progress while processing. `Ok(false)` when the value would not
    /// increase it.
    fn advance_progress(&self, id: Uuid, progress: u8) -> Result<bool, JobStoreError>;

    fn complete(&self, id: Uuid, file_path: &str) -> Result<ReportJob, JobStoreError>;

    fn fail(&self, id: Uuid, error: &str) -> Result<ReportJob, JobStoreError>;
}

/// In-process job store backed by an insertion-ordered map and an optional
/// JSON-lines journal.
///
/// Journal lines are appended while the write lock is held so they land in
/// the same order as the updates. The append is a blocking file write: with a
/// journal configured, every reader waits for it, including progress updates
/// issued from async tasks.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<IndexMap<Uuid, ReportJob>>,
    journal: Option<PathBuf>,
}

impl MemoryJobStore {
    /// Store without a journal; records live only as long as the process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Journaled store under `dir`. Replays `dir/jobs.jsonl` (last line per id
    /// wins), fails jobs that never reached a terminal state and rewrites the
    /// journal compacted to one line per job.
    pub fn open(dir: &Path) -> Result<Self, JobStoreError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(JOURNAL_FILE);
        let mut jobs = replay(&path)?;

        let mut interrupted = 0usize;
        for job in jobs.values_mut() {
            if !job.is_terminal() && job.fail(INTERRUPTED).is_ok() {
                interrupted += 1;
            }
        }

        compact(&path, &jobs)?;
        info!(
            path = %path.display(),
            jobs = jobs.len(),
            interrupted,
            "Job journal replayed"
        );

        Ok(Self {
            jobs: RwLock::new(jobs),
            journal: Some(path),
        })
    }

    fn append(&self, job: &ReportJob) {
        let Some(path) = &self.journal else {
            return;
        };
        let line = match serde_json::to_string(job) {
            Ok(line) => line,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Failed to serialize job for journal");
                return;
            }
        };
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .and_then(|mut file| writeln!(file, "{line}"));
        if let Err(e) = result {
            warn!(job_id = %job.id, error = %e, "Failed to append job journal");
        }
    }

    /// Apply `f` to one record under the write lock and journal the result.
    /// The journal write happens before the lock is released.
    fn mutate<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut ReportJob) -> Result<T, TransitionError>,
    ) -> Result<(T, ReportJob), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| JobStoreError::Poisoned)?;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        let out = f(job).map_err(|source| JobStoreError::Transition { id, source })?;
        let snapshot = job.clone();
        self.append(&snapshot);
        Ok((out, snapshot))
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: ReportJob) -> Result<(), JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| JobStoreError::Poisoned)?;
        if jobs.contains_key(&job.id) {
            return Err(JobStoreError::Duplicate(job.id));
        }
        self.append(&job);
        jobs.insert(job.id, job);
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<ReportJob>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| JobStoreError::Poisoned)?;
        Ok(jobs.get(&id).cloned())
    }

    fn list(&self, owner: Option<&str>) -> Result<Vec<ReportJob>, JobStoreError> {
        let jobs = self.jobs.read().map_err(|_| JobStoreError::Poisoned)?;
        let mut out: Vec<ReportJob> = jobs
            .values()
            .filter(|job| owner.map_or(true, |o| job.owner_id == o))
            .cloned()
            .collect();
        // Stable sort keeps reverse insertion order for identical timestamps.
        out.reverse();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    fn try_begin(&self, id: Uuid) -> Result<ReportJob, JobStoreError> {
        let ((), job) = self.mutate(id, ReportJob::begin)?;
        Ok(job)
    }

    fn advance_progress(&self, id: Uuid, progress: u8) -> Result<bool, JobStoreError> {
        let mut jobs = self.jobs.write().map_err(|_| JobStoreError::Poisoned)?;
        let job = jobs.get_mut(&id).ok_or(JobStoreError::NotFound(id))?;
        let raised = job
            .advance(progress)
            .map_err(|source| JobStoreError::Transition { id, source })?;
        if raised {
            let snapshot = job.clone();
            self.append(&snapshot);
        }
        Ok(raised)
    }

    fn complete(&self, id: Uuid, file_path: &str) -> Result<ReportJob, JobStoreError> {
        let ((), job) = self.mutate(id, |job| job.complete(file_path))?;
        Ok(job)
    }

    fn fail(&self, id: Uuid, error: &str) -> Result<ReportJob, JobStoreError> {
        let ((), job) = self.mutate(id, |job| job.fail(error))?;
        Ok(job)
    }
}

fn replay(path: &Path) -> Result<IndexMap<Uuid, ReportJob>, JobStoreError> {
    let mut jobs = IndexMap::new();
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(jobs),
        Err(e) => return Err(e.into()),
    };

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<ReportJob>(&line) {
            Ok(job) => {
                jobs.insert(job.id, job);
            }
            Err(e) => debug!(line = index + 1, error = %e, "Skipping unreadable journal line"),
        }
    }
    Ok(jobs)
}

fn compact(path: &Path, jobs: &IndexMap<Uuid, ReportJob>) -> Result<(), JobStoreError> {
    let tmp = path.with_extension("jsonl.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        for job in jobs.values() {
            let line = serde_json::to_string(job)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writeln!(file, "{line}")?;
        }
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use taskpulse_core::JobStatus;

    fn job(owner: &str) -> ReportJob {
        ReportJob::new(owner, "jira", "standard", json!({ "projectId": "APOLLO" }))
    }

    #[test]
    fn try_begin_is_single_flight() {
        let store = MemoryJobStore::new();
        let job = job("o");
        let id = job.id;
        store.insert(job).unwrap();

        let started = store.try_begin(id).unwrap();
        assert_eq!(started.status, JobStatus::Processing);

        let err = store.try_begin(id).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn progress_only_increases_while_processing() {
        let store = MemoryJobStore::new();
        let job = job("o");
        let id = job.id;
        store.insert(job).unwrap();

        assert!(store.advance_progress(id, 10).is_err());
        store.try_begin(id).unwrap();
        assert!(store.advance_progress(id, 30).unwrap());
        assert!(!store.advance_progress(id, 20).unwrap());
        assert_eq!(store.get(id).unwrap().unwrap().progress, 30);
    }

    #[test]
    fn terminal_jobs_reject_writes() {
        let store = MemoryJobStore::new();
        let job = job("o");
        let id = job.id;
        store.insert(job).unwrap();
        store.try_begin(id).unwrap();
        store.advance_progress(id, 45).unwrap();
        store.fail(id, "boom").unwrap();

        assert!(store.advance_progress(id, 90).unwrap_err().is_conflict());
        assert!(store.complete(id, "/tmp/x.md").is_err());
        assert!(store.fail(id, "again").is_err());

        let stored = store.get(id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.progress, 45);
        assert_eq!(stored.error.as_deref(), Some("boom"));
    }

    #[test]
    fn unknown_and_duplicate_ids() {
        let store = MemoryJobStore::new();
        assert!(matches!(store.fail(Uuid::new_v4(), "x"), Err(JobStoreError::NotFound(_))));

        let job = job("o");
        store.insert(job.clone()).unwrap();
        assert!(matches!(store.insert(job), Err(JobStoreError::Duplicate(_))));
    }

    #[test]
    fn list_filters_owner_newest_first() {
        let store = MemoryJobStore::new();
        let mut first = job("ada");
        first.created_at = first.created_at - chrono::Duration::seconds(10);
        let second = job("grace");
        let third = job("ada");
        let (first_id, third_id) = (first.id, third.id);
        store.insert(first).unwrap();
        store.insert(second).unwrap();
        store.insert(third).unwrap();

        let ada: Vec<Uuid> = store.list(Some("ada")).unwrap().iter().map(|j| j.id).collect();
        assert_eq!(ada, vec![third_id, first_id]);
        assert_eq!(store.list(None).unwrap().len(), 3);
    }

    #[test]
    fn journal_replay_fails_interrupted_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let (done_id, live_id, queued_id) = {
            let store = MemoryJobStore::open(dir.path()).unwrap();
            let done = job("o");
            let live = job("o");
            let queued = job("o");
            let ids = (done.id, live.id, queued.id);
            store.insert(done).unwrap();
            store.insert(live).unwrap();
            store.insert(queued).unwrap();

            store.try_begin(ids.0).unwrap();
            store.complete(ids.0, "/data/artifacts/a.md").unwrap();
            store.try_begin(ids.1).unwrap();
            store.advance_progress(ids.1, 30).unwrap();
            ids
        };

        let store = MemoryJobStore::open(dir.path()).unwrap();
        let done = store.get(done_id).unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.file_path.as_deref(), Some("/data/artifacts/a.md"));

        let live = store.get(live_id).unwrap().unwrap();
        assert_eq!(live.status, JobStatus::Failed);
        assert_eq!(live.progress, 30);
        assert_eq!(live.error.as_deref(), Some(INTERRUPTED));

        let queued = store.get(queued_id).unwrap().unwrap();
        assert_eq!(queued.status, JobStatus::Failed);

        let lines = fs::read_to_string(dir.path().join(JOURNAL_FILE)).unwrap();
        assert_eq!(lines.lines().count(), 3);
    }

    #[test]
    fn journal_lines_follow_update_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryJobStore::open(dir.path()).unwrap();
        let job = job("o");
        let id = job.id;
        store.insert(job).unwrap();
        store.try_begin(id).unwrap();
        store.advance_progress(id, 30).unwrap();
        store.complete(id, "/data/artifacts/a.md").unwrap();

        let journal = fs::read_to_string(dir.path().join(JOURNAL_FILE)).unwrap();
        let states: Vec<(JobStatus, u8)> = journal
            .lines()
            .map(|line| serde_json::from_str::<ReportJob>(line).unwrap())
            .map(|job| (job.status, job.progress))
            .collect();
        assert_eq!(
            states,
            vec![
                (JobStatus::Queued, 0),
                (JobStatus::Processing, 0),
                (JobStatus::Processing, 30),
                (JobStatus::Completed, 100),
            ]
        );
    }

    #[test]
    fn journal_skips_garbage_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(JOURNAL_FILE), "not json\n\n").unwrap();
        let store = MemoryJobStore::open(dir.path()).unwrap();
        assert!(store.list(None).unwrap().is_empty());
    }
}
