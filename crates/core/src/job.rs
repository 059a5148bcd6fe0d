//! Report job record and its forward-only state machine.
//!
//! `queued -> processing -> {completed | failed}`. A queued job may also fail
//! directly (cancelled before start, interrupted by restart). Terminal states
//! are absorbing and progress never decreases while the job is live.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TransitionError;

/// Keys probed (in order) for the upstream project identifier.
const PROJECT_ID_KEYS: &[&str] = &["projectId", "project_id", "projectKey", "project_key", "boardId", "board_id"];

/// Keys probed (in order) for a human-readable report title.
const TITLE_KEYS: &[&str] = &["title", "reportTitle", "report_title", "name"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// `queued -> processing`, `processing -> completed`, and `failed` from
    /// any non-terminal state.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Persistent record of one report generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportJob {
    pub id: Uuid,
    pub owner_id: String,
    pub platform: String,
    pub template: String,
    pub status: JobStatus,
    pub progress: u8,
    pub configuration: serde_json::Value,
    pub file_path: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReportJob {
    /// New job in `queued` with progress 0.
    pub fn new(
        owner_id: impl Into<String>,
        platform: impl Into<String>,
        template: impl Into<String>,
        configuration: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            platform: platform.into(),
            template: template.into(),
            status: JobStatus::Queued,
            progress: 0,
            configuration,
            file_path: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Upstream project identifier from the job configuration.
    pub fn project_id(&self) -> Option<String> {
        probe_string(&self.configuration, PROJECT_ID_KEYS)
    }

    /// Report title from the job configuration, if any.
    pub fn title(&self) -> Option<String> {
        probe_string(&self.configuration, TITLE_KEYS)
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if self.status.is_terminal() {
            return Err(TransitionError::Terminal(self.status));
        }
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Invalid {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `queued -> processing`, progress reset to 0.
    pub fn begin(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)?;
        self.progress = 0;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Raise progress while processing. Returns `Ok(false)` when the value
    /// would not increase progress (the write is a no-op).
    pub fn advance(&mut self, progress: u8) -> Result<bool, TransitionError> {
        match self.status {
            JobStatus::Processing => {}
            status if status.is_terminal() => return Err(TransitionError::Terminal(status)),
            status => {
                return Err(TransitionError::Invalid {
                    from: status,
                    to: JobStatus::Processing,
                })
            }
        }
        let progress = progress.min(100);
        if progress <= self.progress {
            return Ok(false);
        }
        self.progress = progress;
        Ok(true)
    }

    /// Mark a processing job completed with progress 100.
    ///
    /// # Errors
    ///
    /// Rejected unless the job is `processing`.
    pub fn complete(&mut self, file_path: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.progress = 100;
        self.file_path = Some(file_path.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Fail the job, keeping the progress of the last checkpoint.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}

fn probe_string(value: &serde_json::Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match value.get(*k) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job() -> ReportJob {
        ReportJob::new("owner-1", "jira", "standard", json!({ "projectId": "APOLLO" }))
    }

    #[test]
    fn new_job_is_queued_at_zero() {
        let job = job();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert!(job.completed_at.is_none());
    }

    #[test]
    fn happy_path_transitions() {
        let mut job = job();
        job.begin().unwrap();
        assert!(job.advance(10).unwrap());
        assert!(job.advance(30).unwrap());
        job.complete("/tmp/report.md").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.completed_at.is_some());
        assert_eq!(job.file_path.as_deref(), Some("/tmp/report.md"));
    }

    #[test]
    fn progress_never_decreases() {
        let mut job = job();
        job.begin().unwrap();
        job.advance(40).unwrap();
        assert!(!job.advance(20).unwrap());
        assert!(!job.advance(40).unwrap());
        assert_eq!(job.progress, 40);
    }

    #[test]
    fn terminal_states_are_absorbing() {
        let mut job = job();
        job.begin().unwrap();
        job.advance(45).unwrap();
        job.fail("renderer exploded").unwrap();
        assert_eq!(job.progress, 45);

        assert_eq!(job.advance(90), Err(TransitionError::Terminal(JobStatus::Failed)));
        assert!(job.complete("x").is_err());
        assert!(job.fail("again").is_err());
        assert_eq!(job.error.as_deref(), Some("renderer exploded"));
    }

    #[test]
    fn cannot_skip_processing_to_complete() {
        let mut job = job();
        let err = job.complete("x").unwrap_err();
        assert_eq!(
            err,
            TransitionError::Invalid {
                from: JobStatus::Queued,
                to: JobStatus::Completed
            }
        );
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut job = job();
        job.begin().unwrap();
        assert!(job.begin().is_err());
    }

    #[test]
    fn queued_job_can_fail_directly() {
        let mut job = job();
        job.fail("cancelled").unwrap();
        assert_eq!(job.status, JobStatus::Failed);
    }

    #[test]
    fn configuration_probes() {
        let job = ReportJob::new("o", "monday", "standard", json!({ "board_id": 12345, "title": " Q3 " }));
        assert_eq!(job.project_id().as_deref(), Some("12345"));
        assert_eq!(job.title().as_deref(), Some("Q3"));
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_value(job()).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["ownerId"], "owner-1");
        assert!(json["filePath"].is_null());
    }
}
