//! Canonical, platform-agnostic project model.
//!
//! Every list field is always present (possibly empty) regardless of what the
//! upstream payload looked like. A project is built fresh per fetch and never
//! patched afterwards.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ── Enums ─────────────────────────────────────────────────────

/// Normalized task priority, ordered most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

/// Status bucket of a task.
///
/// Raw values that match no bucket are carried through unchanged as
/// [`TaskStatus::Unmapped`] so they are never dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Done,
    InProgress,
    InReview,
    #[default]
    ToDo,
    Unmapped(String),
}

impl TaskStatus {
    /// Bucket label, or the raw value for unmapped statuses.
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Done => "Done",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::InReview => "In Review",
            TaskStatus::ToDo => "To Do",
            TaskStatus::Unmapped(raw) => raw,
        }
    }

    /// Parse the canonical bucket labels; anything else is kept as unmapped.
    pub fn from_label(label: &str) -> Self {
        match label {
            "Done" => TaskStatus::Done,
            "In Progress" => TaskStatus::InProgress,
            "In Review" => TaskStatus::InReview,
            "To Do" => TaskStatus::ToDo,
            other => TaskStatus::Unmapped(other.to_string()),
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self, TaskStatus::Unmapped(_))
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(TaskStatus::from_label(&label))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SprintStatus {
    #[default]
    Planning,
    Active,
    Completed,
}

// ── Records ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub assignee: String,
    pub priority: Priority,
    pub story_points: Option<f64>,
    pub sprint_ref: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalTeamMember {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
    pub task_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalSprint {
    pub id: String,
    pub name: String,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub status: SprintStatus,
    pub planned_points: f64,
    pub completed_points: f64,
}

/// A single derived figure shown in reports (e.g. completion rate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetric {
    pub key: String,
    pub label: String,
    pub value: f64,
    pub unit: String,
}

/// Heuristic quality scores, each in 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DataQuality {
    pub completeness: u8,
    pub accuracy: u8,
    pub freshness: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalProject {
    pub id: String,
    pub name: String,
    pub description: String,
    pub status: String,
    #[serde(default)]
    pub tasks: Vec<CanonicalTask>,
    #[serde(default)]
    pub team: Vec<CanonicalTeamMember>,
    #[serde(default)]
    pub metrics: Vec<ProjectMetric>,
    #[serde(default)]
    pub sprints: Vec<CanonicalSprint>,
    #[serde(default)]
    pub platform_specific: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub data_quality: DataQuality,
    pub last_updated: DateTime<Utc>,
}

impl CanonicalProject {
    /// Value of the metric named `key`.
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.iter().find(|m| m.key == key).map(|m| m.value)
    }
}
