//! Fixed tables mapping raw status, priority and sprint-state strings onto
//! canonical buckets.

use taskpulse_core::{Priority, SprintStatus, TaskStatus};

const DONE_EXACT: &[&str] = &["DONE", "COMPLETED", "COMPLETE", "FINISHED", "CLOSED", "RESOLVED"];
const REVIEW_EXACT: &[&str] = &["REVIEW", "IN_REVIEW", "CODE_REVIEW", "TESTING", "QA", "IN_QA"];
const PROGRESS_EXACT: &[&str] = &["IN_PROGRESS", "DOING", "ACTIVE", "WORKING_ON_IT", "STARTED", "ONGOING"];
const TODO_EXACT: &[&str] = &[
    "TODO",
    "TO_DO",
    "BACKLOG",
    "NEW",
    "OPEN",
    "NOT_STARTED",
    "SELECTED_FOR_DEVELOPMENT",
];

const DONE_PARTS: &[&str] = &["DONE", "COMPLET", "FINISH", "CLOSED", "RESOLVED"];
const REVIEW_PARTS: &[&str] = &["REVIEW", "TESTING", "QA"];
const PROGRESS_PARTS: &[&str] = &["PROGRESS", "DOING", "WORKING"];
const TODO_PARTS: &[&str] = &["TODO", "TO_DO", "BACKLOG", "OPEN"];

fn status_key(raw: &str) -> String {
    raw.trim().to_ascii_uppercase().replace([' ', '-'], "_")
}

/// Bucket a raw status. Unrecognized values come back as
/// [`TaskStatus::Unmapped`] carrying the raw text unchanged.
pub fn map_status(raw: &str) -> TaskStatus {
    let key = status_key(raw);
    let exact: [(&[&str], TaskStatus); 4] = [
        (DONE_EXACT, TaskStatus::Done),
        (REVIEW_EXACT, TaskStatus::InReview),
        (PROGRESS_EXACT, TaskStatus::InProgress),
        (TODO_EXACT, TaskStatus::ToDo),
    ];
    if let Some((_, status)) = exact.iter().find(|(table, _)| table.contains(&key.as_str())) {
        return status.clone();
    }
    let partial: [(&[&str], TaskStatus); 4] = [
        (DONE_PARTS, TaskStatus::Done),
        (REVIEW_PARTS, TaskStatus::InReview),
        (PROGRESS_PARTS, TaskStatus::InProgress),
        (TODO_PARTS, TaskStatus::ToDo),
    ];
    partial
        .into_iter()
        .find(|(parts, _)| parts.iter().any(|p| key.contains(p)))
        .map(|(_, status)| status)
        .unwrap_or_else(|| TaskStatus::Unmapped(raw.trim().to_string()))
}

/// Case-insensitive substring match; anything else is `MEDIUM`.
pub fn map_priority(raw: Option<&str>) -> Priority {
    let Some(raw) = raw else {
        return Priority::Medium;
    };
    let lower = raw.to_lowercase();
    if ["high", "urgent", "critical"].iter().any(|p| lower.contains(p)) {
        Priority::High
    } else if ["low", "minor"].iter().any(|p| lower.contains(p)) {
        Priority::Low
    } else {
        Priority::Medium
    }
}

/// Sprint state from `active`/`closed` style values. Unknown or absent
/// values are `Planning`.
pub fn map_sprint_status(raw: Option<&str>) -> SprintStatus {
    let Some(raw) = raw else {
        return SprintStatus::Planning;
    };
    match status_key(raw).as_str() {
        "ACTIVE" | "OPEN" | "IN_PROGRESS" | "CURRENT" | "STARTED" => SprintStatus::Active,
        "CLOSED" | "COMPLETED" | "COMPLETE" | "DONE" | "FINISHED" | "PAST" => SprintStatus::Completed,
        _ => SprintStatus::Planning,
    }
}
