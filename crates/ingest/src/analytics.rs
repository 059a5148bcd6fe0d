//! Derived metrics and data-quality heuristics over canonical records.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use taskpulse_core::{
    CanonicalSprint, CanonicalTask, DataQuality, Priority, ProjectMetric, SprintStatus,
};

/// Weights (percent) of the completeness heuristic.
pub const TITLE_WEIGHT: f64 = 40.0;
pub const STATUS_WEIGHT: f64 = 30.0;
pub const ASSIGNEE_WEIGHT: f64 = 30.0;

/// Fully fresh within this window.
const FRESH_WINDOW_HOURS: i64 = 24;
/// Freshness reaches zero at this age.
const STALE_AFTER_DAYS: i64 = 30;

/// `round(done / total * 100)`; 0 for no tasks.
pub fn completion_rate(tasks: &[CanonicalTask]) -> u8 {
    if tasks.is_empty() {
        return 0;
    }
    let done = tasks.iter().filter(|t| t.status.is_done()).count();
    percent(done, tasks.len())
}

fn percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 / whole as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StoryPoints {
    pub total: f64,
    pub completed: f64,
}

/// Total estimated points and points on `Done` tasks.
pub fn story_points_summary(tasks: &[CanonicalTask]) -> StoryPoints {
    tasks.iter().fold(StoryPoints::default(), |mut acc, t| {
        let points = t.story_points.unwrap_or(0.0);
        acc.total += points;
        if t.status.is_done() {
            acc.completed += points;
        }
        acc
    })
}

/// Mean completed points over completed sprints; 0 when there are none.
pub fn velocity(sprints: &[CanonicalSprint]) -> f64 {
    let completed: Vec<f64> = sprints
        .iter()
        .filter(|s| s.status == SprintStatus::Completed)
        .map(|s| s.completed_points)
        .collect();
    if completed.is_empty() {
        return 0.0;
    }
    completed.iter().sum::<f64>() / completed.len() as f64
}

/// Task count per status label, sorted by label.
pub fn status_breakdown(tasks: &[CanonicalTask]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for task in tasks {
        *counts.entry(task.status.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

/// Task count per priority.
pub fn priority_breakdown(tasks: &[CanonicalTask]) -> BTreeMap<Priority, usize> {
    let mut counts = BTreeMap::new();
    for task in tasks {
        *counts.entry(task.priority).or_insert(0) += 1;
    }
    counts
}

fn metric(key: &str, label: &str, value: f64, unit: &str) -> ProjectMetric {
    ProjectMetric {
        key: key.to_string(),
        label: label.to_string(),
        value,
        unit: unit.to_string(),
    }
}

/// Standard metric set attached to every normalized project.
pub fn project_metrics(tasks: &[CanonicalTask], sprints: &[CanonicalSprint]) -> Vec<ProjectMetric> {
    let points = story_points_summary(tasks);
    let done = tasks.iter().filter(|t| t.status.is_done()).count();
    let high = priority_breakdown(tasks).get(&Priority::High).copied().unwrap_or(0);
    let active = sprints.iter().filter(|s| s.status == SprintStatus::Active).count();

    vec![
        metric("completionRate", "Completion rate", completion_rate(tasks) as f64, "%"),
        metric("totalTasks", "Total tasks", tasks.len() as f64, "tasks"),
        metric("completedTasks", "Completed tasks", done as f64, "tasks"),
        metric("highPriorityTasks", "High priority tasks", high as f64, "tasks"),
        metric("totalStoryPoints", "Total story points", points.total, "points"),
        metric("completedStoryPoints", "Completed story points", points.completed, "points"),
        metric("velocity", "Velocity", (velocity(sprints) * 10.0).round() / 10.0, "points/sprint"),
        metric("activeSprints", "Active sprints", active as f64, "sprints"),
    ]
}

/// Presence counts of the fields the completeness score looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldCoverage {
    pub total: usize,
    pub with_title: usize,
    pub with_status: usize,
    pub with_assignee: usize,
}

impl FieldCoverage {
    /// Coverage judged from canonical tasks alone.
    pub fn from_tasks(tasks: &[CanonicalTask]) -> Self {
        tasks.iter().fold(
            Self {
                total: tasks.len(),
                ..Self::default()
            },
            |mut acc, t| {
                acc.with_title += usize::from(!t.title.trim().is_empty());
                acc.with_status += usize::from(t.status.is_mapped());
                acc.with_assignee += usize::from(t.assignee != crate::UNASSIGNED);
                acc
            },
        )
    }
}

/// Weighted presence ratio of title, status and assignee, capped at 100.
pub fn completeness(coverage: &FieldCoverage) -> u8 {
    if coverage.total == 0 {
        return 0;
    }
    let ratio = |n: usize| n as f64 / coverage.total as f64;
    let score = ratio(coverage.with_title) * TITLE_WEIGHT
        + ratio(coverage.with_status) * STATUS_WEIGHT
        + ratio(coverage.with_assignee) * ASSIGNEE_WEIGHT;
    score.round().clamp(0.0, 100.0) as u8
}

/// Share of tasks whose status landed in a known bucket; 100 for no tasks.
pub fn accuracy(tasks: &[CanonicalTask]) -> u8 {
    if tasks.is_empty() {
        return 100;
    }
    percent(tasks.iter().filter(|t| t.status.is_mapped()).count(), tasks.len())
}

/// 100 within a day of `now`, falling linearly to 0 at thirty days.
pub fn freshness(last_updated: DateTime<Utc>, now: DateTime<Utc>) -> u8 {
    let age = now - last_updated;
    let fresh = Duration::hours(FRESH_WINDOW_HOURS);
    let stale = Duration::days(STALE_AFTER_DAYS);
    if age <= fresh {
        return 100;
    }
    if age >= stale {
        return 0;
    }
    let span = (stale - fresh).num_seconds() as f64;
    let remaining = (stale - age).num_seconds() as f64;
    (remaining / span * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Completeness, accuracy and freshness scores for a normalized project.
pub fn data_quality(
    tasks: &[CanonicalTask],
    coverage: &FieldCoverage,
    last_updated: DateTime<Utc>,
    now: DateTime<Utc>,
) -> DataQuality {
    DataQuality {
        completeness: completeness(coverage),
        accuracy: accuracy(tasks),
        freshness: freshness(last_updated, now),
    }
}
