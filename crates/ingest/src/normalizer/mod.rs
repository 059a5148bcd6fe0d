//! Reconcile raw upstream payloads into a [`CanonicalProject`].
//!
//! Normalization never fails: missing or malformed scalars fall back to
//! documented defaults and every list field of the result is present.

mod assignee;
mod fields;
pub mod mapping;
#[cfg(test)]
mod tests;

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use taskpulse_core::{
    CanonicalProject, CanonicalSprint, CanonicalTask, CanonicalTeamMember, TaskStatus,
};

use crate::analytics::{self, FieldCoverage};
use crate::{DEFAULT_ROLE, UNASSIGNED};

use assignee::{resolve_assignee, Roster};
use fields::{id_string, named_string, plain_text, RawRecord};
use mapping::{map_priority, map_sprint_status, map_status};

const ID_KEYS: &[&str] = &["id", "key", "issueKey", "taskId", "task_id", "_id", "uuid"];
const PROJECT_ID_KEYS: &[&str] = &["id", "key", "projectId", "project_id", "boardId", "board_id"];
const PROJECT_NAME_KEYS: &[&str] = &["name", "title", "projectName", "project_name", "pname"];
const TITLE_KEYS: &[&str] = &["title", "summary", "name", "subject", "backlog_summary"];
const DESCRIPTION_KEYS: &[&str] = &["description", "body", "details", "notes", "backlog_description"];
const STATUS_KEYS: &[&str] = &["status", "statusName", "status_name", "backlog_status"];
const STATE_KEYS: &[&str] = &["state"];
const PROJECT_STATUS_KEYS: &[&str] = &["status", "state", "projectStatus", "project_status"];
const PRIORITY_KEYS: &[&str] = &["priority", "priorityName", "priority_name", "backlog_priority"];
const POINTS_KEYS: &[&str] = &[
    "storyPoints",
    "story_points",
    "points",
    "estimate",
    "storyPointEstimate",
    "customfield_10016",
];
const SPRINT_REF_KEYS: &[&str] = &["sprintId", "sprint_id", "sprint", "sprintRef", "customfield_10020", "group"];
const LABEL_KEYS: &[&str] = &["labels", "tags"];
const UPDATED_KEYS: &[&str] = &[
    "updatedAt",
    "updated_at",
    "updated",
    "lastUpdated",
    "last_updated",
    "modified",
];

const SPRINT_NAME_KEYS: &[&str] = &["name", "title", "sprint_name"];
const SPRINT_STATUS_KEYS: &[&str] = &["state", "status"];
const SPRINT_START_KEYS: &[&str] = &["startDate", "start_date", "startAt", "start"];
const SPRINT_END_KEYS: &[&str] = &["endDate", "end_date", "endAt", "end", "completeDate"];
const PLANNED_POINTS_KEYS: &[&str] = &["plannedPoints", "planned_points", "committedPoints", "committed_points"];
const COMPLETED_POINTS_KEYS: &[&str] = &["completedPoints", "completed_points"];

/// Project keys already folded into canonical fields.
const CONSUMED_PROJECT_KEYS: &[&str] = &[
    "id", "key", "projectId", "project_id", "boardId", "board_id", "name", "title", "projectName",
    "project_name", "pname", "description", "status", "state", "projectStatus", "project_status",
    "updatedAt", "updated_at", "updated", "lastUpdated", "last_updated", "modified",
];

/// Status used when the upstream project carries none.
fn default_project_status(platform: &str) -> &'static str {
    match platform {
        "jira" | "monday" | "trofos" => "active",
        _ => "unknown",
    }
}

/// Converts raw platform records into the canonical model.
#[derive(Debug, Clone)]
pub struct Normalizer {
    platform: String,
    now: Option<DateTime<Utc>>,
}

impl Normalizer {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            now: None,
        }
    }

    /// Pin the clock used for defaults and freshness.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    pub fn normalize(
        &self,
        raw_project: &Value,
        raw_tasks: &[Value],
        raw_sprints: &[Value],
        raw_resources: &[Value],
    ) -> CanonicalProject {
        let now = self.now.unwrap_or_else(Utc::now);
        let project = RawRecord::new(raw_project);
        let roster = Roster::from_raw(raw_resources);

        let mut coverage = FieldCoverage::default();
        let mut unmapped = BTreeSet::new();
        let mut latest_task_update: Option<DateTime<Utc>> = None;

        let tasks: Vec<CanonicalTask> = raw_tasks
            .iter()
            .enumerate()
            .filter_map(|(index, raw)| {
                let rec = RawRecord::new(raw);
                if !rec.is_object() {
                    debug!(index, "Skipping non-object task record");
                    return None;
                }
                if let Some(updated) = rec.probe_time(UPDATED_KEYS) {
                    latest_task_update = latest_task_update.max(Some(updated));
                }
                Some(self.task(index, &rec, &roster, &mut coverage, &mut unmapped))
            })
            .collect();

        let sprints: Vec<CanonicalSprint> = raw_sprints
            .iter()
            .enumerate()
            .filter(|(_, raw)| raw.is_object())
            .map(|(index, raw)| sprint(index, &RawRecord::new(raw), &tasks))
            .collect();

        let team = derive_team(&tasks, &roster);

        let last_updated = project
            .probe_time(UPDATED_KEYS)
            .or(latest_task_update)
            .unwrap_or(now);

        let mut platform_specific = Map::new();
        platform_specific.insert("platform".into(), json!(self.platform));
        platform_specific.insert(
            "sourceCounts".into(),
            json!({
                "tasks": raw_tasks.len(),
                "sprints": raw_sprints.len(),
                "resources": raw_resources.len(),
            }),
        );
        if !unmapped.is_empty() {
            platform_specific.insert("unmappedStatuses".into(), json!(unmapped));
        }
        let leftovers = project.leftover_scalars(CONSUMED_PROJECT_KEYS);
        if !leftovers.is_empty() {
            platform_specific.insert("raw".into(), Value::Object(leftovers));
        }

        let metrics = analytics::project_metrics(&tasks, &sprints);
        let data_quality = analytics::data_quality(&tasks, &coverage, last_updated, now);

        CanonicalProject {
            id: project
                .probe_id(PROJECT_ID_KEYS)
                .unwrap_or_else(|| format!("{}-{}", self.platform, Uuid::new_v4().simple())),
            name: project
                .probe_str(PROJECT_NAME_KEYS)
                .unwrap_or_else(|| "Unnamed project".to_string()),
            description: project
                .get("description")
                .map(plain_text)
                .unwrap_or_default(),
            status: project
                .probe_str(PROJECT_STATUS_KEYS)
                .unwrap_or_else(|| default_project_status(&self.platform).to_string()),
            tasks,
            team,
            metrics,
            sprints,
            platform_specific,
            data_quality,
            last_updated,
        }
    }

    fn task(
        &self,
        index: usize,
        rec: &RawRecord<'_>,
        roster: &Roster,
        coverage: &mut FieldCoverage,
        unmapped: &mut BTreeSet<String>,
    ) -> CanonicalTask {
        coverage.total += 1;

        let title = rec.probe_str(TITLE_KEYS);
        coverage.with_title += usize::from(title.is_some());

        let raw_status = rec
            .probe_str(STATUS_KEYS)
            .or_else(|| rec.column_text(&["status"]))
            .or_else(|| rec.probe_str(STATE_KEYS));
        coverage.with_status += usize::from(raw_status.is_some());
        let status = match raw_status.as_deref().map(map_status) {
            Some(TaskStatus::Unmapped(raw)) => {
                if unmapped.insert(raw.clone()) {
                    warn!(platform = %self.platform, status = %raw, "Unmapped task status, passing through");
                }
                TaskStatus::Unmapped(raw)
            }
            Some(status) => status,
            None => TaskStatus::default(),
        };

        let assignee = resolve_assignee(rec, roster);
        coverage.with_assignee += usize::from(assignee.is_some());

        let priority_raw = rec
            .probe_str(PRIORITY_KEYS)
            .or_else(|| rec.column_text(&["priority"]));

        CanonicalTask {
            id: rec
                .probe_id(ID_KEYS)
                .unwrap_or_else(|| format!("task-{}", index + 1)),
            title: title.unwrap_or_else(|| "Untitled task".to_string()),
            description: rec.probe(DESCRIPTION_KEYS).map(plain_text).unwrap_or_default(),
            status,
            assignee: assignee.unwrap_or_else(|| UNASSIGNED.to_string()),
            priority: map_priority(priority_raw.as_deref()),
            story_points: rec
                .probe_number(POINTS_KEYS)
                .or_else(|| rec.column_text(&["numbers", "estimate"]).and_then(|t| t.parse().ok())),
            sprint_ref: rec.probe(SPRINT_REF_KEYS).and_then(id_string),
            labels: labels(rec),
        }
    }
}

/// Normalize with a fresh [`Normalizer`] for `platform`.
pub fn normalize(
    platform: &str,
    raw_project: &Value,
    raw_tasks: &[Value],
    raw_sprints: &[Value],
    raw_resources: &[Value],
) -> CanonicalProject {
    Normalizer::new(platform).normalize(raw_project, raw_tasks, raw_sprints, raw_resources)
}

fn labels(rec: &RawRecord<'_>) -> Vec<String> {
    match rec.probe(LABEL_KEYS) {
        Some(Value::Array(items)) => items.iter().filter_map(named_string).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

fn sprint(index: usize, rec: &RawRecord<'_>, tasks: &[CanonicalTask]) -> CanonicalSprint {
    let id = rec
        .probe_id(&["id", "sprint_id", "sprintId"])
        .unwrap_or_else(|| format!("sprint-{}", index + 1));
    let name = rec
        .probe_str(SPRINT_NAME_KEYS)
        .unwrap_or_else(|| format!("Sprint {}", index + 1));

    let in_sprint = || {
        tasks.iter().filter(|t| {
            t.sprint_ref
                .as_deref()
                .is_some_and(|r| fields::ids_equal(r, &id) || r == name)
        })
    };
    let planned_points = rec
        .probe_number(PLANNED_POINTS_KEYS)
        .unwrap_or_else(|| in_sprint().filter_map(|t| t.story_points).sum());
    let completed_points = rec.probe_number(COMPLETED_POINTS_KEYS).unwrap_or_else(|| {
        in_sprint()
            .filter(|t| t.status.is_done())
            .filter_map(|t| t.story_points)
            .sum()
    });

    CanonicalSprint {
        status: map_sprint_status(rec.probe_str(SPRINT_STATUS_KEYS).as_deref()),
        start_date: rec.probe_time(SPRINT_START_KEYS),
        end_date: rec.probe_time(SPRINT_END_KEYS),
        id,
        name,
        planned_points,
        completed_points,
    }
}

/// Team roster derived from resolved task assignees, enriched from the raw
/// resources. Busiest members first.
fn derive_team(tasks: &[CanonicalTask], roster: &Roster) -> Vec<CanonicalTeamMember> {
    let mut members: Vec<CanonicalTeamMember> = Vec::new();
    let mut by_name: HashMap<&str, usize> = HashMap::new();

    for task in tasks.iter().filter(|t| t.assignee != UNASSIGNED) {
        if let Some(&idx) = by_name.get(task.assignee.as_str()) {
            members[idx].task_count += 1;
            continue;
        }
        let entry = roster.find_by_name(&task.assignee);
        by_name.insert(task.assignee.as_str(), members.len());
        members.push(CanonicalTeamMember {
            id: entry
                .and_then(|e| e.id.clone())
                .unwrap_or_else(|| slug(&task.assignee)),
            name: task.assignee.clone(),
            role: entry
                .and_then(|e| e.role.clone())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            email: entry.and_then(|e| e.email.clone()),
            task_count: 1,
        });
    }

    members.sort_by(|a, b| b.task_count.cmp(&a.task_count).then_with(|| a.name.cmp(&b.name)));
    members
}

fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    out.trim_end_matches('-').to_string()
}
