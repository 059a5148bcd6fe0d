use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

use taskpulse_core::{Priority, SprintStatus, TaskStatus};

use super::*;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn normalizer() -> Normalizer {
    Normalizer::new("jira").at(now())
}

#[test]
fn missing_lists_yield_empty_collections() {
    let inputs = [
        json!(null),
        json!({}),
        json!({"tasks": null, "team": null, "metrics": null, "sprints": null}),
        json!("not an object"),
        json!([1, 2, 3]),
    ];
    for raw in inputs {
        let project = normalizer().normalize(&raw, &[], &[], &[]);
        assert!(project.tasks.is_empty(), "{raw}");
        assert!(project.team.is_empty(), "{raw}");
        assert!(project.sprints.is_empty(), "{raw}");
        assert_eq!(project.metric("completionRate"), Some(0.0));

        let json = serde_json::to_value(&project).unwrap();
        for key in ["tasks", "team", "metrics", "sprints"] {
            assert!(json[key].is_array(), "{key} missing for {raw}");
        }
    }
}

#[test]
fn scalar_defaults() {
    let project = normalizer().normalize(&json!({}), &[json!({})], &[json!({})], &[]);
    assert!(project.id.starts_with("jira-"));
    assert_eq!(project.name, "Unnamed project");
    assert_eq!(project.status, "active");
    assert_eq!(project.last_updated, now());

    let task = &project.tasks[0];
    assert_eq!(task.id, "task-1");
    assert_eq!(task.title, "Untitled task");
    assert_eq!(task.status, TaskStatus::ToDo);
    assert_eq!(task.assignee, "Unassigned");
    assert_eq!(task.priority, Priority::Medium);
    assert!(task.labels.is_empty());

    assert_eq!(project.sprints[0].name, "Sprint 1");
    assert_eq!(project.sprints[0].status, SprintStatus::Planning);
}

#[test]
fn unknown_platform_status_default() {
    let project = Normalizer::new("x").at(now()).normalize(&json!({"name": "P"}), &[], &[], &[]);
    assert_eq!(project.status, "unknown");
}

#[test]
fn jira_issue_shape() {
    let raw_project = json!({
        "id": "10000", "key": "APOLLO", "name": "Apollo",
        "description": "Moon shot", "projectTypeKey": "software"
    });
    let issues = vec![
        json!({"id": "1", "key": "APOLLO-1", "fields": {
            "summary": "Build rocket",
            "status": {"name": "In Progress"},
            "priority": {"name": "Highest"},
            "assignee": {"displayName": "Ada Lovelace", "accountId": "a1"},
            "customfield_10016": 5,
            "labels": ["engine", "critical-path"],
            "updated": "2026-03-01T08:00:00.000+0000",
            "customfield_10020": [{"id": 11, "name": "Sprint 1"}]
        }}),
        json!({"id": "2", "key": "APOLLO-2", "fields": {
            "summary": "Paint rocket",
            "status": {"name": "Done"},
            "priority": {"name": "Low"},
            "assignee": null,
            "customfield_10016": "3",
            "customfield_10020": [{"id": 11, "name": "Sprint 1"}]
        }}),
    ];
    let sprints = vec![json!({"id": 11, "name": "Sprint 1", "state": "closed"})];

    let project = normalizer().normalize(&raw_project, &issues, &sprints, &[]);

    assert_eq!(project.id, "10000");
    assert_eq!(project.name, "Apollo");
    assert_eq!(project.platform_specific["raw"]["projectTypeKey"], "software");

    let first = &project.tasks[0];
    assert_eq!(first.id, "1");
    assert_eq!(first.title, "Build rocket");
    assert_eq!(first.status, TaskStatus::InProgress);
    assert_eq!(first.priority, Priority::High);
    assert_eq!(first.assignee, "Ada Lovelace");
    assert_eq!(first.story_points, Some(5.0));
    assert_eq!(first.sprint_ref.as_deref(), Some("11"));
    assert_eq!(first.labels, vec!["engine", "critical-path"]);

    let second = &project.tasks[1];
    assert_eq!(second.status, TaskStatus::Done);
    assert_eq!(second.priority, Priority::Low);
    assert_eq!(second.assignee, "Unassigned");

    let sprint = &project.sprints[0];
    assert_eq!(sprint.status, SprintStatus::Completed);
    assert_eq!(sprint.planned_points, 8.0);
    assert_eq!(sprint.completed_points, 3.0);

    assert_eq!(project.metric("completionRate"), Some(50.0));
    assert_eq!(project.metric("velocity"), Some(3.0));
    // last update taken from the newest task
    assert_eq!(project.last_updated, now() - Duration::hours(4));
    assert_eq!(project.data_quality.freshness, 100);
}

#[test]
fn monday_item_shape() {
    let board = json!({"id": "42", "name": "Marketing", "state": "active"});
    let items = vec![json!({
        "id": "9001",
        "name": "Launch campaign",
        "state": "active",
        "group": {"id": "topics", "title": "This week"},
        "column_values": [
            {"id": "status", "text": "Working on it"},
            {"id": "person", "text": "Grace Hopper"},
            {"id": "priority", "text": "Critical"}
        ]
    })];
    let project = Normalizer::new("monday").at(now()).normalize(&board, &items, &[], &[]);
    let task = &project.tasks[0];
    assert_eq!(task.status, TaskStatus::InProgress);
    assert_eq!(task.assignee, "Grace Hopper");
    assert_eq!(task.priority, Priority::High);
    assert_eq!(task.sprint_ref.as_deref(), Some("topics"));
}

#[test]
fn unmapped_status_is_kept_and_flagged() {
    let tasks = vec![
        json!({"id": 1, "title": "a", "status": "Stuck"}),
        json!({"id": 2, "title": "b", "status": "Stuck"}),
        json!({"id": 3, "title": "c", "status": "done"}),
    ];
    let project = normalizer().normalize(&json!({"name": "P"}), &tasks, &[], &[]);
    assert_eq!(project.tasks[0].status, TaskStatus::Unmapped("Stuck".into()));
    assert_eq!(project.platform_specific["unmappedStatuses"], json!(["Stuck"]));
    assert_eq!(project.data_quality.accuracy, 33);
}

#[test]
fn team_is_derived_from_assignees() {
    let roster = vec![
        json!({"id": 7, "name": "Grace Hopper", "email": "grace@example.com", "role": "Lead"}),
        json!({"id": 8, "name": "Idle Person"}),
    ];
    let tasks = vec![
        json!({"id": 1, "title": "a", "assignee_id": 7}),
        json!({"id": 2, "title": "b", "assignee": "Grace Hopper"}),
        json!({"id": 3, "title": "c", "assignee": {"name": "Ken Thompson"}}),
        json!({"id": 4, "title": "d"}),
    ];
    let project = normalizer().normalize(&json!({"name": "P"}), &tasks, &[], &roster);

    assert_eq!(project.team.len(), 2);
    let grace = &project.team[0];
    assert_eq!(grace.name, "Grace Hopper");
    assert_eq!(grace.id, "7");
    assert_eq!(grace.role, "Lead");
    assert_eq!(grace.email.as_deref(), Some("grace@example.com"));
    assert_eq!(grace.task_count, 2);

    let ken = &project.team[1];
    assert_eq!(ken.id, "ken-thompson");
    assert_eq!(ken.role, "Team Member");
    assert_eq!(ken.task_count, 1);
}

#[test]
fn data_quality_completeness() {
    let tasks = vec![
        json!({"id": 1, "title": "a", "status": "done", "assignee": "Ada"}),
        json!({"id": 2, "title": "b", "status": "todo"}),
    ];
    let project = normalizer().normalize(&json!({"name": "P"}), &tasks, &[], &[]);
    // title 40 + status 30 + assignee 30 * 1/2
    assert_eq!(project.data_quality.completeness, 85);
    assert_eq!(project.data_quality.accuracy, 100);
}

#[test]
fn priority_is_total_over_arbitrary_values() {
    let values: Vec<Value> = vec![json!(null), json!(3), json!({"name": "URGENT"}), json!(["x"]), json!("minor")];
    let tasks: Vec<Value> = values
        .into_iter()
        .map(|p| json!({"id": 1, "title": "t", "priority": p}))
        .collect();
    let project = normalizer().normalize(&json!({}), &tasks, &[], &[]);
    let priorities: Vec<Priority> = project.tasks.iter().map(|t| t.priority).collect();
    assert_eq!(
        priorities,
        vec![Priority::Medium, Priority::Medium, Priority::High, Priority::Medium, Priority::Low]
    );
}

#[test]
fn non_object_tasks_are_skipped() {
    let tasks = vec![json!("junk"), json!(null), json!({"id": "ok"})];
    let project = normalizer().normalize(&json!({}), &tasks, &[json!(5)], &[]);
    assert_eq!(project.tasks.len(), 1);
    assert!(project.sprints.is_empty());
}
