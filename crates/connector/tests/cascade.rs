use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use taskpulse_connector::testing::{Reply, ScriptedTransport};
use taskpulse_connector::{
    EndpointCatalog, EndpointFetcher, EndpointSpec, FetchError, Pagination, RecordingSleeper,
    ResourceKind,
};
use taskpulse_core::config::FetchConfig;
use taskpulse_core::{ConnectionConfig, Credential};

const BASE: &str = "http://upstream.test";

fn connection() -> ConnectionConfig {
    ConnectionConfig::new(BASE, Credential::Bearer("t".into()))
}

fn url(path: &str) -> String {
    format!("{BASE}{path}")
}

fn fetcher(transport: Arc<ScriptedTransport>, sleeper: Arc<RecordingSleeper>) -> EndpointFetcher {
    EndpointFetcher::new(transport, sleeper, &FetchConfig::default())
}

#[tokio::test]
async fn cascade_skips_transient_then_permanent_and_returns_third() {
    let payload = json!([{"id": "T-1"}, {"id": "T-2"}]);
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&url("/a"), Reply::Status(503))
            .on(&url("/b"), Reply::Status(404))
            .on(&url("/c"), Reply::Json(payload.clone())),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let candidates = vec![
        EndpointSpec::get("/a"),
        EndpointSpec::get("/b"),
        EndpointSpec::get("/c"),
    ];

    let items = fetcher(transport.clone(), sleeper.clone())
        .fetch(ResourceKind::Tasks, "P", &candidates, &connection(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(serde_json::Value::Array(items), payload);
    assert_eq!(transport.calls(&url("/a")), 3);
    assert_eq!(transport.calls(&url("/b")), 1);
    assert_eq!(transport.calls(&url("/c")), 1);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn empty_valid_response_falls_through_to_next_candidate() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&url("/a"), Reply::Json(json!({"data": {"data": []}})))
            .on(&url("/b"), Reply::Json(json!({"data": {"items": [{"id": 1}]}}))),
    );
    let candidates = vec![EndpointSpec::get("/a"), EndpointSpec::get("/b")];

    let items = fetcher(transport, Arc::new(RecordingSleeper::new()))
        .fetch(ResourceKind::Team, "P", &candidates, &connection(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(items, vec![json!({"id": 1})]);
}

#[tokio::test]
async fn all_empty_is_an_empty_result_not_an_error() {
    let transport = Arc::new(ScriptedTransport::new().on(&url("/a"), Reply::Json(json!([]))));
    let items = fetcher(transport, Arc::new(RecordingSleeper::new()))
        .fetch(
            ResourceKind::Sprints,
            "P",
            &[EndpointSpec::get("/a")],
            &connection(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn critical_exhaustion_propagates() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&url("/p1"), Reply::Unreachable)
            .on(&url("/p2"), Reply::Status(403)),
    );
    let catalog = EndpointCatalog::new()
        .with(ResourceKind::Project, EndpointSpec::get("/p1").record())
        .with(ResourceKind::Project, EndpointSpec::get("/p2").record());

    let err = fetcher(transport.clone(), Arc::new(RecordingSleeper::new()))
        .fetch_resource(ResourceKind::Project, "P", &catalog, &connection(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        FetchError::Exhausted { resource, candidates, .. } => {
            assert_eq!(resource, "project");
            assert_eq!(candidates, 2);
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    assert_eq!(transport.calls(&url("/p1")), 3);
}

#[tokio::test]
async fn auxiliary_exhaustion_degrades_to_empty() {
    let transport = Arc::new(ScriptedTransport::new().on(&url("/team"), Reply::Status(500)));
    let catalog = EndpointCatalog::new().with(ResourceKind::Team, EndpointSpec::get("/team"));

    let items = fetcher(transport, Arc::new(RecordingSleeper::new()))
        .fetch_resource(ResourceKind::Team, "P", &catalog, &connection(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(items.is_empty());
}

#[tokio::test]
async fn retry_budget_comes_from_connection() {
    let transport = Arc::new(ScriptedTransport::new().on(&url("/a"), Reply::Status(502)));
    let conn = connection().with_retry_budget(5);
    let _ = fetcher(transport.clone(), Arc::new(RecordingSleeper::new()))
        .fetch(ResourceKind::Tasks, "P", &[EndpointSpec::get("/a")], &conn, &CancellationToken::new())
        .await;
    assert_eq!(transport.calls(&url("/a")), 5);
}

#[tokio::test]
async fn pagination_follows_full_pages() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&url("/issues"), Reply::Json(json!({"issues": [{"id": 1}, {"id": 2}]})))
            .on(&url("/issues"), Reply::Json(json!({"issues": [{"id": 3}, {"id": 4}]})))
            .on(&url("/issues"), Reply::Json(json!({"issues": [{"id": 5}]}))),
    );
    let mut pagination = Pagination::offset("startAt", "maxResults");
    pagination.page_size = Some(2);
    let spec = EndpointSpec::get("/issues").collection(&["issues"]).paginate(pagination);

    let items = fetcher(transport.clone(), Arc::new(RecordingSleeper::new()))
        .fetch(ResourceKind::Tasks, "P", &[spec], &connection(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(items.len(), 5);
    let offsets: Vec<String> = transport
        .requests()
        .iter()
        .filter_map(|r| r.query.iter().find(|(k, _)| k == "startAt").map(|(_, v)| v.clone()))
        .collect();
    assert_eq!(offsets, vec!["0", "2", "4"]);
}

#[tokio::test]
async fn later_page_failure_keeps_collected_items() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&url("/issues"), Reply::Json(json!([{"id": 1}, {"id": 2}])))
            .on(&url("/issues"), Reply::Status(400)),
    );
    let mut pagination = Pagination::offset("startAt", "maxResults");
    pagination.page_size = Some(2);
    let spec = EndpointSpec::get("/issues").paginate(pagination);

    let items = fetcher(transport, Arc::new(RecordingSleeper::new()))
        .fetch(ResourceKind::Tasks, "P", &[spec], &connection(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
}

#[tokio::test]
async fn page_cap_limits_requests() {
    let transport = Arc::new(
        ScriptedTransport::new().on(&url("/issues"), Reply::Json(json!([{"id": 1}, {"id": 2}]))),
    );
    let mut pagination = Pagination::offset("startAt", "maxResults");
    pagination.page_size = Some(2);
    pagination.max_pages = Some(3);
    let spec = EndpointSpec::get("/issues").paginate(pagination);

    let items = fetcher(transport.clone(), Arc::new(RecordingSleeper::new()))
        .fetch(ResourceKind::Tasks, "P", &[spec], &connection(), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(items.len(), 6);
    assert_eq!(transport.calls(&url("/issues")), 3);
}

#[tokio::test]
async fn cancellation_aborts_cascade() {
    let transport = Arc::new(ScriptedTransport::new().on(&url("/a"), Reply::Json(json!([{"id": 1}]))));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = fetcher(transport.clone(), Arc::new(RecordingSleeper::new()))
        .fetch(ResourceKind::Tasks, "P", &[EndpointSpec::get("/a")], &connection(), &cancel)
        .await
        .unwrap_err();
    assert_eq!(err, FetchError::Cancelled);
    assert_eq!(transport.calls(&url("/a")), 0);
}

#[tokio::test]
async fn bundle_flattens_backlog_and_dedups_tasks() {
    let transport = Arc::new(
        ScriptedTransport::new()
            .on(&url("/project/P"), Reply::Json(json!({"data": {"id": "P", "name": "Apollo"}})))
            .on(&url("/project/P/tasks"), Reply::Json(json!({"tasks": [{"id": "a"}, {"id": "b"}]})))
            .on(
                &url("/project/P/sprints"),
                Reply::Json(json!({"data": {"sprints": [
                    {"id": 1, "backlog_items": [{"id": "b"}, {"id": "c"}]}
                ]}})),
            ),
    );
    let catalog = EndpointCatalog::new()
        .with(ResourceKind::Project, EndpointSpec::get("/project/{project_id}").record())
        .with(ResourceKind::Tasks, EndpointSpec::get("/project/{project_id}/tasks").collection(&["tasks"]))
        .with(ResourceKind::Sprints, EndpointSpec::get("/project/{project_id}/sprints").collection(&["sprints"]))
        .with(ResourceKind::Team, EndpointSpec::get("/project/{project_id}/users"))
        .with(
            ResourceKind::Backlog,
            EndpointSpec::get("/project/{project_id}/sprints")
                .flatten(&["sprints"], &["backlog_items", "backlogs", "items"]),
        );

    let bundle = fetcher(transport, Arc::new(RecordingSleeper::new()))
        .fetch_bundle(&catalog, "P", &connection(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(bundle.project["name"], "Apollo");
    assert_eq!(bundle.sprints.len(), 1);
    assert!(bundle.team.is_empty());
    assert_eq!(bundle.backlog.len(), 2);
    let ids: Vec<String> = bundle
        .task_records()
        .iter()
        .map(|t| t["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}
