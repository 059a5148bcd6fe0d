//! Endpoint cascade with retry, pagination and criticality-aware degradation.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use taskpulse_core::config::FetchConfig;
use taskpulse_core::ConnectionConfig;

use crate::catalog::{Criticality, Decode, EndpointCatalog, EndpointSpec, ResourceKind};
use crate::envelope::{decode_collection, decode_record, flatten_children};
use crate::error::FetchError;
use crate::retry::{RetryPolicy, Sleeper, TokioSleeper};
use crate::transport::{HttpTransport, Transport};

pub type RawCollection = Vec<Value>;

/// Everything fetched for one project, prior to normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBundle {
    pub project: Value,
    pub tasks: RawCollection,
    pub sprints: RawCollection,
    pub team: RawCollection,
    pub backlog: RawCollection,
}

impl RawBundle {
    /// Tasks followed by backlog items not already present (matched by `id`).
    pub fn task_records(&self) -> RawCollection {
        let mut seen: HashSet<String> = HashSet::new();
        let mut out = Vec::with_capacity(self.tasks.len() + self.backlog.len());
        for record in self.tasks.iter().chain(self.backlog.iter()) {
            if let Some(id) = record_id(record) {
                if !seen.insert(id) {
                    continue;
                }
            }
            out.push(record.clone());
        }
        out
    }
}

fn record_id(record: &Value) -> Option<String> {
    match record.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Tries candidate endpoints in order, each wrapped in the retry policy.
pub struct EndpointFetcher {
    transport: Arc<dyn Transport>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
    page_size: u32,
    max_pages: u32,
}

impl EndpointFetcher {
    /// Fetcher over an explicit transport and sleeper. Retry, page size and
    /// page cap defaults come from `config`.
    pub fn new(transport: Arc<dyn Transport>, sleeper: Arc<dyn Sleeper>, config: &FetchConfig) -> Self {
        Self {
            transport,
            sleeper,
            policy: RetryPolicy::from_config(config),
            page_size: config.page_size.max(1),
            max_pages: config.max_pages.max(1),
        }
    }

    /// Fetcher over a real HTTP client and the tokio timer.
    pub fn http(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self::new(
            Arc::new(HttpTransport::new(client)),
            Arc::new(TokioSleeper),
            config,
        )
    }

    /// Replace the retry policy. The per-connection retry budget still caps
    /// the number of attempts.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the cascade for one resource kind.
    ///
    /// The first candidate yielding a non-empty result wins. An empty but
    /// well-formed response moves on to the next candidate; if no candidate
    /// produces items but at least one answered validly, the result is empty.
    /// Otherwise the last error is returned as [`FetchError::Exhausted`].
    pub async fn fetch(
        &self,
        kind: ResourceKind,
        project_id: &str,
        candidates: &[EndpointSpec],
        connection: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> Result<RawCollection, FetchError> {
        let policy = self.policy.with_max_attempts(connection.retry_budget);
        let mut answered_empty = false;
        let mut last_error: Option<FetchError> = None;

        for (index, spec) in candidates.iter().enumerate() {
            match self.fetch_endpoint(&policy, spec, project_id, connection, cancel).await {
                Ok(items) if !items.is_empty() => {
                    debug!(
                        resource = %kind,
                        endpoint = %spec.describe(),
                        candidate = index,
                        count = items.len(),
                        "Endpoint yielded records"
                    );
                    return Ok(items);
                }
                Ok(_) => {
                    debug!(resource = %kind, endpoint = %spec.describe(), "Endpoint returned no records, trying next");
                    answered_empty = true;
                }
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    warn!(
                        resource = %kind,
                        endpoint = %spec.describe(),
                        candidate = index,
                        error = %e,
                        "Endpoint failed, trying next candidate"
                    );
                    last_error = Some(e);
                }
            }
        }

        if answered_empty {
            return Ok(Vec::new());
        }

        Err(FetchError::Exhausted {
            resource: kind.to_string(),
            candidates: candidates.len(),
            last: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate endpoints".to_string()),
        })
    }

    /// [`fetch`](Self::fetch) with the resource's criticality applied:
    /// auxiliary resources degrade to an empty collection on exhaustion.
    pub async fn fetch_resource(
        &self,
        kind: ResourceKind,
        project_id: &str,
        catalog: &EndpointCatalog,
        connection: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> Result<RawCollection, FetchError> {
        let candidates = catalog.candidates(kind);
        if candidates.is_empty() && kind.criticality() == Criticality::Auxiliary {
            debug!(resource = %kind, "Platform has no endpoints for resource, skipping");
            return Ok(Vec::new());
        }
        match (self.fetch(kind, project_id, candidates, connection, cancel).await, kind.criticality()) {
            (Ok(items), _) => Ok(items),
            (Err(FetchError::Cancelled), _) => Err(FetchError::Cancelled),
            (Err(e), Criticality::Critical) => Err(e),
            (Err(e), Criticality::Auxiliary) => {
                warn!(resource = %kind, project_id = %project_id, error = %e, "Auxiliary resource unavailable, continuing without it");
                Ok(Vec::new())
            }
        }
    }

    /// Fetch the project record and every auxiliary collection.
    pub async fn fetch_bundle(
        &self,
        catalog: &EndpointCatalog,
        project_id: &str,
        connection: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> Result<RawBundle, FetchError> {
        let project = self
            .fetch_resource(ResourceKind::Project, project_id, catalog, connection, cancel)
            .await?
            .into_iter()
            .next()
            .unwrap_or(Value::Null);

        let (tasks, sprints, team, backlog) = tokio::join!(
            self.fetch_resource(ResourceKind::Tasks, project_id, catalog, connection, cancel),
            self.fetch_resource(ResourceKind::Sprints, project_id, catalog, connection, cancel),
            self.fetch_resource(ResourceKind::Team, project_id, catalog, connection, cancel),
            self.fetch_resource(ResourceKind::Backlog, project_id, catalog, connection, cancel),
        );

        let bundle = RawBundle {
            project,
            tasks: tasks?,
            sprints: sprints?,
            team: team?,
            backlog: backlog?,
        };

        info!(
            project_id = %project_id,
            tasks = bundle.tasks.len(),
            sprints = bundle.sprints.len(),
            team = bundle.team.len(),
            backlog = bundle.backlog.len(),
            "Fetched project bundle"
        );
        Ok(bundle)
    }

    async fn fetch_endpoint(
        &self,
        policy: &RetryPolicy,
        spec: &EndpointSpec,
        project_id: &str,
        connection: &ConnectionConfig,
        cancel: &CancellationToken,
    ) -> Result<RawCollection, FetchError> {
        let Some(pagination) = &spec.pagination else {
            let body = self.request_page(policy, spec, project_id, connection, cancel, None).await?;
            return decode(spec, &body);
        };

        let page_size = pagination.page_size.unwrap_or(self.page_size).max(1);
        let max_pages = pagination.max_pages.unwrap_or(self.max_pages).max(1);
        let mut collected = Vec::new();
        let mut offset = 0u32;

        for page in 0..max_pages {
            let result = self
                .request_page(policy, spec, project_id, connection, cancel, Some((offset, page_size)))
                .await
                .and_then(|body| decode(spec, &body));

            let items = match result {
                Ok(items) => items,
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) if page == 0 => return Err(e),
                Err(e) => {
                    warn!(
                        endpoint = %spec.describe(),
                        page,
                        collected = collected.len(),
                        error = %e,
                        "Page failed, keeping records collected so far"
                    );
                    break;
                }
            };

            let count = items.len() as u32;
            collected.extend(items);
            if count < page_size {
                break;
            }
            offset += count;
            if page + 1 == max_pages {
                debug!(endpoint = %spec.describe(), max_pages, "Page cap reached");
            }
        }

        Ok(collected)
    }

    async fn request_page(
        &self,
        policy: &RetryPolicy,
        spec: &EndpointSpec,
        project_id: &str,
        connection: &ConnectionConfig,
        cancel: &CancellationToken,
        page: Option<(u32, u32)>,
    ) -> Result<Value, FetchError> {
        let request = spec.build_request(connection, project_id, page);
        let transport = self.transport.as_ref();
        let response = policy
            .run(self.sleeper.as_ref(), cancel, &request.url, |_| transport.send(&request))
            .await?;
        Ok(response.body)
    }
}

fn decode(spec: &EndpointSpec, body: &Value) -> Result<RawCollection, FetchError> {
    let endpoint = spec.describe();
    match &spec.decode {
        Decode::Record { pointer } => {
            decode_record(&endpoint, body, pointer.as_deref()).map(|record| vec![record])
        }
        Decode::Collection { keys, pointer } => {
            decode_collection(&endpoint, body, keys, pointer.as_deref())
        }
        Decode::Flatten { parents, children } => flatten_children(&endpoint, body, parents, children),
    }
}
