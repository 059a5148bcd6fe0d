//! Per-platform endpoint catalogs.
//!
//! A catalog lists, for every [`ResourceKind`], the ordered candidate
//! endpoints the fetcher cascades through. Paths, query parameters and
//! GraphQL variables are templates with a `{project_id}` placeholder; GraphQL
//! query text is sent verbatim and never has the id spliced into it.

use std::collections::HashMap;
use std::fmt;

use serde_json::{json, Value};

use taskpulse_core::ConnectionConfig;

use crate::transport::UpstreamRequest;

const PROJECT_ID_PLACEHOLDER: &str = "{project_id}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Project,
    Tasks,
    Sprints,
    Team,
    Backlog,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 5] = [
        ResourceKind::Project,
        ResourceKind::Tasks,
        ResourceKind::Sprints,
        ResourceKind::Team,
        ResourceKind::Backlog,
    ];

    /// Name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Project => "project",
            ResourceKind::Tasks => "tasks",
            ResourceKind::Sprints => "sprints",
            ResourceKind::Team => "team",
            ResourceKind::Backlog => "backlog",
        }
    }

    /// Only the primary project record is critical.
    pub fn criticality(self) -> Criticality {
        match self {
            ResourceKind::Project => Criticality::Critical,
            _ => Criticality::Auxiliary,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criticality {
    /// Exhaustion fails the fetch.
    Critical,
    /// Exhaustion degrades to an empty collection.
    Auxiliary,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestShape {
    Get,
    /// POST `{"query": ..., "variables": ...}` to the endpoint path.
    GraphQl { query: String, variables: Value },
}

/// How the project id is quoted when substituted into a query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    Plain,
    /// Inside a double-quoted JQL string literal.
    JqlString,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryParam {
    pub key: String,
    pub template: String,
    pub quoting: Quoting,
}

impl QueryParam {
    fn render(&self, project_id: &str) -> String {
        let id = match self.quoting {
            Quoting::Plain => project_id.to_string(),
            Quoting::JqlString => escape_jql(project_id),
        };
        self.template.replace(PROJECT_ID_PLACEHOLDER, &id)
    }
}

/// Escape a value for a double-quoted JQL string.
pub fn escape_jql(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Replace every string equal to the placeholder with the project id.
fn bind_variables(template: &Value, project_id: &str) -> Value {
    match template {
        Value::String(s) if s == PROJECT_ID_PLACEHOLDER => Value::String(project_id.to_string()),
        Value::Array(items) => Value::Array(items.iter().map(|v| bind_variables(v, project_id)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), bind_variables(v, project_id)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Offset pagination parameters (`startAt`/`maxResults` style).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub offset_param: String,
    pub limit_param: String,
    /// Overrides the fetcher's default page size.
    pub page_size: Option<u32>,
    /// Overrides the fetcher's default page cap.
    pub max_pages: Option<u32>,
}

impl Pagination {
    /// Offset pagination using the fetcher's page size and page cap.
    pub fn offset(offset_param: &str, limit_param: &str) -> Self {
        Self {
            offset_param: offset_param.to_string(),
            limit_param: limit_param.to_string(),
            page_size: None,
            max_pages: None,
        }
    }
}

/// How a response body is turned into raw records.
#[derive(Debug, Clone, PartialEq)]
pub enum Decode {
    Record { pointer: Option<String> },
    Collection { keys: Vec<String>, pointer: Option<String> },
    /// Children embedded in parent records (backlog items under sprints).
    Flatten { parents: Vec<String>, children: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub path: String,
    pub query: Vec<QueryParam>,
    pub request: RequestShape,
    pub decode: Decode,
    pub pagination: Option<Pagination>,
}

fn strings(keys: &[&str]) -> Vec<String> {
    keys.iter().map(|k| k.to_string()).collect()
}

impl EndpointSpec {
    /// GET endpoint decoding a collection under any of `keys`.
    pub fn get(path: &str) -> Self {
        Self {
            path: path.to_string(),
            query: Vec::new(),
            request: RequestShape::Get,
            decode: Decode::Collection { keys: Vec::new(), pointer: None },
            pagination: None,
        }
    }

    /// GraphQL endpoint; `variables` is a template bound per project.
    pub fn graphql(path: &str, query: &str, variables: Value) -> Self {
        Self {
            request: RequestShape::GraphQl {
                query: query.to_string(),
                variables,
            },
            ..Self::get(path)
        }
    }

    /// Query parameter with the project id substituted as-is.
    pub fn query(self, key: &str, template: &str) -> Self {
        self.query_param(key, template, Quoting::Plain)
    }

    /// JQL query parameter; the project id is escaped for a quoted literal.
    pub fn jql(self, key: &str, template: &str) -> Self {
        self.query_param(key, template, Quoting::JqlString)
    }

    fn query_param(mut self, key: &str, template: &str, quoting: Quoting) -> Self {
        self.query.push(QueryParam {
            key: key.to_string(),
            template: template.to_string(),
            quoting,
        });
        self
    }

    /// Decode the response as a single record.
    pub fn record(mut self) -> Self {
        self.decode = Decode::Record { pointer: None };
        self
    }

    /// Decode a collection found as an array or under `items` or one of `keys`.
    pub fn collection(mut self, keys: &[&str]) -> Self {
        self.decode = Decode::Collection { keys: strings(keys), pointer: None };
        self
    }

    /// JSON pointer applied at each envelope level before decoding.
    pub fn at(mut self, ptr: &str) -> Self {
        match &mut self.decode {
            Decode::Record { pointer } | Decode::Collection { pointer, .. } => {
                *pointer = Some(ptr.to_string())
            }
            Decode::Flatten { .. } => {}
        }
        self
    }

    /// Collect child records nested inside a list of parent records.
    pub fn flatten(mut self, parents: &[&str], children: &[&str]) -> Self {
        self.decode = Decode::Flatten {
            parents: strings(parents),
            children: strings(children),
        };
        self
    }

    /// Request pages until a short page or the page cap.
    pub fn paginate(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Endpoint URL for a project, with the id percent-encoded into the path.
    pub fn url(&self, base_url: &str, project_id: &str) -> String {
        let path = self
            .path
            .replace(PROJECT_ID_PLACEHOLDER, &urlencoding::encode(project_id));
        let base = base_url.trim_end_matches('/');
        if path.is_empty() {
            base.to_string()
        } else if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Build the request for one page (or the only request when unpaginated).
    pub fn build_request(
        &self,
        connection: &ConnectionConfig,
        project_id: &str,
        page: Option<(u32, u32)>,
    ) -> UpstreamRequest {
        let url = self.url(&connection.base_url, project_id);
        let mut request = match &self.request {
            RequestShape::Get => UpstreamRequest::get(connection, url),
            RequestShape::GraphQl { query, variables } => {
                let body = json!({
                    "query": query,
                    "variables": bind_variables(variables, project_id),
                });
                UpstreamRequest::post(connection, url, body)
            }
        };
        for param in &self.query {
            request = request.with_query(param.key.as_str(), param.render(project_id));
        }
        if let (Some(p), Some((offset, limit))) = (&self.pagination, page) {
            request = request
                .with_query(p.offset_param.as_str(), offset.to_string())
                .with_query(p.limit_param.as_str(), limit.to_string());
        }
        request
    }

    /// Short `METHOD path` label for logs.
    pub fn describe(&self) -> String {
        match &self.request {
            RequestShape::Get => format!("GET {}", self.path),
            RequestShape::GraphQl { .. } => format!("POST {} (graphql)", self.path),
        }
    }
}

/// Ordered candidate endpoints per resource kind for one platform.
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    endpoints: HashMap<ResourceKind, Vec<EndpointSpec>>,
}

impl EndpointCatalog {
    /// Catalog with no endpoints.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate for `kind`. Candidates are tried in insertion order.
    pub fn with(mut self, kind: ResourceKind, spec: EndpointSpec) -> Self {
        self.endpoints.entry(kind).or_default().push(spec);
        self
    }

    /// Candidates for `kind`, empty when the platform has none.
    pub fn candidates(&self, kind: ResourceKind) -> &[EndpointSpec] {
        self.endpoints.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Resolve a platform name or alias to its canonical built-in name.
pub fn canonical_platform(name: &str) -> Option<&'static str> {
    match name.trim().to_ascii_lowercase().as_str() {
        "jira" | "atlassian" => Some("jira"),
        "monday" | "monday.com" => Some("monday"),
        "trofos" => Some("trofos"),
        _ => None,
    }
}

/// Catalog for a built-in platform name or alias.
pub fn builtin_catalog(platform: &str) -> Option<EndpointCatalog> {
    match canonical_platform(platform)? {
        "jira" => Some(jira_catalog()),
        "monday" => Some(monday_catalog()),
        "trofos" => Some(trofos_catalog()),
        _ => None,
    }
}

/// Jira Cloud REST v3 with v2 fallbacks; sprints and backlog come from the
/// agile API with the project id used as board id.
pub fn jira_catalog() -> EndpointCatalog {
    let search = |version: &str| {
        EndpointSpec::get(&format!("/rest/api/{version}/search"))
            .jql("jql", "project = \"{project_id}\" ORDER BY created DESC")
            .collection(&["issues"])
            .paginate(Pagination::offset("startAt", "maxResults"))
    };
    EndpointCatalog::new()
        .with(ResourceKind::Project, EndpointSpec::get("/rest/api/3/project/{project_id}").record())
        .with(ResourceKind::Project, EndpointSpec::get("/rest/api/2/project/{project_id}").record())
        .with(ResourceKind::Tasks, search("3"))
        .with(ResourceKind::Tasks, search("2"))
        .with(
            ResourceKind::Sprints,
            EndpointSpec::get("/rest/agile/1.0/board/{project_id}/sprint")
                .collection(&["values", "sprints"])
                .paginate(Pagination::offset("startAt", "maxResults")),
        )
        .with(
            ResourceKind::Team,
            EndpointSpec::get("/rest/api/3/user/assignable/search")
                .query("project", "{project_id}")
                .collection(&["users"]),
        )
        .with(
            ResourceKind::Backlog,
            EndpointSpec::get("/rest/agile/1.0/board/{project_id}/backlog")
                .collection(&["issues"])
                .paginate(Pagination::offset("startAt", "maxResults")),
        )
}

/// monday.com GraphQL. Groups stand in for sprints and there is no backlog.
pub fn monday_catalog() -> EndpointCatalog {
    let board = |fields: &str| {
        let query = format!("query ($ids: [ID!]) {{ boards(ids: $ids) {{ {fields} }} }}");
        EndpointSpec::graphql("", &query, json!({ "ids": [PROJECT_ID_PLACEHOLDER] }))
    };
    EndpointCatalog::new()
        .with(
            ResourceKind::Project,
            board("id name description state updated_at")
                .record()
                .at("/boards/0"),
        )
        .with(
            ResourceKind::Tasks,
            board("items_page(limit: 500) { items { id name state updated_at group { id title } column_values { id text } } }")
                .collection(&["items"])
                .at("/boards/0/items_page/items"),
        )
        .with(
            ResourceKind::Sprints,
            board("groups { id title }")
                .collection(&["groups"])
                .at("/boards/0/groups"),
        )
        .with(
            ResourceKind::Team,
            board("subscribers { id name email title }")
                .collection(&["subscribers"])
                .at("/boards/0/subscribers"),
        )
}

/// TROFOS REST, with the external API paths as fallbacks.
pub fn trofos_catalog() -> EndpointCatalog {
    EndpointCatalog::new()
        .with(ResourceKind::Project, EndpointSpec::get("/v1/project/{project_id}").record())
        .with(
            ResourceKind::Project,
            EndpointSpec::get("/api/external/v1/project/{project_id}").record(),
        )
        .with(
            ResourceKind::Tasks,
            EndpointSpec::get("/v1/project/{project_id}/backlog").collection(&["backlogs", "tasks"]),
        )
        .with(
            ResourceKind::Tasks,
            EndpointSpec::get("/api/external/v1/project/{project_id}/backlog")
                .collection(&["backlogs", "tasks"]),
        )
        .with(
            ResourceKind::Sprints,
            EndpointSpec::get("/v1/project/{project_id}/sprint").collection(&["sprints"]),
        )
        .with(
            ResourceKind::Team,
            EndpointSpec::get("/v1/project/{project_id}/user").collection(&["users", "members"]),
        )
        .with(
            ResourceKind::Backlog,
            EndpointSpec::get("/v1/project/{project_id}/sprint")
                .flatten(&["sprints"], &["backlog_items", "backlogs", "items"]),
        )
}
