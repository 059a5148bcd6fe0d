//! HTTP seam between the fetcher and the network.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use taskpulse_core::{ConnectionConfig, Credential};

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// A fully resolved upstream request.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamRequest {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub credential: Credential,
    pub timeout: Duration,
}

impl UpstreamRequest {
    /// GET carrying the connection's credential and timeout.
    pub fn get(connection: &ConnectionConfig, url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            body: None,
            credential: connection.credential.clone(),
            timeout: connection.timeout,
        }
    }

    /// POST with a JSON body.
    pub fn post(connection: &ConnectionConfig, url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            body: Some(body),
            ..Self::get(connection, url)
        }
    }

    /// Append a query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// Successful (2xx) upstream response.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Value,
}

/// Sends upstream requests. Non-2xx statuses are reported as [`FetchError`]s
/// classified by [`FetchError::from_status`].
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError>;
}

/// [`Transport`] over a shared `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder
            .timeout(request.timeout)
            .header("Accept", "application/json");
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        builder = match &request.credential {
            Credential::None => builder,
            Credential::Bearer(token) => builder.bearer_auth(token),
            Credential::Basic { user, token } => builder.basic_auth(user, Some(token)),
            Credential::Raw(token) => builder.header("Authorization", token),
            Credential::Header { name, value } => builder.header(name.as_str(), value),
        };

        debug!(url = %request.url, method = ?request.method, "Sending upstream request");

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    endpoint: request.url.clone(),
                    seconds: request.timeout.as_secs(),
                }
            } else {
                FetchError::Transient {
                    endpoint: request.url.clone(),
                    status: None,
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(&request.url, status, &body));
        }

        let body: Value = response.json().await.map_err(|e| FetchError::Shape {
            endpoint: request.url.clone(),
            message: format!("invalid JSON body: {e}"),
        })?;

        Ok(UpstreamResponse { status, body })
    }
}
