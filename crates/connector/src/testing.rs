//! Scripted in-memory [`Transport`] for exercising the fetcher without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::FetchError;
use crate::transport::{Transport, UpstreamRequest, UpstreamResponse};

#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    Status(u16),
    /// No response at all (connection refused).
    Unreachable,
}

#[derive(Debug, Default)]
struct Script {
    replies: HashMap<String, VecDeque<Reply>>,
    calls: HashMap<String, usize>,
    requests: Vec<UpstreamRequest>,
}

/// Replies per URL are consumed in order; the last one repeats forever.
/// Unscripted URLs answer 404.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `url`.
    pub fn on(self, url: &str, reply: Reply) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.replies.entry(url.to_string()).or_default().push_back(reply);
        }
        self
    }

    /// Number of requests sent to `url` so far.
    pub fn calls(&self, url: &str) -> usize {
        self.script
            .lock()
            .ok()
            .and_then(|s| s.calls.get(url).copied())
            .unwrap_or(0)
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.script.lock().map(|s| s.requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &UpstreamRequest) -> Result<UpstreamResponse, FetchError> {
        let reply = {
            let mut script = self.script.lock().map_err(|_| FetchError::Transient {
                endpoint: request.url.clone(),
                status: None,
                message: "script lock poisoned".into(),
            })?;
            *script.calls.entry(request.url.clone()).or_default() += 1;
            script.requests.push(request.clone());
            match script.replies.get_mut(&request.url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Json(body)) => Ok(UpstreamResponse { status: 200, body }),
            Some(Reply::Status(status)) => Err(FetchError::from_status(&request.url, status, "")),
            Some(Reply::Unreachable) => Err(FetchError::Transient {
                endpoint: request.url.clone(),
                status: None,
                message: "connection refused".into(),
            }),
            None => Err(FetchError::from_status(&request.url, 404, "")),
        }
    }
}
