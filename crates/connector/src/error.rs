use thiserror::Error;

/// Failure of an upstream fetch.
///
/// Only [`FetchError::Transient`] is retried; everything else moves the
/// cascade on to the next candidate endpoint or ends the fetch.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// No response, connection error or HTTP >= 500.
    #[error("transient upstream error from {endpoint}: {message}")]
    Transient {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// HTTP 4xx. Not retried.
    #[error("upstream rejected {endpoint} with HTTP {status}")]
    Permanent { endpoint: String, status: u16 },

    /// Payload did not match the expected shape.
    #[error("unexpected payload shape from {endpoint}: {message}")]
    Shape { endpoint: String, message: String },

    /// Every candidate endpoint failed for a critical resource.
    #[error("all {candidates} endpoints exhausted for {resource}: {last}")]
    Exhausted {
        resource: String,
        candidates: usize,
        last: String,
    },

    #[error("fetch cancelled")]
    Cancelled,

    #[error("request to {endpoint} timed out after {seconds}s")]
    Timeout { endpoint: String, seconds: u64 },
}

impl FetchError {
    /// Retry predicate: no response, connection failures, timeouts and 5xx.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. } | FetchError::Timeout { .. })
    }

    /// Classify an HTTP status that is not a success.
    pub fn from_status(endpoint: &str, status: u16, body: &str) -> Self {
        if status >= 500 {
            FetchError::Transient {
                endpoint: endpoint.to_string(),
                status: Some(status),
                message: truncate(body, 200),
            }
        } else {
            FetchError::Permanent {
                endpoint: endpoint.to_string(),
                status,
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification() {
        assert!(FetchError::from_status("a", 503, "").is_transient());
        assert!(FetchError::from_status("a", 500, "").is_transient());
        assert!(!FetchError::from_status("a", 404, "").is_transient());
        assert!(!FetchError::from_status("a", 401, "").is_transient());
        assert!(FetchError::Timeout { endpoint: "a".into(), seconds: 1 }.is_transient());
        assert!(!FetchError::Cancelled.is_transient());
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        match FetchError::from_status("a", 502, &body) {
            FetchError::Transient { message, .. } => assert_eq!(message.len(), 203),
            other => panic!("unexpected {other:?}"),
        }
    }
}
