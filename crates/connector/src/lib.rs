//! Endpoint fetcher: pulls raw project data from upstream platform APIs.
//!
//! Candidate endpoints per resource kind are tried in order, each attempt
//! wrapped in a [`RetryPolicy`]. Transient failures back off and retry,
//! 4xx moves on to the next candidate, and auxiliary resources degrade to
//! empty collections when every candidate is exhausted.

pub mod catalog;
pub mod envelope;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod testing;
pub mod transport;

pub use catalog::{
    builtin_catalog, canonical_platform, escape_jql, Criticality, Decode, EndpointCatalog,
    EndpointSpec, Pagination, QueryParam, Quoting, RequestShape, ResourceKind,
};
pub use error::FetchError;
pub use fetcher::{EndpointFetcher, RawBundle, RawCollection};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, TokioSleeper};
pub use transport::{HttpMethod, HttpTransport, Transport, UpstreamRequest, UpstreamResponse};
