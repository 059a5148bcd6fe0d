//! taskpulse HTTP service: report job API, job runner and artifact download.

pub mod api;
pub mod reports;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
