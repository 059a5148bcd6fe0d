//! Data normalizer and analytics helpers.

pub mod analytics;
pub mod normalizer;

pub use normalizer::{normalize, Normalizer};

/// Assignee value for tasks nobody could be resolved for.
pub const UNASSIGNED: &str = "Unassigned";

/// Role given to derived team members missing from the roster.
pub const DEFAULT_ROLE: &str = "Team Member";
