//! Report jobs: the persistent job store, the platform registry and the
//! runner that takes each job from `queued` to a terminal state.

pub mod registry;
pub mod runner;
pub mod store;

pub use registry::{Dispatch, PlatformRegistry, RegistryError};
pub use runner::{render_progress, JobRunner, CANCELLED};
pub use store::{JobStore, JobStoreError, MemoryJobStore, INTERRUPTED};
