pub mod config;
pub mod connection;
pub mod error;
pub mod job;
pub mod project;

pub use config::Config;
pub use connection::*;
pub use error::*;
pub use job::*;
pub use project::*;
