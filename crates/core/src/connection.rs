//! Per-job upstream connection settings and the provider seam that supplies them.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::config::Config;
use crate::error::CoreError;

/// How a request authenticates against the upstream platform.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    None,
    /// `Authorization: Bearer <token>`.
    Bearer(String),
    /// HTTP basic auth (`user:token`).
    Basic { user: String, token: String },
    /// Raw token in the `Authorization` header (Monday style).
    Raw(String),
    /// Token in a custom header (e.g. `x-api-key`).
    Header { name: String, value: String },
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::None => write!(f, "None"),
            Credential::Bearer(_) => write!(f, "Bearer(***)"),
            Credential::Basic { user, .. } => write!(f, "Basic({user}:***)"),
            Credential::Raw(_) => write!(f, "Raw(***)"),
            Credential::Header { name, .. } => write!(f, "Header({name}: ***)"),
        }
    }
}

/// Immutable connection settings for a single job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub base_url: String,
    pub credential: Credential,
    pub timeout: Duration,
    /// Maximum attempts per endpoint (retry budget).
    pub retry_budget: u32,
}

impl ConnectionConfig {
    /// Connection with a 30 second timeout and a budget of three attempts.
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            timeout: Duration::from_secs(30),
            retry_budget: 3,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Attempts per endpoint, including the first.
    pub fn with_retry_budget(mut self, attempts: u32) -> Self {
        self.retry_budget = attempts.max(1);
        self
    }
}

/// Supplies connection settings per platform. Credentials are owned by the
/// provider, never by the pipeline.
pub trait ConnectionProvider: Send + Sync {
    fn connection_for(&self, platform: &str) -> Result<ConnectionConfig, CoreError>;
}

/// Connection provider backed by the environment configuration.
pub struct EnvConnectionProvider {
    config: Config,
}

impl EnvConnectionProvider {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn decorate(&self, connection: ConnectionConfig) -> ConnectionConfig {
        connection
            .with_timeout(self.config.fetch.timeout())
            .with_retry_budget(self.config.fetch.max_attempts)
    }
}

impl ConnectionProvider for EnvConnectionProvider {
    fn connection_for(&self, platform: &str) -> Result<ConnectionConfig, CoreError> {
        let not_configured = || CoreError::PlatformNotConfigured(platform.to_string());
        let connection = match platform {
            "jira" => {
                let jira = &self.config.jira;
                let base_url = jira.base_url.clone().ok_or_else(not_configured)?;
                let token = jira.api_token.clone().ok_or_else(not_configured)?;
                let credential = match &jira.email {
                    Some(user) => Credential::Basic { user: user.clone(), token },
                    None => Credential::Bearer(token),
                };
                ConnectionConfig::new(base_url, credential)
            }
            "monday" => {
                let monday = &self.config.monday;
                let token = monday.api_token.clone().ok_or_else(not_configured)?;
                ConnectionConfig::new(monday.base_url.clone(), Credential::Raw(token))
            }
            "trofos" => {
                let trofos = &self.config.trofos;
                let base_url = trofos.base_url.clone().ok_or_else(not_configured)?;
                let key = trofos.api_key.clone().ok_or_else(not_configured)?;
                ConnectionConfig::new(
                    base_url,
                    Credential::Header { name: "x-api-key".to_string(), value: key },
                )
            }
            other => return Err(CoreError::UnsupportedPlatform(other.to_string())),
        };
        Ok(self.decorate(connection))
    }
}

/// Fixed connection table, mainly for embedding and tests.
#[derive(Debug, Default, Clone)]
pub struct StaticConnectionProvider {
    connections: HashMap<String, ConnectionConfig>,
}

impl StaticConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, platform: impl Into<String>, connection: ConnectionConfig) -> Self {
        self.connections.insert(platform.into(), connection);
        self
    }
}

impl ConnectionProvider for StaticConnectionProvider {
    fn connection_for(&self, platform: &str) -> Result<ConnectionConfig, CoreError> {
        self.connections
            .get(platform)
            .cloned()
            .ok_or_else(|| CoreError::PlatformNotConfigured(platform.to_string()))
    }
}
