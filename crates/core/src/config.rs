use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key).as_deref() {
        Some("1") | Some("true") | Some("yes") => true,
        Some("0") | Some("false") | Some("no") => false,
        _ => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub fetch: FetchConfig,
    pub jobs: JobConfig,
    pub jira: JiraConfig,
    pub monday: MondayConfig,
    pub trofos: TrofosConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `TASKPULSE_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("TASKPULSE_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            storage: StorageConfig::from_env_profiled(p),
            fetch: FetchConfig::from_env_profiled(p),
            jobs: JobConfig::from_env_profiled(p),
            jira: JiraConfig::from_env_profiled(p),
            monday: MondayConfig::from_env_profiled(p),
            trofos: TrofosConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:    {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  storage:   data_dir={}, artifact_dir={}",
            self.storage.data_dir.display(),
            self.storage.artifact_dir.display()
        );
        tracing::info!(
            "  fetch:     attempts={}, base_delay={}ms, timeout={}s",
            self.fetch.max_attempts, self.fetch.base_delay_ms, self.fetch.timeout_secs
        );
        tracing::info!("  jobs:      stage_timeout={}s, journal={}", self.jobs.stage_timeout_secs, self.jobs.journal);
        tracing::info!("  jira:      configured={}", self.jira.is_configured());
        tracing::info!("  monday:    configured={}", self.monday.is_configured());
        tracing::info!("  trofos:    configured={}", self.trofos.is_configured());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "storage": {
                "artifact_extension": self.storage.artifact_extension,
                "recency_minutes": self.storage.recency_minutes,
            },
            "fetch": {
                "max_attempts": self.fetch.max_attempts,
                "base_delay_ms": self.fetch.base_delay_ms,
                "timeout_secs": self.fetch.timeout_secs,
            },
            "platforms": {
                "jira": self.jira.is_configured(),
                "monday": self.monday.is_configured(),
                "trofos": self.trofos.is_configured(),
            },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "PORT", 3001),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
        }
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Primary artifact root (content-addressed store lives here).
    pub artifact_dir: PathBuf,
    /// Optional override root consulted by the artifact resolver.
    pub output_dir_override: Option<PathBuf>,
    /// Extension (without dot) of produced artifacts.
    pub artifact_extension: String,
    /// Modification-time window for the resolver's fallback search. 0 disables it.
    pub recency_minutes: u64,
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let data_dir = PathBuf::from(profiled_env_or(p, "DATA_DIR", "data"));
        let artifact_dir = profiled_env_opt(p, "ARTIFACT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("artifacts"));
        Self {
            data_dir,
            artifact_dir,
            output_dir_override: profiled_env_opt(p, "REPORT_OUTPUT_DIR").map(PathBuf::from),
            artifact_extension: profiled_env_or(p, "ARTIFACT_EXTENSION", "md")
                .trim_start_matches('.')
                .to_string(),
            recency_minutes: profiled_env_u64(p, "ARTIFACT_RECENCY_MINUTES", 60),
        }
    }

    /// Directory holding the job journal.
    pub fn jobs_dir(&self) -> PathBuf {
        self.data_dir.join("jobs")
    }

    /// Scratch directory renderers write into before the artifact is stored.
    pub fn work_dir(&self) -> PathBuf {
        self.data_dir.join("work")
    }
}

// ── Upstream fetching ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
}

impl FetchConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            max_attempts: profiled_env_u32(p, "FETCH_MAX_ATTEMPTS", 3).max(1),
            base_delay_ms: profiled_env_u64(p, "FETCH_BASE_DELAY_MS", 1000),
            max_delay_ms: profiled_env_u64(p, "FETCH_MAX_DELAY_MS", 30_000),
            timeout_secs: profiled_env_u64(p, "FETCH_TIMEOUT_SECS", 30),
            page_size: profiled_env_u32(p, "FETCH_PAGE_SIZE", 100).max(1),
            max_pages: profiled_env_u32(p, "FETCH_MAX_PAGES", 20).max(1),
        }
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            timeout_secs: 30,
            page_size: 100,
            max_pages: 20,
        }
    }
}

// ── Jobs ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    /// Deadline applied to each pipeline stage.
    pub stage_timeout_secs: u64,
    /// Append every job mutation to `{DATA_DIR}/jobs/jobs.jsonl`.
    pub journal: bool,
}

impl JobConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            stage_timeout_secs: profiled_env_u64(p, "JOB_STAGE_TIMEOUT_SECS", 300).max(1),
            journal: profiled_env_bool(p, "JOB_JOURNAL", true),
        }
    }

    /// Per-stage deadline for report jobs.
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.stage_timeout_secs)
    }
}

// ── Jira ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
}

impl JiraConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "JIRA_BASE_URL"),
            email: profiled_env_opt(p, "JIRA_EMAIL"),
            api_token: profiled_env_opt(p, "JIRA_API_TOKEN"),
        }
    }

    /// Base URL and API token are both set.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_token.is_some()
    }
}

// ── Monday.com ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MondayConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl MondayConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_or(p, "MONDAY_BASE_URL", "https://api.monday.com/v2"),
            api_token: profiled_env_opt(p, "MONDAY_API_TOKEN"),
        }
    }

    /// API token is set; the base URL has a default.
    pub fn is_configured(&self) -> bool {
        self.api_token.is_some()
    }
}

// ── TROFOS ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrofosConfig {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl TrofosConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "TROFOS_BASE_URL"),
            api_key: profiled_env_opt(p, "TROFOS_API_KEY"),
        }
    }

    /// Base URL and API key are both set.
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.api_key.is_some()
    }
}
