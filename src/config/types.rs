use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Sociograph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    pub credentials: CredentialsConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub seeds: SeedConfig,
}

/// Scheduling behavior of the crawler units
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Cool-down after a quota exhaustion (seconds)
    #[serde(rename = "cooldown-seconds", default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,

    /// Wait between polls of an empty queue (milliseconds)
    #[serde(rename = "idle-delay-ms", default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,

    /// Number of user ids per profile batch job
    #[serde(rename = "lookup-batch-size", default = "default_lookup_batch_size")]
    pub lookup_batch_size: usize,

    /// Number of statuses requested per timeline call
    #[serde(rename = "timeline-page-size", default = "default_timeline_page_size")]
    pub timeline_page_size: u32,
}

impl CrawlerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            cooldown_seconds: default_cooldown_seconds(),
            idle_delay_ms: default_idle_delay_ms(),
            lookup_batch_size: default_lookup_batch_size(),
            timeline_page_size: default_timeline_page_size(),
        }
    }
}

/// Remote API endpoints and transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API, without trailing slash
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    /// Endpoint for exchanging consumer credentials for a bearer token
    #[serde(rename = "token-url", default = "default_token_url")]
    pub token_url: String,

    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-seconds", default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            token_url: default_token_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Application credentials for the remote API
#[derive(Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(rename = "consumer-key")]
    pub consumer_key: String,

    #[serde(rename = "consumer-secret")]
    pub consumer_secret: String,

    /// Pre-issued app-only token; skips the token exchange when set
    #[serde(rename = "bearer-token", default)]
    pub bearer_token: Option<String>,
}

// Secrets stay out of logs and dry-run output.
impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Screen names pre-scheduled on each unit at startup
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub profiles: Vec<String>,

    #[serde(default)]
    pub relationships: Vec<String>,

    #[serde(default)]
    pub statuses: Vec<String>,
}

impl SeedConfig {
    pub fn total(&self) -> usize {
        self.profiles.len() + self.relationships.len() + self.statuses.len()
    }
}

fn default_cooldown_seconds() -> u64 {
    15 * 60
}

fn default_idle_delay_ms() -> u64 {
    2_000
}

fn default_lookup_batch_size() -> usize {
    100
}

fn default_timeline_page_size() -> u32 {
    200
}

fn default_base_url() -> String {
    "https://api.twitter.com/1.1".to_string()
}

fn default_token_url() -> String {
    "https://api.twitter.com/oauth2/token".to_string()
}

fn default_timeout_seconds() -> u64 {
    30
}
