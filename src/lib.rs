//! Sociograph: a quota-aware social graph crawler
//!
//! This crate crawls user profiles, follow relationships and posted statuses
//! from a rate-limited REST API into SQLite. Each crawl stage runs as its own
//! crawler unit with a private FIFO job queue; a unit that exhausts its API
//! quota requeues the job and cools down without stalling its siblings.

pub mod api;
pub mod config;
pub mod crawler;
pub mod storage;

use thiserror::Error;

/// Main error type for Sociograph operations
#[derive(Debug, Error)]
pub enum SociographError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote API error: {0}")]
    Api(#[from] ApiError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Failures raised by the remote API collaborator
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 429: the endpoint's quota window is exhausted
    #[error("Rate limit exceeded on {endpoint}")]
    QuotaExceeded {
        endpoint: String,
        /// Epoch seconds at which the window resets, when the API reported it
        reset_at: Option<i64>,
    },

    #[error("HTTP error for {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        source: serde_json::Error,
    },

    #[error("Authentication failed: {0}")]
    Auth(String),
}

impl ApiError {
    /// Returns true for the distinguished quota-exhaustion condition
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::QuotaExceeded { .. })
    }
}

/// Outcome of a failed job execution
///
/// The crawler unit reacts to each variant differently: quota exhaustion
/// requeues the job and cools down, everything else drops the job.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Quota exceeded on {endpoint}")]
    QuotaExceeded {
        endpoint: String,
        reset_at: Option<i64>,
    },

    #[error("Remote error: {0}")]
    Remote(ApiError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),
}

impl From<ApiError> for ExecError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::QuotaExceeded { endpoint, reset_at } => {
                Self::QuotaExceeded { endpoint, reset_at }
            }
            other => Self::Remote(other),
        }
    }
}

/// Result type alias for Sociograph operations
pub type Result<T> = std::result::Result<T, SociographError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for remote API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;

// Re-export commonly used types
pub use api::{RemoteApi, TwitterClient};
pub use config::Config;
pub use crawler::{Scheduler, UnitStatus};
pub use storage::SqliteStorage;
