use crate::config::types::{
    ApiConfig, Config, CrawlerConfig, CredentialsConfig, OutputConfig, SeedConfig,
};
use crate::ConfigError;
use url::Url;

/// Largest id batch the users/lookup endpoint accepts
pub const MAX_LOOKUP_BATCH: usize = 100;

/// Largest page the user timeline endpoint serves
pub const MAX_TIMELINE_PAGE: u32 = 200;

/// Quota windows of the remote API reset every 15 minutes
pub const QUOTA_WINDOW_SECONDS: u64 = 15 * 60;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_credentials(&config.credentials)?;
    validate_output_config(&config.output)?;
    validate_seeds(&config.seeds)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.cooldown_seconds < 1 {
        return Err(ConfigError::Validation(
            "cooldown-seconds must be >= 1".to_string(),
        ));
    }

    if config.cooldown_seconds < QUOTA_WINDOW_SECONDS {
        tracing::warn!(
            "cooldown-seconds = {} is shorter than the {}s quota window; units may re-hit the limit",
            config.cooldown_seconds,
            QUOTA_WINDOW_SECONDS
        );
    }

    if config.idle_delay_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "idle-delay-ms must be >= 10ms, got {}ms",
            config.idle_delay_ms
        )));
    }

    if config.lookup_batch_size < 1 || config.lookup_batch_size > MAX_LOOKUP_BATCH {
        return Err(ConfigError::Validation(format!(
            "lookup-batch-size must be between 1 and {}, got {}",
            MAX_LOOKUP_BATCH, config.lookup_batch_size
        )));
    }

    if config.timeline_page_size < 1 || config.timeline_page_size > MAX_TIMELINE_PAGE {
        return Err(ConfigError::Validation(format!(
            "timeline-page-size must be between 1 and {}, got {}",
            MAX_TIMELINE_PAGE, config.timeline_page_size
        )));
    }

    Ok(())
}

/// Validates API endpoints
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    for (name, value) in [("base-url", &config.base_url), ("token-url", &config.token_url)] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} '{}' must use http or https",
                name, value
            )));
        }
    }

    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "timeout-seconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates that usable credentials are present
fn validate_credentials(config: &CredentialsConfig) -> Result<(), ConfigError> {
    let has_token = config
        .bearer_token
        .as_deref()
        .is_some_and(|t| !t.trim().is_empty());

    if !has_token && (config.consumer_key.is_empty() || config.consumer_secret.is_empty()) {
        return Err(ConfigError::Validation(
            "either bearer-token or both consumer-key and consumer-secret must be set"
                .to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates seed screen names
fn validate_seeds(config: &SeedConfig) -> Result<(), ConfigError> {
    config
        .profiles
        .iter()
        .chain(&config.relationships)
        .chain(&config.statuses)
        .try_for_each(|name| validate_screen_name(name))
}

/// Validates a screen name: 1-15 characters of letters, digits or underscores
///
/// A leading `@` is tolerated.
pub fn validate_screen_name(name: &str) -> Result<(), ConfigError> {
    let bare = name.strip_prefix('@').unwrap_or(name);

    if bare.is_empty() || bare.len() > 15 {
        return Err(ConfigError::Validation(format!(
            "screen name '{}' must be 1-15 characters",
            name
        )));
    }

    if !bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ConfigError::Validation(format!(
            "screen name '{}' may only contain letters, digits and underscores",
            name
        )));
    }

    Ok(())
}
