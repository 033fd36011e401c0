//! HTTP client for the v1.1 REST API
//!
//! This module handles all HTTP traffic for the crawler, including:
//! - Building the reqwest client with the crawler's user agent
//! - App-only bearer authentication (configured or exchanged once)
//! - Mapping HTTP 429 onto the quota-exceeded condition
//! - Cursor-paged friend id lists

use crate::api::model::{FriendIdsPage, Profile, TokenResponse, Tweet};
use crate::api::RemoteApi;
use crate::config::{ApiConfig, Config, CredentialsConfig, MAX_LOOKUP_BATCH};
use crate::{ApiError, ApiResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Header carrying the epoch second at which the quota window resets
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// Error bodies are truncated to this many characters before logging
const MAX_ERROR_BODY: usize = 256;

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use sociograph::api::build_http_client;
/// use sociograph::config::ApiConfig;
///
/// let client = build_http_client(&ApiConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ApiConfig) -> Result<Client, reqwest::Error> {
    let user_agent = format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_seconds))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Remote API client backed by reqwest
pub struct TwitterClient {
    client: Client,
    base_url: String,
    token_url: String,
    credentials: CredentialsConfig,
    token: OnceCell<String>,
    timeline_page_size: u32,
}

impl TwitterClient {
    /// Creates a client from the loaded configuration
    pub fn new(config: &Config) -> ApiResult<Self> {
        let client = build_http_client(&config.api).map_err(|source| ApiError::Http {
            endpoint: "client".to_string(),
            source,
        })?;

        Ok(Self::with_client(
            client,
            &config.api,
            config.credentials.clone(),
            config.crawler.timeline_page_size,
        ))
    }

    /// Creates a client around an existing reqwest client
    pub fn with_client(
        client: Client,
        api: &ApiConfig,
        credentials: CredentialsConfig,
        timeline_page_size: u32,
    ) -> Self {
        let token = match credentials.bearer_token.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => OnceCell::new_with(Some(t.to_string())),
            _ => OnceCell::new(),
        };

        Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token_url: api.token_url.clone(),
            credentials,
            token,
            timeline_page_size,
        }
    }

    /// Returns the bearer token, exchanging consumer credentials on first use
    async fn bearer_token(&self) -> ApiResult<&str> {
        let token = self
            .token
            .get_or_try_init(|| self.exchange_token())
            .await?;
        Ok(token.as_str())
    }

    async fn exchange_token(&self) -> ApiResult<String> {
        tracing::debug!("Exchanging consumer credentials for a bearer token");

        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.consumer_key,
                Some(&self.credentials.consumer_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|source| ApiError::Http {
                endpoint: "oauth2/token".to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Auth(format!(
                "token endpoint returned HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.text().await.map_err(|source| ApiError::Http {
            endpoint: "oauth2/token".to_string(),
            source,
        })?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|source| ApiError::Decode {
                endpoint: "oauth2/token".to_string(),
                source,
            })?;

        if !token.token_type.eq_ignore_ascii_case("bearer") {
            return Err(ApiError::Auth(format!(
                "unexpected token type '{}'",
                token.token_type
            )));
        }

        Ok(token.access_token)
    }

    /// Issues an authenticated GET and decodes the JSON body
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let token = self.bearer_token().await?;
        let url = format!("{}/{}.json", self.base_url, endpoint);

        tracing::trace!("GET {} {:?}", url, query);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .map_err(|source| ApiError::Http {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_at = response
                .headers()
                .get(RATE_LIMIT_RESET_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<i64>().ok());

            return Err(ApiError::QuotaExceeded {
                endpoint: endpoint.to_string(),
                reset_at,
            });
        }

        let body = response.text().await.map_err(|source| ApiError::Http {
            endpoint: endpoint.to_string(),
            source,
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        serde_json::from_str(&body).map_err(|source| ApiError::Decode {
            endpoint: endpoint.to_string(),
            source,
        })
    }
}

fn bare_screen_name(screen_name: &str) -> String {
    screen_name.trim().trim_start_matches('@').to_string()
}

#[async_trait]
impl RemoteApi for TwitterClient {
    async fn fetch_profile(&self, screen_name: &str) -> ApiResult<Profile> {
        self.get(
            "users/show",
            &[("screen_name", bare_screen_name(screen_name))],
        )
        .await
    }

    async fn fetch_profiles(&self, ids: &[i64]) -> ApiResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        if ids.len() > MAX_LOOKUP_BATCH {
            return Err(ApiError::Status {
                endpoint: "users/lookup".to_string(),
                status: StatusCode::BAD_REQUEST.as_u16(),
                body: format!(
                    "{} ids requested, at most {} allowed",
                    ids.len(),
                    MAX_LOOKUP_BATCH
                ),
            });
        }

        let joined = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");

        self.get("users/lookup", &[("user_id", joined)]).await
    }

    async fn fetch_friend_ids_page(
        &self,
        screen_name: &str,
        cursor: i64,
    ) -> ApiResult<FriendIdsPage> {
        self.get(
            "friends/ids",
            &[
                ("screen_name", bare_screen_name(screen_name)),
                ("cursor", cursor.to_string()),
            ],
        )
        .await
    }

    async fn fetch_statuses(&self, screen_name: &str) -> ApiResult<Vec<Tweet>> {
        self.get(
            "statuses/user_timeline",
            &[
                ("screen_name", bare_screen_name(screen_name)),
                ("count", self.timeline_page_size.to_string()),
                ("tweet_mode", "extended".to_string()),
            ],
        )
        .await
    }
}
