//! Wire models returned by the remote API
//!
//! Field names follow the v1.1 JSON payloads so the types deserialize
//! directly from response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};

/// Timestamp layout used by the API, e.g. `Wed Oct 10 20:19:24 +0000 2018`
pub const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// A user profile
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub screen_name: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub friends_count: i64,
    #[serde(default)]
    pub followers_count: i64,
    #[serde(default)]
    pub listed_count: i64,
    #[serde(default)]
    pub statuses_count: i64,
    #[serde(default)]
    pub favourites_count: i64,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
}

/// Minimal author reference embedded in a status
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TweetAuthor {
    pub id: i64,
}

/// A posted status
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Tweet {
    pub id: i64,
    #[serde(alias = "full_text")]
    pub text: String,
    pub user: TweetAuthor,
    #[serde(default)]
    pub in_reply_to_status_id: Option<i64>,
    #[serde(default)]
    pub quote_count: Option<i64>,
    #[serde(default)]
    pub reply_count: Option<i64>,
    #[serde(default)]
    pub retweet_count: i64,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(deserialize_with = "deserialize_created_at")]
    pub created_at: DateTime<Utc>,
}

/// Cursor that requests the first page of a cursored list
pub const FIRST_CURSOR: i64 = -1;

/// One cursor page of the friends/ids endpoint
///
/// A `next_cursor` of 0 marks the last page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FriendIdsPage {
    pub ids: Vec<i64>,
    #[serde(default)]
    pub next_cursor: i64,
}

/// Response of the app-only token exchange
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
}

/// Parses an API timestamp into UTC
pub fn parse_created_at(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_str(value.trim(), CREATED_AT_FORMAT).map(|dt| dt.with_timezone(&Utc))
}

fn deserialize_created_at<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_created_at(&raw).map_err(serde::de::Error::custom)
}
