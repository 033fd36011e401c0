//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Transactional units of work with upsert-by-id semantics
//! - Follow edge tracking
//! - Read-side queries for statistics

mod error;
mod schema;
mod sqlite;

pub use error::{StorageError, StorageResult};
pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use sqlite::{SqliteStorage, UnitOfWork};

/// Whether an upsert inserted a new row or overwrote an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Represents a user in the database
///
/// Everything but `id` is optional: rows created as follow-edge or status
/// author placeholders carry only the id until their profile is fetched.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub screen_name: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub protected: Option<bool>,
    pub verified: Option<bool>,
    pub friends_count: Option<i64>,
    pub followers_count: Option<i64>,
    pub listed_count: Option<i64>,
    pub statuses_count: Option<i64>,
    pub favourites_count: Option<i64>,
    pub created_at: Option<String>,
    pub profile_crawled_at: Option<String>,
}

impl UserRecord {
    /// True once a full profile has been written for this user
    pub fn is_profiled(&self) -> bool {
        self.profile_crawled_at.is_some()
    }
}

/// Represents a status in the database
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub id: i64,
    pub user_id: i64,
    pub text: Option<String>,
    pub in_reply_to_status_id: Option<i64>,
    pub quote_count: Option<i64>,
    pub reply_count: Option<i64>,
    pub retweet_count: Option<i64>,
    pub favorite_count: Option<i64>,
    pub created_at: Option<String>,
}

/// Row counts reported by `--stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    pub users: u64,
    pub profiled_users: u64,
    pub statuses: u64,
    pub follows: u64,
}
