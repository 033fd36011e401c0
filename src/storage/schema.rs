//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Sociograph database.

use rusqlite::Connection;

/// Bumped whenever the table layout changes
pub const SCHEMA_VERSION: u32 = 1;

/// Tables that must exist for the crawler to run
pub const REQUIRED_TABLES: [&str; 3] = ["users", "statuses", "follows"];

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Profiles, keyed by the remote API's numeric id. Rows may start as
-- id-only placeholders and are filled in once the profile is fetched.
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    screen_name TEXT,
    name TEXT,
    description TEXT,
    location TEXT,
    url TEXT,
    protected INTEGER,
    verified INTEGER,
    friends_count INTEGER,
    followers_count INTEGER,
    listed_count INTEGER,
    statuses_count INTEGER,
    favourites_count INTEGER,
    created_at TEXT,
    profile_crawled_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_users_screen_name ON users(screen_name COLLATE NOCASE);

-- Posted statuses. Replies keep the parent id even when the parent was
-- never crawled, so there is no constraint on in_reply_to_status_id.
CREATE TABLE IF NOT EXISTS statuses (
    id INTEGER PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    text TEXT,
    in_reply_to_status_id INTEGER,
    quote_count INTEGER,
    reply_count INTEGER,
    retweet_count INTEGER,
    favorite_count INTEGER,
    created_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_statuses_user ON statuses(user_id);
CREATE INDEX IF NOT EXISTS idx_statuses_reply ON statuses(in_reply_to_status_id);

-- Follow edges: follower_id follows followee_id
CREATE TABLE IF NOT EXISTS follows (
    followee_id INTEGER NOT NULL REFERENCES users(id),
    follower_id INTEGER NOT NULL REFERENCES users(id),
    PRIMARY KEY (followee_id, follower_id)
);

CREATE INDEX IF NOT EXISTS idx_follows_follower ON follows(follower_id);
"#;

/// Initializes the database schema
///
/// Safe to run against an already initialized database.
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}

/// Checks whether every required table exists
pub fn is_initialized(conn: &Connection) -> Result<bool, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1")?;

    for table in REQUIRED_TABLES {
        let count: i64 = stmt.query_row([table], |row| row.get(0))?;
        if count != 1 {
            return Ok(false);
        }
    }

    Ok(true)
}

/// Reads the schema version recorded in the database
pub fn get_schema_version(conn: &Connection) -> Result<u32, rusqlite::Error> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
}
