//! SQLite storage implementation
//!
//! [`SqliteStorage`] owns the connection; all writes go through
//! [`SqliteStorage::with_transaction`], which hands the caller a
//! [`UnitOfWork`] bound to one transaction.

use crate::api::{Profile, Tweet};
use crate::storage::error::{StorageError, StorageResult};
use crate::storage::schema::{initialize_schema, is_initialized};
use crate::storage::{StatusRecord, StorageStats, UpsertOutcome, UserRecord};
use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const USER_COLUMNS: &str = "id, screen_name, name, description, location, url, protected, verified,
     friends_count, followers_count, listed_count, statuses_count, favourites_count,
     created_at, profile_crawled_at";

const STATUS_COLUMNS: &str = "id, user_id, text, in_reply_to_status_id, quote_count, reply_count,
     retweet_count, favorite_count, created_at";

/// SQLite storage backend
///
/// The connection sits behind a mutex so every crawler unit can share one
/// `Arc<SqliteStorage>`; each transaction holds the lock for its duration,
/// which serializes units of work from different units.
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Opens an existing, initialized database
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Database opened and schema present
    /// * `Err(StorageError::SchemaMissing)` - Database has not been initialized
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        configure(&conn)?;

        if !is_initialized(&conn)? {
            return Err(StorageError::SchemaMissing(path.display().to_string()));
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates the database file (and its parent directory) and the schema
    pub fn create(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        configure(&conn)?;
        initialize_schema(&conn)?;

        tracing::info!("Initialized database schema at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an initialized in-memory database
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Database("connection lock poisoned".to_string()))
    }

    /// Runs `f` inside one transaction
    ///
    /// Commits when `f` returns `Ok`, rolls back when it returns `Err`.
    pub fn with_transaction<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&UnitOfWork<'_>) -> StorageResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let result = f(&UnitOfWork { tx: &tx });

        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Rollback failed after {}: {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Gets a user by id
    pub fn get_user(&self, id: i64) -> StorageResult<Option<UserRecord>> {
        let conn = self.lock()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Gets a status by id
    pub fn get_status(&self, id: i64) -> StorageResult<Option<StatusRecord>> {
        let conn = self.lock()?;
        let status = conn
            .query_row(
                &format!("SELECT {} FROM statuses WHERE id = ?1", STATUS_COLUMNS),
                params![id],
                status_from_row,
            )
            .optional()?;
        Ok(status)
    }

    /// Gets the ids of every account `follower_id` follows, ascending
    pub fn followees_of(&self, follower_id: i64) -> StorageResult<Vec<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT followee_id FROM follows WHERE follower_id = ?1 ORDER BY followee_id",
        )?;
        let ids = stmt
            .query_map(params![follower_id], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn count_users(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM users")
    }

    pub fn count_statuses(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM statuses")
    }

    pub fn count_follows(&self) -> StorageResult<u64> {
        self.count("SELECT COUNT(*) FROM follows")
    }

    /// Collects row counts for the `--stats` report
    pub fn stats(&self) -> StorageResult<StorageStats> {
        Ok(StorageStats {
            users: self.count_users()?,
            profiled_users: self
                .count("SELECT COUNT(*) FROM users WHERE profile_crawled_at IS NOT NULL")?,
            statuses: self.count_statuses()?,
            follows: self.count_follows()?,
        })
    }

    fn count(&self, sql: &str) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn configure(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA temp_store = MEMORY;
    ",
    )?;
    Ok(())
}

/// Writes scoped to one transaction
pub struct UnitOfWork<'a> {
    tx: &'a Transaction<'a>,
}

impl UnitOfWork<'_> {
    /// Creates or overwrites a user from a fetched profile
    ///
    /// The existence check and the write run in the same transaction, so two
    /// jobs carrying the same id can never produce two rows.
    pub fn upsert_user(&self, profile: &Profile) -> StorageResult<UpsertOutcome> {
        // Fixed-width so crawl times order correctly as text.
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false);
        let created_at = profile.created_at.to_rfc3339();

        let outcome = if self.user_exists(profile.id)? {
            self.tx.execute(
                "UPDATE users SET screen_name = ?2, name = ?3, description = ?4, location = ?5,
                 url = ?6, protected = ?7, verified = ?8, friends_count = ?9,
                 followers_count = ?10, listed_count = ?11, statuses_count = ?12,
                 favourites_count = ?13, created_at = ?14, profile_crawled_at = ?15
                 WHERE id = ?1",
                params![
                    profile.id,
                    profile.screen_name,
                    profile.name,
                    profile.description,
                    profile.location,
                    profile.url,
                    profile.protected,
                    profile.verified,
                    profile.friends_count,
                    profile.followers_count,
                    profile.listed_count,
                    profile.statuses_count,
                    profile.favourites_count,
                    created_at,
                    now
                ],
            )?;
            UpsertOutcome::Updated
        } else {
            self.tx.execute(
                &format!(
                    "INSERT INTO users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                    USER_COLUMNS
                ),
                params![
                    profile.id,
                    profile.screen_name,
                    profile.name,
                    profile.description,
                    profile.location,
                    profile.url,
                    profile.protected,
                    profile.verified,
                    profile.friends_count,
                    profile.followers_count,
                    profile.listed_count,
                    profile.statuses_count,
                    profile.favourites_count,
                    created_at,
                    now
                ],
            )?;
            UpsertOutcome::Created
        };

        Ok(outcome)
    }

    /// Inserts an id-only placeholder row unless the user already exists
    ///
    /// Returns true when a placeholder was created.
    pub fn ensure_user(&self, id: i64) -> StorageResult<bool> {
        let inserted = self
            .tx
            .execute("INSERT OR IGNORE INTO users (id) VALUES (?1)", params![id])?;
        Ok(inserted > 0)
    }

    /// Records that `follower_id` follows `followee_id`
    ///
    /// Both users must exist. Returns true when the edge is new.
    pub fn record_follow(&self, followee_id: i64, follower_id: i64) -> StorageResult<bool> {
        let inserted = self.tx.execute(
            "INSERT OR IGNORE INTO follows (followee_id, follower_id) VALUES (?1, ?2)",
            params![followee_id, follower_id],
        )?;
        Ok(inserted > 0)
    }

    /// Creates or overwrites a status, creating a placeholder author if needed
    pub fn upsert_status(&self, tweet: &Tweet) -> StorageResult<UpsertOutcome> {
        self.ensure_user(tweet.user.id)?;

        let created_at = tweet.created_at.to_rfc3339();
        let exists = self
            .tx
            .query_row(
                "SELECT 1 FROM statuses WHERE id = ?1",
                params![tweet.id],
                |_| Ok(()),
            )
            .optional()?
            .is_some();

        if exists {
            self.tx.execute(
                "UPDATE statuses SET user_id = ?2, text = ?3, in_reply_to_status_id = ?4,
                 quote_count = ?5, reply_count = ?6, retweet_count = ?7, favorite_count = ?8,
                 created_at = ?9 WHERE id = ?1",
                params![
                    tweet.id,
                    tweet.user.id,
                    tweet.text,
                    tweet.in_reply_to_status_id,
                    tweet.quote_count,
                    tweet.reply_count,
                    tweet.retweet_count,
                    tweet.favorite_count,
                    created_at
                ],
            )?;
            Ok(UpsertOutcome::Updated)
        } else {
            self.tx.execute(
                &format!(
                    "INSERT INTO statuses ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    STATUS_COLUMNS
                ),
                params![
                    tweet.id,
                    tweet.user.id,
                    tweet.text,
                    tweet.in_reply_to_status_id,
                    tweet.quote_count,
                    tweet.reply_count,
                    tweet.retweet_count,
                    tweet.favorite_count,
                    created_at
                ],
            )?;
            Ok(UpsertOutcome::Created)
        }
    }

    /// Looks up a stored user id by screen name, ignoring case
    ///
    /// Handles get renamed and reused, so several rows may carry the same
    /// one. The most recently crawled profile owns it.
    pub fn find_user_id(&self, screen_name: &str) -> StorageResult<Option<i64>> {
        let bare = screen_name.trim().trim_start_matches('@');
        let id = self
            .tx
            .query_row(
                "SELECT id FROM users WHERE screen_name = ?1 COLLATE NOCASE
                 ORDER BY profile_crawled_at DESC, id DESC LIMIT 1",
                params![bare],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn user_exists(&self, id: i64) -> StorageResult<bool> {
        let found = self
            .tx
            .query_row("SELECT 1 FROM users WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?;
        Ok(found.is_some())
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        screen_name: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        url: row.get(5)?,
        protected: row.get(6)?,
        verified: row.get(7)?,
        friends_count: row.get(8)?,
        followers_count: row.get(9)?,
        listed_count: row.get(10)?,
        statuses_count: row.get(11)?,
        favourites_count: row.get(12)?,
        created_at: row.get(13)?,
        profile_crawled_at: row.get(14)?,
    })
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<StatusRecord> {
    Ok(StatusRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        text: row.get(2)?,
        in_reply_to_status_id: row.get(3)?,
        quote_count: row.get(4)?,
        reply_count: row.get(5)?,
        retweet_count: row.get(6)?,
        favorite_count: row.get(7)?,
        created_at: row.get(8)?,
    })
}
