//! Remote API boundary
//!
//! The crawler stages only see the [`RemoteApi`] trait; [`TwitterClient`] is
//! the HTTP implementation used by the binary, and tests substitute fakes.

mod model;
mod twitter;

pub use model::{
    parse_created_at, FriendIdsPage, Profile, TokenResponse, Tweet, TweetAuthor,
    CREATED_AT_FORMAT, FIRST_CURSOR,
};
pub use twitter::{build_http_client, TwitterClient};

use crate::ApiResult;
use async_trait::async_trait;

/// Operations the crawler needs from the remote API
///
/// Every method may fail with [`crate::ApiError::QuotaExceeded`] when the
/// endpoint's rate-limit window is exhausted, or with any other
/// [`crate::ApiError`] for non-quota failures.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Fetches one profile by screen name
    async fn fetch_profile(&self, screen_name: &str) -> ApiResult<Profile>;

    /// Fetches up to 100 profiles by numeric id
    ///
    /// Ids the API cannot resolve are silently absent from the result.
    async fn fetch_profiles(&self, ids: &[i64]) -> ApiResult<Vec<Profile>>;

    /// Fetches one page of the ids of accounts the given user follows
    ///
    /// Start with [`FIRST_CURSOR`] and pass each page's `next_cursor` on
    /// until it is 0.
    async fn fetch_friend_ids_page(
        &self,
        screen_name: &str,
        cursor: i64,
    ) -> ApiResult<FriendIdsPage>;

    /// Fetches the ids of every account the given user follows
    ///
    /// A failure on any page discards the pages already fetched; callers
    /// that must survive quota exhaustion walk the pages themselves.
    async fn fetch_friend_ids(&self, screen_name: &str) -> ApiResult<Vec<i64>> {
        let mut ids = Vec::new();
        let mut cursor = FIRST_CURSOR;

        loop {
            let page = self.fetch_friend_ids_page(screen_name, cursor).await?;
            ids.extend(page.ids);

            if page.next_cursor == 0 {
                return Ok(ids);
            }
            cursor = page.next_cursor;
        }
    }

    /// Fetches the most recent statuses posted by the given user
    async fn fetch_statuses(&self, screen_name: &str) -> ApiResult<Vec<Tweet>>;
}
