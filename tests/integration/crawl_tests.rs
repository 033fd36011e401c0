//! Integration tests for the crawl scheduler
//!
//! These tests drive the real units, stages and SQLite storage against a
//! scripted in-process API, covering quota backoff, isolation between units
//! and the relationships → profiles fan-out.

use async_trait::async_trait;
use sociograph::api::{parse_created_at, FriendIdsPage, Profile, RemoteApi, Tweet, TweetAuthor};
use sociograph::config::SeedConfig;
use sociograph::crawler::{
    BackoffPolicy, JobQueue, ProfileJob, ProfileStage, RelationshipJob, RelationshipStage,
    ScreenNameJob, Scheduler, SchedulerOptions, Stage, StatusStage, UnitStatus,
};
use sociograph::storage::SqliteStorage;
use sociograph::{ApiError, ApiResult};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Remaining failures that never run out
const FOREVER: u32 = u32::MAX;

/// Scripted stand-in for the remote API
#[derive(Default)]
struct FakeApi {
    by_name: Mutex<HashMap<String, Profile>>,
    by_id: HashMap<i64, Profile>,
    friends: HashMap<String, Vec<i64>>,
    timelines: HashMap<String, Vec<Tweet>>,
    /// "endpoint:argument" -> number of quota errors still to raise
    quota: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    fn with_profile(self, profile: Profile) -> Self {
        self.by_name
            .lock()
            .unwrap()
            .insert(profile.screen_name.to_lowercase(), profile);
        self
    }

    fn with_quota(self, key: &str, failures: u32) -> Self {
        self.quota.lock().unwrap().insert(key.to_string(), failures);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn call(&self, key: String) -> ApiResult<()> {
        self.calls.lock().unwrap().push(key.clone());

        let mut quota = self.quota.lock().unwrap();
        if let Some(remaining) = quota.get_mut(&key) {
            if *remaining > 0 {
                if *remaining != FOREVER {
                    *remaining -= 1;
                }
                return Err(ApiError::QuotaExceeded {
                    endpoint: key,
                    reset_at: None,
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for FakeApi {
    async fn fetch_profile(&self, screen_name: &str) -> ApiResult<Profile> {
        self.call(format!("users/show:{}", screen_name))?;
        self.by_name
            .lock()
            .unwrap()
            .get(&screen_name.to_lowercase())
            .cloned()
            .ok_or_else(|| ApiError::Status {
                endpoint: "users/show".to_string(),
                status: 404,
                body: "User not found.".to_string(),
            })
    }

    async fn fetch_profiles(&self, ids: &[i64]) -> ApiResult<Vec<Profile>> {
        self.call(format!("users/lookup:{}", ids.len()))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect())
    }

    async fn fetch_friend_ids_page(
        &self,
        screen_name: &str,
        _cursor: i64,
    ) -> ApiResult<FriendIdsPage> {
        self.call(format!("friends/ids:{}", screen_name))?;
        Ok(FriendIdsPage {
            ids: self.friends.get(screen_name).cloned().unwrap_or_default(),
            next_cursor: 0,
        })
    }

    async fn fetch_statuses(&self, screen_name: &str) -> ApiResult<Vec<Tweet>> {
        self.call(format!("statuses/user_timeline:{}", screen_name))?;
        Ok(self.timelines.get(screen_name).cloned().unwrap_or_default())
    }
}

fn profile(id: i64, screen_name: &str) -> Profile {
    Profile {
        id,
        screen_name: screen_name.to_string(),
        name: format!("{} name", screen_name),
        description: Some(format!("about {}", screen_name)),
        location: Some("Earth".to_string()),
        url: Some(format!("https://example.com/{}", screen_name)),
        protected: false,
        verified: true,
        friends_count: 11,
        followers_count: 22,
        listed_count: 3,
        statuses_count: 44,
        favourites_count: 5,
        created_at: parse_created_at("Tue Mar 21 20:50:14 +0000 2006").unwrap(),
    }
}

fn tweet(id: i64, user_id: i64, reply_to: Option<i64>) -> Tweet {
    Tweet {
        id,
        text: format!("status {}", id),
        user: TweetAuthor { id: user_id },
        in_reply_to_status_id: reply_to,
        quote_count: Some(0),
        reply_count: Some(1),
        retweet_count: 2,
        favorite_count: 3,
        created_at: parse_created_at("Wed Oct 10 20:19:24 +0000 2018").unwrap(),
    }
}

fn options(cooldown: Duration) -> SchedulerOptions {
    SchedulerOptions {
        backoff: BackoffPolicy::new(cooldown),
        idle_delay: Duration::from_millis(20),
        lookup_batch_size: 100,
    }
}

fn storage() -> Arc<SqliteStorage> {
    Arc::new(SqliteStorage::open_in_memory().expect("in-memory storage"))
}

/// Runs the scheduler until `done` holds or `limit` elapses
///
/// Returns whether `done` was reached.
async fn run_until<F: Fn() -> bool>(scheduler: &Scheduler, limit: Duration, done: F) -> bool {
    let cancel = CancellationToken::new();

    let watcher = async {
        let reached = tokio::time::timeout(limit, async {
            while !done() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok();
        cancel.cancel();
        reached
    };

    let ((), reached) = tokio::join!(scheduler.run(cancel.clone()), watcher);
    reached
}

#[tokio::test]
async fn test_seeded_profile_is_stored() {
    let api = Arc::new(FakeApi::default().with_profile(profile(1, "alice")));
    let storage = storage();
    let scheduler = Scheduler::new(api.clone(), storage.clone(), options(Duration::from_secs(900)));

    scheduler.seed(&SeedConfig {
        profiles: vec!["alice".to_string()],
        ..Default::default()
    });

    let reached = run_until(&scheduler, Duration::from_secs(5), || {
        scheduler.profiles().stats().completed == 1
    })
    .await;
    assert!(reached, "profile job should complete");

    assert_eq!(storage.count_users().unwrap(), 1);
    assert!(scheduler.profiles().queue().is_empty());

    let user = storage.get_user(1).unwrap().expect("alice stored");
    assert_eq!(user.screen_name.as_deref(), Some("alice"));
    assert_eq!(user.name.as_deref(), Some("alice name"));
    assert_eq!(user.description.as_deref(), Some("about alice"));
    assert_eq!(user.location.as_deref(), Some("Earth"));
    assert_eq!(user.url.as_deref(), Some("https://example.com/alice"));
    assert_eq!(user.protected, Some(false));
    assert_eq!(user.verified, Some(true));
    assert_eq!(user.friends_count, Some(11));
    assert_eq!(user.followers_count, Some(22));
    assert_eq!(user.listed_count, Some(3));
    assert_eq!(user.statuses_count, Some(44));
    assert_eq!(user.favourites_count, Some(5));
    assert_eq!(user.created_at.as_deref(), Some("2006-03-21T20:50:14+00:00"));
    assert!(user.is_profiled());
}

#[tokio::test(start_paused = true)]
async fn test_quota_exhaustion_retries_after_cool_down() {
    let api = Arc::new(
        FakeApi::default()
            .with_profile(profile(2, "bob"))
            .with_quota("users/show:bob", 1),
    );
    let storage = storage();
    let cooldown = Duration::from_secs(900);
    let scheduler = Scheduler::new(api.clone(), storage.clone(), options(cooldown));

    scheduler.seed(&SeedConfig {
        profiles: vec!["bob".to_string()],
        ..Default::default()
    });

    let start = tokio::time::Instant::now();
    let reached = run_until(&scheduler, Duration::from_secs(2 * 3600), || {
        scheduler.profiles().stats().completed == 1
    })
    .await;
    assert!(reached, "bob should be stored after the cool-down");

    assert!(start.elapsed() >= cooldown);
    assert_eq!(storage.count_users().unwrap(), 1);
    assert!(storage.get_user(2).unwrap().is_some());
    assert_eq!(scheduler.profiles().stats().deferred, 1);
    assert_eq!(
        api.calls(),
        vec!["users/show:bob".to_string(), "users/show:bob".to_string()]
    );
}

#[tokio::test]
async fn test_backoff_in_one_unit_does_not_block_others() {
    let api = Arc::new(
        FakeApi::default()
            .with_profile(profile(1, "alice"))
            .with_profile(profile(2, "bob"))
            .with_quota("friends/ids:carol", FOREVER),
    );
    let storage = storage();
    let scheduler = Scheduler::new(api.clone(), storage.clone(), options(Duration::from_secs(3600)));

    scheduler.seed(&SeedConfig {
        relationships: vec!["carol".to_string()],
        ..Default::default()
    });

    let mut status = scheduler.relationships().watch_status();
    let cancel = CancellationToken::new();

    let checks = async {
        tokio::time::timeout(
            Duration::from_secs(5),
            status.wait_for(|s| *s == UnitStatus::Backoff),
        )
        .await
        .expect("relationship unit should back off")
        .unwrap();

        // Profile work scheduled while the sibling is cooling down still runs.
        scheduler
            .profiles()
            .schedule(ProfileJob::ScreenName(ScreenNameJob::new("alice")));
        scheduler
            .profiles()
            .schedule(ProfileJob::ScreenName(ScreenNameJob::new("bob")));

        tokio::time::timeout(Duration::from_secs(5), async {
            while scheduler.profiles().stats().completed < 2 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("profile unit should make progress during sibling backoff");

        assert_eq!(scheduler.relationships().status(), UnitStatus::Backoff);
        assert_eq!(
            scheduler.relationships().queue().snapshot(),
            vec![RelationshipJob::from(ScreenNameJob::new("carol"))]
        );
        cancel.cancel();
    };

    tokio::join!(scheduler.run(cancel.clone()), checks);

    assert_eq!(storage.count_users().unwrap(), 2);
    assert_eq!(scheduler.relationships().stats().completed, 0);
}

#[tokio::test]
async fn test_relationships_fan_out_into_profile_batches() {
    let friend_ids: Vec<i64> = (1000..1250).collect();
    let api = Arc::new(FakeApi {
        friends: HashMap::from([("alice".to_string(), friend_ids.clone())]),
        by_id: friend_ids
            .iter()
            .map(|&id| (id, profile(id, &format!("user{}", id))))
            .collect(),
        ..Default::default()
    });
    let storage = storage();

    storage
        .with_transaction(|uow| uow.upsert_user(&profile(1, "alice")))
        .unwrap();

    let scheduler = Scheduler::new(api.clone(), storage.clone(), options(Duration::from_secs(900)));
    scheduler.seed(&SeedConfig {
        relationships: vec!["alice".to_string()],
        ..Default::default()
    });

    let reached = run_until(&scheduler, Duration::from_secs(5), || {
        scheduler.profiles().stats().completed == 3
    })
    .await;
    assert!(reached, "three profile batches should complete");

    let lookups: Vec<String> = api
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("users/lookup"))
        .collect();
    assert_eq!(
        lookups,
        vec!["users/lookup:100", "users/lookup:100", "users/lookup:50"]
    );

    assert_eq!(storage.count_users().unwrap(), 251);
    assert_eq!(storage.count_follows().unwrap(), 250);
    assert_eq!(storage.followees_of(1).unwrap(), friend_ids);
    assert!(storage.get_user(1249).unwrap().unwrap().is_profiled());
}

#[tokio::test]
async fn test_relationship_batches_preserve_order() {
    let friend_ids: Vec<i64> = (0..431).rev().collect();
    let api: Arc<dyn RemoteApi> = Arc::new(FakeApi {
        friends: HashMap::from([("dave".to_string(), friend_ids.clone())]),
        ..Default::default()
    });
    let profiles: JobQueue<ProfileJob> = JobQueue::new();
    let stage = RelationshipStage::new(api, storage(), profiles.clone(), 100);

    stage
        .exec(&mut RelationshipJob::from(ScreenNameJob::new("dave")))
        .await
        .unwrap();

    let batches: Vec<Vec<i64>> = profiles
        .snapshot()
        .into_iter()
        .map(|job| match job {
            ProfileJob::UserIds(batch) => batch.ids().to_vec(),
            other => panic!("unexpected job {:?}", other),
        })
        .collect();

    assert_eq!(batches.len(), 5);
    assert!(batches.iter().all(|b| b.len() <= 100));
    assert_eq!(batches.concat(), friend_ids);
}

#[tokio::test]
async fn test_unknown_source_skips_follow_edges() {
    let api: Arc<dyn RemoteApi> = Arc::new(FakeApi {
        friends: HashMap::from([("erin".to_string(), vec![5, 6, 7])]),
        ..Default::default()
    });
    let storage = storage();
    let profiles: JobQueue<ProfileJob> = JobQueue::new();
    let stage = RelationshipStage::new(api, storage.clone(), profiles.clone(), 100);

    stage
        .exec(&mut RelationshipJob::from(ScreenNameJob::new("erin")))
        .await
        .unwrap();

    assert_eq!(storage.count_follows().unwrap(), 0);
    assert_eq!(storage.count_users().unwrap(), 0);
    assert_eq!(profiles.len(), 1);
}

#[tokio::test]
async fn test_reused_handle_edges_go_to_current_owner() {
    let api: Arc<dyn RemoteApi> = Arc::new(FakeApi {
        friends: HashMap::from([("alice".to_string(), vec![900])]),
        ..Default::default()
    });
    let storage = storage();

    // Account 1 held the handle first; account 2 took it over later.
    storage
        .with_transaction(|uow| uow.upsert_user(&profile(1, "alice")))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    storage
        .with_transaction(|uow| uow.upsert_user(&profile(2, "Alice")))
        .unwrap();

    let stage = RelationshipStage::new(api, storage.clone(), JobQueue::new(), 100);
    stage
        .exec(&mut RelationshipJob::from(ScreenNameJob::new("alice")))
        .await
        .unwrap();

    assert_eq!(storage.followees_of(2).unwrap(), vec![900]);
    assert!(storage.followees_of(1).unwrap().is_empty());
}

#[tokio::test]
async fn test_refetching_profile_overwrites_fields() {
    let api = Arc::new(FakeApi::default().with_profile(profile(1, "alice")));
    let storage = storage();
    let stage = ProfileStage::new(api.clone(), storage.clone());
    let job = ProfileJob::ScreenName(ScreenNameJob::new("alice"));

    stage.exec(&mut job.clone()).await.unwrap();

    let mut changed = profile(1, "alice");
    changed.followers_count = 9_999;
    changed.description = None;
    api.by_name
        .lock()
        .unwrap()
        .insert("alice".to_string(), changed);

    stage.exec(&mut job.clone()).await.unwrap();

    assert_eq!(storage.count_users().unwrap(), 1);
    let user = storage.get_user(1).unwrap().unwrap();
    assert_eq!(user.followers_count, Some(9_999));
    assert_eq!(user.description, None);
}

#[tokio::test]
async fn test_missing_profile_is_dropped_not_retried() {
    let api = Arc::new(FakeApi::default());
    let storage = storage();
    let scheduler = Scheduler::new(api.clone(), storage.clone(), options(Duration::from_secs(900)));

    scheduler.seed(&SeedConfig {
        profiles: vec!["ghost".to_string()],
        ..Default::default()
    });

    let reached = run_until(&scheduler, Duration::from_secs(5), || {
        scheduler.profiles().stats().dropped == 1
    })
    .await;
    assert!(reached);

    assert_eq!(api.calls(), vec!["users/show:ghost".to_string()]);
    assert!(scheduler.profiles().queue().is_empty());
    assert_eq!(storage.count_users().unwrap(), 0);
}

#[tokio::test]
async fn test_status_stage_stores_timeline() {
    let api: Arc<dyn RemoteApi> = Arc::new(FakeApi {
        timelines: HashMap::from([(
            "frank".to_string(),
            vec![tweet(501, 8, None), tweet(502, 8, Some(400))],
        )]),
        ..Default::default()
    });
    let storage = storage();
    let stage = StatusStage::new(api, storage.clone());

    stage.exec(&mut ScreenNameJob::new("frank")).await.unwrap();
    stage.exec(&mut ScreenNameJob::new("frank")).await.unwrap();

    assert_eq!(storage.count_statuses().unwrap(), 2);
    assert_eq!(storage.count_users().unwrap(), 1);

    let reply = storage.get_status(502).unwrap().unwrap();
    assert_eq!(reply.user_id, 8);
    assert_eq!(reply.in_reply_to_status_id, Some(400));
    assert_eq!(reply.text.as_deref(), Some("status 502"));
}
