//! Crawler module: the multi-queue crawl scheduler
//!
//! This module contains the core crawling logic, including:
//! - Unbounded FIFO job queues, one per crawler unit
//! - The crawler unit protocol (exec, idle, quota backoff)
//! - The profile, relationship and status stages
//! - The scheduler that runs every unit concurrently

mod backoff;
mod job;
mod queue;
mod scheduler;
mod stages;
mod unit;

pub use backoff::BackoffPolicy;
pub use job::{partition_ids, ProfileJob, RelationshipJob, ScreenNameJob, UserIdBatchJob};
pub use queue::JobQueue;
pub use scheduler::{Scheduler, SchedulerOptions};
pub use stages::{ProfileStage, RelationshipStage, StatusStage};
pub use unit::{spawn_unit, CrawlerUnit, Stage, Turn, UnitStats, UnitStatus};

use crate::api::RemoteApi;
use crate::config::Config;
use crate::storage::SqliteStorage;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl until `cancel` fires
///
/// Builds the scheduler from `config`, seeds it with the configured screen
/// names plus `extra_profiles`, and drives every unit.
///
/// # Example
///
/// ```no_run
/// use sociograph::config::load_config;
/// use sociograph::crawler::crawl;
/// use sociograph::{SqliteStorage, TwitterClient};
/// use std::path::Path;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("sociograph.toml"))?;
/// let storage = Arc::new(SqliteStorage::open(Path::new(&config.output.database_path))?);
/// let api = Arc::new(TwitterClient::new(&config)?);
/// crawl(&config, api, storage, &[], CancellationToken::new()).await;
/// # Ok(())
/// # }
/// ```
pub async fn crawl(
    config: &Config,
    api: Arc<dyn RemoteApi>,
    storage: Arc<SqliteStorage>,
    extra_profiles: &[String],
    cancel: CancellationToken,
) {
    let scheduler = Scheduler::new(api, storage, SchedulerOptions::from(&config.crawler));

    let mut seeds = config.seeds.clone();
    seeds.profiles.extend(extra_profiles.iter().cloned());
    scheduler.seed(&seeds);

    scheduler.run(cancel).await;

    for (unit, stats) in scheduler.stats() {
        tracing::info!(
            unit,
            completed = stats.completed,
            deferred = stats.deferred,
            dropped = stats.dropped,
            "Final unit statistics"
        );
    }
}
