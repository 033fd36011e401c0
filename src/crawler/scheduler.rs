//! Top-level scheduler owning one crawler unit per stage
//!
//! This module handles:
//! - Constructing the profile, relationship and status units
//! - Wiring the relationships → profiles fan-out edge
//! - Seeding units at startup
//! - Running every unit on its own task until cancellation

use crate::api::RemoteApi;
use crate::config::{CrawlerConfig, SeedConfig};
use crate::crawler::backoff::BackoffPolicy;
use crate::crawler::job::{ProfileJob, ScreenNameJob};
use crate::crawler::stages::{ProfileStage, RelationshipStage, StatusStage};
use crate::crawler::unit::{spawn_unit, CrawlerUnit, UnitStats};
use crate::storage::SqliteStorage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timing and batching knobs for the units
#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub backoff: BackoffPolicy,
    pub idle_delay: Duration,
    pub lookup_batch_size: usize,
}

impl From<&CrawlerConfig> for SchedulerOptions {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            backoff: BackoffPolicy::new(config.cooldown()),
            idle_delay: config.idle_delay(),
            lookup_batch_size: config.lookup_batch_size,
        }
    }
}

/// Owns every crawler unit
///
/// The only cross-unit edge is relationships → profiles: the relationship
/// stage holds a handle to the profile unit's queue.
pub struct Scheduler {
    profiles: Arc<CrawlerUnit<ProfileStage>>,
    relationships: Arc<CrawlerUnit<RelationshipStage>>,
    statuses: Arc<CrawlerUnit<StatusStage>>,
}

impl Scheduler {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Arc<SqliteStorage>,
        options: SchedulerOptions,
    ) -> Self {
        let profiles = Arc::new(CrawlerUnit::new(
            ProfileStage::new(Arc::clone(&api), Arc::clone(&storage)),
            options.backoff,
            options.idle_delay,
        ));

        let relationships = Arc::new(CrawlerUnit::new(
            RelationshipStage::new(
                Arc::clone(&api),
                Arc::clone(&storage),
                profiles.queue().clone(),
                options.lookup_batch_size,
            ),
            options.backoff,
            options.idle_delay,
        ));

        let statuses = Arc::new(CrawlerUnit::new(
            StatusStage::new(api, storage),
            options.backoff,
            options.idle_delay,
        ));

        Self {
            profiles,
            relationships,
            statuses,
        }
    }

    pub fn profiles(&self) -> &CrawlerUnit<ProfileStage> {
        &self.profiles
    }

    pub fn relationships(&self) -> &CrawlerUnit<RelationshipStage> {
        &self.relationships
    }

    pub fn statuses(&self) -> &CrawlerUnit<StatusStage> {
        &self.statuses
    }

    /// Pre-schedules the configured screen names on each unit
    pub fn seed(&self, seeds: &SeedConfig) {
        for name in &seeds.profiles {
            self.profiles
                .schedule(ProfileJob::ScreenName(ScreenNameJob::new(name)));
        }
        for name in &seeds.relationships {
            self.relationships.schedule(ScreenNameJob::new(name));
        }
        for name in &seeds.statuses {
            self.statuses.schedule(ScreenNameJob::new(name));
        }

        tracing::info!(
            profiles = seeds.profiles.len(),
            relationships = seeds.relationships.len(),
            statuses = seeds.statuses.len(),
            "Seeded units"
        );
    }

    /// Runs all units concurrently until `cancel` fires
    ///
    /// Each unit gets its own task, so a unit cooling down after a quota
    /// exhaustion never holds up the others.
    pub async fn run(&self, cancel: CancellationToken) {
        let profiles = spawn_unit(Arc::clone(&self.profiles), cancel.clone());
        let relationships = spawn_unit(Arc::clone(&self.relationships), cancel.clone());
        let statuses = spawn_unit(Arc::clone(&self.statuses), cancel);

        let (p, r, s) = tokio::join!(profiles, relationships, statuses);

        for (name, result) in [
            (self.profiles.name(), p),
            (self.relationships.name(), r),
            (self.statuses.name(), s),
        ] {
            if let Err(e) = result {
                tracing::error!(unit = name, "Unit task failed: {}", e);
            }
        }
    }

    /// Counters per unit, in profiles, relationships, statuses order
    pub fn stats(&self) -> [(&'static str, UnitStats); 3] {
        [
            (self.profiles.name(), self.profiles.stats()),
            (self.relationships.name(), self.relationships.stats()),
            (self.statuses.name(), self.statuses.stats()),
        ]
    }
}
