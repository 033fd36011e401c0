use crate::api::RemoteApi;
use crate::crawler::job::{ProfileJob, ScreenNameJob, UserIdBatchJob};
use crate::crawler::unit::Stage;
use crate::storage::{SqliteStorage, StorageResult, UpsertOutcome};
use crate::ExecError;
use async_trait::async_trait;
use std::sync::Arc;

/// Fetches profiles and upserts them into `users`
pub struct ProfileStage {
    api: Arc<dyn RemoteApi>,
    storage: Arc<SqliteStorage>,
}

impl ProfileStage {
    pub fn new(api: Arc<dyn RemoteApi>, storage: Arc<SqliteStorage>) -> Self {
        Self { api, storage }
    }

    async fn crawl_screen_name(&self, job: &ScreenNameJob) -> Result<(), ExecError> {
        let profile = self.api.fetch_profile(&job.name).await?;
        let outcome = self
            .storage
            .with_transaction(|uow| uow.upsert_user(&profile))?;

        tracing::info!(
            unit = self.name(),
            user_id = profile.id,
            "{:?} profile of @{}",
            outcome,
            profile.screen_name
        );
        Ok(())
    }

    async fn crawl_batch(&self, job: &UserIdBatchJob) -> Result<(), ExecError> {
        let profiles = self.api.fetch_profiles(job.ids()).await?;

        let (created, updated) = self.storage.with_transaction(|uow| {
            profiles.iter().try_fold(
                (0usize, 0usize),
                |(c, u), profile| -> StorageResult<(usize, usize)> {
                    Ok(match uow.upsert_user(profile)? {
                        UpsertOutcome::Created => (c + 1, u),
                        UpsertOutcome::Updated => (c, u + 1),
                    })
                },
            )
        })?;

        let missing = job.len().saturating_sub(profiles.len());
        if missing > 0 {
            // Suspended or deleted accounts are omitted by the lookup endpoint.
            tracing::debug!(unit = self.name(), "{} of {} unresolved", missing, job);
        }

        tracing::info!(
            unit = self.name(),
            created,
            updated,
            "Stored profiles for {}",
            job
        );
        Ok(())
    }
}

#[async_trait]
impl Stage for ProfileStage {
    type Job = ProfileJob;

    fn name(&self) -> &'static str {
        "profiles"
    }

    async fn exec(&self, job: &mut ProfileJob) -> Result<(), ExecError> {
        match job {
            ProfileJob::ScreenName(job) => self.crawl_screen_name(job).await,
            ProfileJob::UserIds(job) => self.crawl_batch(job).await,
        }
    }
}
