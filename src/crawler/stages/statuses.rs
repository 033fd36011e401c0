use crate::api::RemoteApi;
use crate::crawler::job::ScreenNameJob;
use crate::crawler::unit::Stage;
use crate::storage::{SqliteStorage, StorageResult, UpsertOutcome};
use crate::ExecError;
use async_trait::async_trait;
use std::sync::Arc;

/// Fetches a user's recent timeline and upserts every status
///
/// Only seeds feed this stage; no other unit produces content jobs.
pub struct StatusStage {
    api: Arc<dyn RemoteApi>,
    storage: Arc<SqliteStorage>,
}

impl StatusStage {
    pub fn new(api: Arc<dyn RemoteApi>, storage: Arc<SqliteStorage>) -> Self {
        Self { api, storage }
    }
}

#[async_trait]
impl Stage for StatusStage {
    type Job = ScreenNameJob;

    fn name(&self) -> &'static str {
        "statuses"
    }

    async fn exec(&self, job: &mut ScreenNameJob) -> Result<(), ExecError> {
        let tweets = self.api.fetch_statuses(&job.name).await?;

        let created = self.storage.with_transaction(|uow| {
            tweets.iter().try_fold(0usize, |created, tweet| -> StorageResult<usize> {
                Ok(match uow.upsert_status(tweet)? {
                    UpsertOutcome::Created => created + 1,
                    UpsertOutcome::Updated => created,
                })
            })
        })?;

        tracing::info!(
            unit = self.name(),
            fetched = tweets.len(),
            created,
            "Stored timeline of {}",
            job
        );
        Ok(())
    }
}
