use crate::api::RemoteApi;
use crate::crawler::job::{partition_ids, ProfileJob, RelationshipJob, ScreenNameJob};
use crate::crawler::queue::JobQueue;
use crate::crawler::unit::Stage;
use crate::storage::SqliteStorage;
use crate::ExecError;
use async_trait::async_trait;
use std::sync::Arc;

/// Expands the graph: friend ids of a user become profile batch jobs
///
/// Holds a handle to the profile unit's queue. This is a directed edge
/// (relationships → profiles); the profile stage never produces work here.
///
/// Friend lists are walked one cursor page at a time. Each page is stored
/// and fanned out before the job's cursor moves past it, so quota
/// exhaustion part-way through a long list only loses the page in flight.
pub struct RelationshipStage {
    api: Arc<dyn RemoteApi>,
    storage: Arc<SqliteStorage>,
    profiles: JobQueue<ProfileJob>,
    batch_size: usize,
}

impl RelationshipStage {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Arc<SqliteStorage>,
        profiles: JobQueue<ProfileJob>,
        batch_size: usize,
    ) -> Self {
        Self {
            api,
            storage,
            profiles,
            batch_size,
        }
    }

    /// Stores follow edges when the source user's id is already known
    ///
    /// Returns the follower id the edges were recorded for, if any.
    fn record_follows(
        &self,
        source: &ScreenNameJob,
        friend_ids: &[i64],
    ) -> Result<Option<i64>, ExecError> {
        let follower = self.storage.with_transaction(|uow| {
            let Some(follower) = uow.find_user_id(&source.name)? else {
                return Ok(None);
            };

            for &friend in friend_ids {
                uow.ensure_user(friend)?;
                uow.record_follow(friend, follower)?;
            }
            Ok(Some(follower))
        })?;

        Ok(follower)
    }

    /// Records and fans out one page of friend ids
    fn absorb_page(&self, job: &RelationshipJob, friend_ids: &[i64]) -> Result<(), ExecError> {
        match self.record_follows(&job.target, friend_ids)? {
            Some(follower) => tracing::debug!(
                unit = self.name(),
                follower,
                "Recorded {} follow edges for {}",
                friend_ids.len(),
                job
            ),
            None => tracing::debug!(
                unit = self.name(),
                "{} not stored yet, skipping follow edges",
                job
            ),
        }

        self.profiles.enqueue_all(
            partition_ids(friend_ids, self.batch_size)
                .into_iter()
                .map(ProfileJob::UserIds),
        );
        Ok(())
    }
}

#[async_trait]
impl Stage for RelationshipStage {
    type Job = RelationshipJob;

    fn name(&self) -> &'static str {
        "relationships"
    }

    async fn exec(&self, job: &mut RelationshipJob) -> Result<(), ExecError> {
        if !job.is_fresh() {
            tracing::debug!(unit = self.name(), "Resuming {}", job);
        }

        loop {
            let page = self
                .api
                .fetch_friend_ids_page(&job.target.name, job.cursor)
                .await?;

            self.absorb_page(job, &page.ids)?;
            job.fetched += page.ids.len();

            if page.next_cursor == 0 {
                break;
            }
            job.cursor = page.next_cursor;
        }

        tracing::info!(
            unit = self.name(),
            friends = job.fetched,
            "Expanded {}",
            job.target
        );
        Ok(())
    }
}
