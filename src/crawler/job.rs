//! Job payloads consumed by the crawler units
//!
//! Jobs carry no identity beyond their payload. Duplicates are tolerated
//! and never deduplicated here; storage upserts make refetching harmless.

use crate::api::FIRST_CURSOR;
use crate::config::MAX_LOOKUP_BATCH;
use std::fmt;

/// Targets a profile, friend list or timeline by handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenNameJob {
    pub name: String,
}

impl ScreenNameJob {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let name = name.trim().trim_start_matches('@').to_string();
        Self { name }
    }
}

impl fmt::Display for ScreenNameJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)
    }
}

/// Friend-list expansion of one user, resumable across quota windows
///
/// The relationship stage advances `cursor` after each page it has fully
/// processed, so a job requeued after quota exhaustion continues where it
/// stopped instead of refetching earlier pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipJob {
    pub target: ScreenNameJob,
    pub cursor: i64,
    /// Friend ids processed so far
    pub fetched: usize,
}

impl RelationshipJob {
    pub fn new(target: ScreenNameJob) -> Self {
        Self {
            target,
            cursor: FIRST_CURSOR,
            fetched: 0,
        }
    }

    /// True until the first page has been processed
    pub fn is_fresh(&self) -> bool {
        self.cursor == FIRST_CURSOR
    }
}

impl From<ScreenNameJob> for RelationshipJob {
    fn from(target: ScreenNameJob) -> Self {
        Self::new(target)
    }
}

impl fmt::Display for RelationshipJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_fresh() {
            self.target.fmt(f)
        } else {
            write!(f, "{} from cursor {}", self.target, self.cursor)
        }
    }
}

/// Up to [`MAX_LOOKUP_BATCH`] profile targets by numeric id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdBatchJob {
    ids: Vec<i64>,
}

impl UserIdBatchJob {
    /// Builds a batch, rejecting empty or oversized id lists
    pub fn new(ids: Vec<i64>) -> Option<Self> {
        if ids.is_empty() || ids.len() > MAX_LOOKUP_BATCH {
            return None;
        }
        Some(Self { ids })
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl fmt::Display for UserIdBatchJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.ids.first(), self.ids.last()) {
            (Some(first), Some(last)) if self.ids.len() > 1 => {
                write!(f, "{} ids [{}..{}]", self.ids.len(), first, last)
            }
            (Some(only), _) => write!(f, "id {}", only),
            _ => write!(f, "no ids"),
        }
    }
}

/// Work accepted by the profile unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileJob {
    ScreenName(ScreenNameJob),
    UserIds(UserIdBatchJob),
}

impl fmt::Display for ProfileJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScreenName(job) => job.fmt(f),
            Self::UserIds(job) => job.fmt(f),
        }
    }
}

impl From<ScreenNameJob> for ProfileJob {
    fn from(job: ScreenNameJob) -> Self {
        Self::ScreenName(job)
    }
}

impl From<UserIdBatchJob> for ProfileJob {
    fn from(job: UserIdBatchJob) -> Self {
        Self::UserIds(job)
    }
}

/// Splits ids into contiguous batches of at most `batch_size`
///
/// `batch_size` is clamped to `1..=MAX_LOOKUP_BATCH`. Concatenating the
/// batches yields `ids` in the original order.
pub fn partition_ids(ids: &[i64], batch_size: usize) -> Vec<UserIdBatchJob> {
    let size = batch_size.clamp(1, MAX_LOOKUP_BATCH);
    ids.chunks(size)
        .filter_map(|chunk| UserIdBatchJob::new(chunk.to_vec()))
        .collect()
}
