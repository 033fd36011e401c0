//! The three crawl stages
//!
//! - `profiles`: screen name or id batch → `users`
//! - `relationships`: friend ids → follow edges + profile batch jobs
//! - `statuses`: timeline → `statuses`
//!
//! No stage seeds work from `on_idle`. Scheduling a relationship crawl once a
//! profile is stored is left unwired.

mod profiles;
mod relationships;
mod statuses;

pub use profiles::ProfileStage;
pub use relationships::RelationshipStage;
pub use statuses::StatusStage;
