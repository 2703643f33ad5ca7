//! Two-way catalog synchronization.
//!
//! A run fetches the server snapshot, reconciles it level by level (areas,
//! zones, sectors, paths, then blockings), sends queued local deletions and
//! finally drops local records the server no longer reports.

mod deletion;
mod orchestrator;
mod progress;
mod reconcile;
mod retry;

#[cfg(test)]
pub(crate) mod fake;

pub use deletion::{prune_unseen, push_deletions};
pub use orchestrator::{SyncEngine, SyncOutcome};
pub use progress::{SyncProgress, SyncReport, SyncStep};
pub use reconcile::{reconcile_level, Decision, SyncContext};
pub use retry::{backoff_delay, backoff_seconds};
