//! Shared cross-platform state types.

use crate::sync::SyncProgress;

/// Unified sync state published to UI observers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    Offline,
    Syncing,
    Synced,
    Error,
}

/// Snapshot of what the sync worker is doing, suitable for a `watch` channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncStatus {
    pub state: SyncState,
    pub progress: Option<SyncProgress>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Offline,
            progress: None,
        }
    }
}
