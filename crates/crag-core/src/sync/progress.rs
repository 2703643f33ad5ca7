//! Step telemetry and per-run totals.

use std::fmt;

use crate::models::EntityKind;

/// Phase of a sync run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStep {
    GetTree,
    SyncAreas,
    SyncZones,
    SyncSectors,
    SyncPaths,
    SyncBlocking,
    DeleteBlocking,
    DeletePaths,
    DeleteSectors,
    DeleteZones,
    DeleteAreas,
}

impl SyncStep {
    pub const fn reconcile(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Area => Self::SyncAreas,
            EntityKind::Zone => Self::SyncZones,
            EntityKind::Sector => Self::SyncSectors,
            EntityKind::Path => Self::SyncPaths,
            EntityKind::Blocking => Self::SyncBlocking,
        }
    }

    pub const fn delete(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Area => Self::DeleteAreas,
            EntityKind::Zone => Self::DeleteZones,
            EntityKind::Sector => Self::DeleteSectors,
            EntityKind::Path => Self::DeletePaths,
            EntityKind::Blocking => Self::DeleteBlocking,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::GetTree => "Fetching catalog",
            Self::SyncAreas => "Syncing areas",
            Self::SyncZones => "Syncing zones",
            Self::SyncSectors => "Syncing sectors",
            Self::SyncPaths => "Syncing paths",
            Self::SyncBlocking => "Syncing blockings",
            Self::DeleteBlocking => "Deleting blockings",
            Self::DeletePaths => "Deleting paths",
            Self::DeleteSectors => "Deleting sectors",
            Self::DeleteZones => "Deleting zones",
            Self::DeleteAreas => "Deleting areas",
        }
    }
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `progress` of `max` items processed within `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncProgress {
    pub step: SyncStep,
    pub progress: usize,
    pub max: usize,
}

impl SyncProgress {
    pub const fn new(step: SyncStep, progress: usize, max: usize) -> Self {
        Self {
            step,
            progress,
            max,
        }
    }
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.step, self.progress, self.max)
    }
}

/// What a completed run changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Server records stored locally for the first time
    pub inserted: usize,
    /// Local records overwritten by a newer server copy
    pub updated: usize,
    /// Local edits sent to the server
    pub pushed: usize,
    /// Local edits not sent because no API key is configured
    pub skipped: usize,
    /// Local edits the server rejected or that failed in transit
    pub failed: usize,
    /// Tombstones confirmed by the server
    pub deleted_remote: usize,
    /// Local records removed because the server no longer has them
    pub deleted_local: usize,
}

impl SyncReport {
    /// Local edits still waiting to reach the server.
    pub const fn unpushed(&self) -> usize {
        self.skipped + self.failed
    }

    /// Whether the run modified the local store.
    pub const fn changed_locally(&self) -> bool {
        self.inserted + self.updated + self.deleted_local > 0
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} updated, {} pushed, {} deleted remotely, {} deleted locally",
            self.inserted, self.updated, self.pushed, self.deleted_remote, self.deleted_local
        )?;
        if self.unpushed() > 0 {
            write!(f, ", {} local edits not pushed", self.unpushed())?;
        }
        Ok(())
    }
}
