//! Persisted sync bookkeeping

use serde::{Deserialize, Serialize};

/// Run bookkeeping kept in the local key/value settings table.
///
/// All instants are Unix milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBookkeeping {
    /// When the last successful run finished
    pub last_sync: Option<i64>,
    /// Server-side last update observed at the end of the last run
    pub last_server_update: Option<i64>,
    /// Last local edit not yet confirmed by a run
    pub last_local_modification: Option<i64>,
    /// Whether at least one run has completed on this device
    pub has_synced: bool,
}

impl SyncBookkeeping {
    /// Decide whether a run is worth doing given the server's last update.
    ///
    /// This is a heuristic to avoid needless work, not a correctness check.
    pub fn needs_sync(&self, server_last_update: Option<i64>) -> bool {
        let Some(local_update) = self.last_server_update else {
            return true;
        };
        if !self.has_synced {
            return true;
        }
        if let Some(server_update) = server_last_update {
            if server_update > local_update {
                return true;
            }
        }
        if let Some(modified) = self.last_local_modification {
            if self.last_sync.map_or(true, |last_sync| modified > last_sync) {
                return true;
            }
            if server_last_update.is_some_and(|server_update| modified > server_update) {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synced(last_sync: i64, last_server_update: i64) -> SyncBookkeeping {
        SyncBookkeeping {
            last_sync: Some(last_sync),
            last_server_update: Some(last_server_update),
            last_local_modification: None,
            has_synced: true,
        }
    }

    #[test]
    fn first_run_always_syncs() {
        assert!(SyncBookkeeping::default().needs_sync(Some(10)));
        assert!(SyncBookkeeping::default().needs_sync(None));
    }

    #[test]
    fn up_to_date_skips() {
        assert!(!synced(200, 100).needs_sync(Some(100)));
        assert!(!synced(200, 100).needs_sync(None));
    }

    #[test]
    fn newer_server_update_syncs() {
        assert!(synced(200, 100).needs_sync(Some(150)));
    }

    #[test]
    fn local_modification_after_last_sync_syncs() {
        let mut bookkeeping = synced(200, 100);
        bookkeeping.last_local_modification = Some(250);
        assert!(bookkeeping.needs_sync(Some(100)));
    }

    #[test]
    fn local_modification_after_server_update_syncs() {
        let mut bookkeeping = synced(300, 100);
        bookkeeping.last_local_modification = Some(150);
        assert!(bookkeeping.needs_sync(Some(100)));

        let mut settled = synced(300, 200);
        settled.last_local_modification = Some(150);
        assert!(!settled.needs_sync(Some(200)));
    }
}
