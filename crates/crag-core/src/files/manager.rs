//! Entry point used by accessors to obtain local copies of catalog files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, Mutex, OwnedMutexGuard};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::FileId;

use super::cache::{FileCache, FileEvent, Slot};
use super::synchronizer::{SynchronizedFile, UpdateOutcome};

/// Totals from [`FileManager::refresh_all`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub downloaded: usize,
    pub unchanged: usize,
    /// Files the server no longer knows; local copies were removed
    pub removed: usize,
    pub failed: usize,
}

/// Serializes work per file so two callers never download the same uuid at once.
pub struct FileManager {
    cache: FileCache,
    api: ApiClient,
    locks: Mutex<HashMap<FileId, Arc<Mutex<()>>>>,
}

impl FileManager {
    pub fn new(cache: FileCache, api: ApiClient) -> Self {
        Self {
            cache,
            api,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub const fn cache(&self) -> &FileCache {
        &self.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FileEvent> {
        self.cache.subscribe()
    }

    pub const fn file(&self, file_id: FileId) -> SynchronizedFile<'_> {
        SynchronizedFile::new(file_id, &self.cache, &self.api)
    }

    async fn lock(&self, file_id: FileId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(file_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Local path for `file_id`, downloading only when no local copy exists.
    pub async fn ensure(&self, file_id: FileId, width: Option<u32>) -> Result<Option<PathBuf>> {
        if let Some(entry) = self.file(file_id).local().await {
            return Ok(Some(entry.path().to_path_buf()));
        }
        let outcome = self.refresh(file_id, width, |_, _| {}).await?;
        Ok(outcome.map(|outcome| outcome.path))
    }

    /// Hash-checked update. Returns `None` when the server no longer has the
    /// file, after removing any local copies.
    pub async fn refresh(
        &self,
        file_id: FileId,
        width: Option<u32>,
        progress: impl FnMut(u64, u64),
    ) -> Result<Option<UpdateOutcome>> {
        let _guard = self.lock(file_id).await;
        match self.file(file_id).update(width, progress).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(Error::NotFound(_)) => {
                self.remove_orphan(file_id).await?;
                Ok(None)
            }
            Err(error) => Err(error),
        }
    }

    /// Keep a durable copy, fetching it first when nothing is cached.
    pub async fn make_permanent(
        &self,
        file_id: FileId,
        width: Option<u32>,
    ) -> Result<Option<PathBuf>> {
        let _guard = self.lock(file_id).await;
        let file = self.file(file_id);
        let permanent = file.permanent();

        if permanent.exists().await {
            return Ok(Some(permanent.path().to_path_buf()));
        }

        let cached = file.cached();
        if cached.exists().await {
            cached.move_to(&permanent).await?;
            tracing::info!("Kept file {file_id} permanently");
            return Ok(Some(permanent.path().to_path_buf()));
        }

        let remote = match file.remote_meta().await {
            Ok(remote) => remote,
            Err(Error::NotFound(_)) => {
                self.remove_orphan(file_id).await?;
                return Ok(None);
            }
            Err(error) => return Err(error),
        };
        let entry = file
            .download_into(&permanent, &remote, width, |_, _| {})
            .await?;
        tracing::info!("Downloaded file {file_id} permanently");
        Ok(Some(entry.path().to_path_buf()))
    }

    /// Drop the evictable copy. The permanent copy, if any, is untouched.
    pub async fn evict(&self, file_id: FileId) -> Result<()> {
        let _guard = self.lock(file_id).await;
        self.file(file_id).cached().delete().await
    }

    pub async fn delete_permanent(&self, file_id: FileId) -> Result<()> {
        let _guard = self.lock(file_id).await;
        self.file(file_id).permanent().delete().await
    }

    /// Refresh many files. Failures are logged per file and counted.
    pub async fn refresh_all(
        &self,
        file_ids: impl IntoIterator<Item = FileId>,
        width: Option<u32>,
    ) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        for file_id in file_ids {
            match self.refresh(file_id, width, |_, _| {}).await {
                Ok(Some(outcome)) if outcome.downloaded => summary.downloaded += 1,
                Ok(Some(_)) => summary.unchanged += 1,
                Ok(None) => summary.removed += 1,
                Err(error) => {
                    tracing::error!("Failed to refresh file {file_id}: {error}");
                    summary.failed += 1;
                }
            }
        }
        summary
    }

    async fn remove_orphan(&self, file_id: FileId) -> Result<()> {
        tracing::warn!("File {file_id} no longer exists on the server; removing local copies");
        let file = self.file(file_id);
        file.cached().delete().await?;
        file.permanent().delete().await
    }
}

impl std::fmt::Debug for FileManager {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("FileManager")
            .field("cache_dir", &self.cache.dir(Slot::Cache))
            .field("permanent_dir", &self.cache.dir(Slot::Permanent))
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}
