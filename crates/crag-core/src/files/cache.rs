//! Two-slot on-disk store for synchronized binaries.
//!
//! Each entry is a data file named after the file uuid plus a `<uuid>.meta`
//! JSON sidecar holding the [`RemoteFileInfo`] it was downloaded from. An
//! entry only counts as present when both files exist, and the sidecar is
//! always written last.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::models::{FileId, RemoteFileInfo};

const META_EXTENSION: &str = "meta";
const PARTIAL_EXTENSION: &str = "part";
const EVENT_CAPACITY: usize = 64;

/// Which of the two local locations an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Evictable copy fetched on demand
    Cache,
    /// Copy the user explicitly downloaded
    Permanent,
}

/// Change to a cached data file, published in-process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
    Moved { from: PathBuf, to: PathBuf },
}

impl FileEvent {
    /// Whether the event concerns `path`, as source or destination.
    pub fn touches(&self, path: &Path) -> bool {
        match self {
            Self::Created(p) | Self::Modified(p) | Self::Deleted(p) => p == path,
            Self::Moved { from, to } => from == path || to == path,
        }
    }
}

/// The cache and permanent directories plus the event bus shared by entries.
#[derive(Debug, Clone)]
pub struct FileCache {
    cache_dir: PathBuf,
    permanent_dir: PathBuf,
    events: broadcast::Sender<FileEvent>,
}

impl FileCache {
    /// Open (creating if needed) the two slot directories.
    pub async fn open(
        cache_dir: impl Into<PathBuf>,
        permanent_dir: impl Into<PathBuf>,
    ) -> Result<Self> {
        let cache_dir = cache_dir.into();
        let permanent_dir = permanent_dir.into();
        fs::create_dir_all(&cache_dir).await?;
        fs::create_dir_all(&permanent_dir).await?;

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            cache_dir,
            permanent_dir,
            events,
        })
    }

    /// Open `cache/` and `files/` below a data directory.
    pub async fn open_in(data_dir: &Path) -> Result<Self> {
        Self::open(data_dir.join("cache"), data_dir.join("files")).await
    }

    pub fn dir(&self, slot: Slot) -> &Path {
        match slot {
            Slot::Cache => &self.cache_dir,
            Slot::Permanent => &self.permanent_dir,
        }
    }

    /// Handle to the entry for `file_id` in `slot`. Nothing is touched on disk.
    pub fn entry(&self, slot: Slot, file_id: &FileId) -> CachedFile {
        let data_path = self.dir(slot).join(file_id.as_str());
        CachedFile {
            slot,
            meta_path: data_path.with_extension(META_EXTENSION),
            data_path,
            events: self.events.clone(),
        }
    }

    /// Receive every change made through this cache.
    pub fn subscribe(&self) -> broadcast::Receiver<FileEvent> {
        self.events.subscribe()
    }

    /// Receive changes affecting a single data file.
    pub fn watch(&self, path: impl Into<PathBuf>) -> FileWatch {
        FileWatch {
            path: path.into(),
            receiver: self.events.subscribe(),
        }
    }

    /// Uuids of every complete entry in `slot`.
    pub async fn list(&self, slot: Slot) -> Result<Vec<FileId>> {
        let mut ids = Vec::new();
        let mut entries = fs::read_dir(self.dir(slot)).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some() {
                continue;
            }
            let Some(file_id) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.parse::<FileId>().ok())
            else {
                continue;
            };
            if self.entry(slot, &file_id).exists().await {
                ids.push(file_id);
            }
        }
        ids.sort_by_key(FileId::as_str);
        Ok(ids)
    }
}

/// Change stream filtered to one path.
#[derive(Debug)]
pub struct FileWatch {
    path: PathBuf,
    receiver: broadcast::Receiver<FileEvent>,
}

impl FileWatch {
    /// Next event for the watched path, or `None` once the cache is dropped.
    ///
    /// Events missed because the subscriber lagged are skipped.
    pub async fn next(&mut self) -> Option<FileEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.touches(&self.path) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(
                        "File watch on {} lagged by {skipped} events",
                        self.path.display()
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// One data file and its sidecar.
#[derive(Debug, Clone)]
pub struct CachedFile {
    slot: Slot,
    data_path: PathBuf,
    meta_path: PathBuf,
    events: broadcast::Sender<FileEvent>,
}

impl CachedFile {
    pub const fn slot(&self) -> Slot {
        self.slot
    }

    pub fn path(&self) -> &Path {
        &self.data_path
    }

    pub fn meta_path(&self) -> &Path {
        &self.meta_path
    }

    fn partial_path(&self) -> PathBuf {
        self.data_path.with_extension(PARTIAL_EXTENSION)
    }

    fn publish(&self, event: FileEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Both the data file and the sidecar are present.
    pub async fn exists(&self) -> bool {
        is_file(&self.data_path).await && is_file(&self.meta_path).await
    }

    /// Remove data and sidecar. Missing files count as removed.
    pub async fn delete(&self) -> Result<()> {
        let had_data = is_file(&self.data_path).await;
        let data = remove_if_present(&self.data_path).await;
        let meta = remove_if_present(&self.meta_path).await;
        data?;
        meta?;
        if had_data {
            self.publish(FileEvent::Deleted(self.data_path.clone()));
        }
        Ok(())
    }

    /// Parse the sidecar.
    pub async fn read_meta(&self) -> Result<RemoteFileInfo> {
        let raw = match fs::read_to_string(&self.meta_path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Err(Error::State(format!(
                    "no metadata for {}",
                    self.data_path.display()
                )));
            }
            Err(error) => return Err(error.into()),
        };
        Ok(serde_json::from_str(&raw)?)
    }

    /// Sidecar contents, or `None` when the entry is incomplete.
    pub async fn meta(&self) -> Result<Option<RemoteFileInfo>> {
        if !self.exists().await {
            return Ok(None);
        }
        self.read_meta().await.map(Some)
    }

    /// Copy data and sidecar onto `target`, then confirm both landed.
    ///
    /// Returns `false` without touching anything when `target` already exists
    /// and `overwrite` is unset.
    pub async fn copy_to(&self, target: &Self, overwrite: bool) -> Result<bool> {
        if !overwrite && target.exists().await {
            return Ok(false);
        }
        if !self.exists().await {
            return Err(Error::State(format!(
                "cannot copy incomplete entry {}",
                self.data_path.display()
            )));
        }

        let existed = is_file(&target.data_path).await;
        target.delete_quietly().await?;
        fs::copy(&self.data_path, &target.data_path).await?;
        fs::copy(&self.meta_path, &target.meta_path).await?;

        if !target.exists().await {
            return Err(Error::Io(io::Error::other(format!(
                "copy to {} could not be verified",
                target.data_path.display()
            ))));
        }
        target.publish(if existed {
            FileEvent::Modified(target.data_path.clone())
        } else {
            FileEvent::Created(target.data_path.clone())
        });
        Ok(true)
    }

    /// Move data and sidecar onto `target`, replacing whatever is there.
    pub async fn move_to(&self, target: &Self) -> Result<()> {
        if !self.exists().await {
            return Err(Error::State(format!(
                "cannot move incomplete entry {}",
                self.data_path.display()
            )));
        }
        target.delete_quietly().await?;

        move_file(&self.data_path, &target.data_path).await?;
        move_file(&self.meta_path, &target.meta_path).await?;

        self.publish(FileEvent::Moved {
            from: self.data_path.clone(),
            to: target.data_path.clone(),
        });
        Ok(())
    }

    /// Store `bytes` with `meta`. Returns `false` when the entry exists and
    /// `overwrite` is unset.
    pub async fn write(
        &self,
        bytes: &[u8],
        meta: &RemoteFileInfo,
        overwrite: bool,
    ) -> Result<bool> {
        let Some(mut writer) = self.writer(overwrite).await? else {
            return Ok(false);
        };
        writer.append(bytes).await?;
        writer.commit(meta).await?;
        Ok(true)
    }

    /// Start a streamed write. The existing pair is removed first, bytes go to
    /// a `.part` file, and nothing is visible until [`PartialWrite::commit`].
    pub async fn writer(&self, overwrite: bool) -> Result<Option<PartialWrite>> {
        if !overwrite && self.exists().await {
            return Ok(None);
        }
        if let Some(parent) = self.data_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let existed = is_file(&self.data_path).await;
        self.delete_quietly().await?;

        let partial_path = self.partial_path();
        let file = fs::File::create(&partial_path).await?;
        Ok(Some(PartialWrite {
            target: self.clone(),
            partial_path,
            file,
            written: 0,
            existed,
        }))
    }

    async fn delete_quietly(&self) -> Result<()> {
        remove_if_present(&self.data_path).await?;
        remove_if_present(&self.meta_path).await
    }
}

/// In-progress streamed write. Dropping it without committing leaves only a
/// `.part` file behind, which the next write truncates.
#[derive(Debug)]
pub struct PartialWrite {
    target: CachedFile,
    partial_path: PathBuf,
    file: fs::File,
    written: u64,
    existed: bool,
}

impl PartialWrite {
    pub async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Publish the data file, then the sidecar.
    pub async fn commit(mut self, meta: &RemoteFileInfo) -> Result<CachedFile> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        drop(self.file);

        fs::rename(&self.partial_path, &self.target.data_path).await?;
        let meta_json = serde_json::to_vec_pretty(meta)?;
        fs::write(&self.target.meta_path, meta_json).await?;

        let path = self.target.data_path.clone();
        self.target.publish(if self.existed {
            FileEvent::Modified(path)
        } else {
            FileEvent::Created(path)
        });
        Ok(self.target)
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|metadata| metadata.is_file())
}

async fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).await.is_ok() {
        return Ok(());
    }
    // Slots on different filesystems.
    fs::copy(from, to).await?;
    remove_if_present(from).await
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn meta(hash: &str) -> RemoteFileInfo {
        RemoteFileInfo {
            download: "download/x".to_string(),
            filename: "topo.jpg".to_string(),
            size: 5,
            hash: hash.to_string(),
        }
    }

    async fn setup() -> (TempDir, FileCache) {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open_in(dir.path()).await.unwrap();
        (dir, cache)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_and_read_meta() {
        let (_dir, cache) = setup().await;
        let entry = cache.entry(Slot::Cache, &FileId::new());

        assert!(!entry.exists().await);
        assert!(entry.write(b"hello", &meta("abc"), false).await.unwrap());
        assert!(entry.exists().await);
        assert_eq!(entry.read_meta().await.unwrap(), meta("abc"));
        assert_eq!(fs::read(entry.path()).await.unwrap(), b"hello");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_write_without_overwrite_keeps_existing() {
        let (_dir, cache) = setup().await;
        let entry = cache.entry(Slot::Cache, &FileId::new());

        entry.write(b"first", &meta("one"), false).await.unwrap();
        assert!(!entry.write(b"second", &meta("two"), false).await.unwrap());
        assert_eq!(entry.read_meta().await.unwrap().hash, "one");

        assert!(entry.write(b"second", &meta("two"), true).await.unwrap());
        assert_eq!(entry.read_meta().await.unwrap().hash, "two");
        assert_eq!(fs::read(entry.path()).await.unwrap(), b"second");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_read_meta_without_sidecar_is_state_error() {
        let (_dir, cache) = setup().await;
        let entry = cache.entry(Slot::Cache, &FileId::new());
        fs::write(entry.path(), b"orphan").await.unwrap();

        assert!(!entry.exists().await);
        assert!(matches!(entry.read_meta().await, Err(Error::State(_))));
        assert!(entry.meta().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_abandoned_write_is_not_visible() {
        let (_dir, cache) = setup().await;
        let entry = cache.entry(Slot::Cache, &FileId::new());

        let mut writer = entry.writer(false).await.unwrap().unwrap();
        writer.append(b"half").await.unwrap();
        drop(writer);

        assert!(!entry.exists().await);
        assert!(!is_file(entry.path()).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_missing_is_ok() {
        let (_dir, cache) = setup().await;
        let entry = cache.entry(Slot::Permanent, &FileId::new());
        entry.delete().await.unwrap();

        entry.write(b"x", &meta("h"), false).await.unwrap();
        entry.delete().await.unwrap();
        assert!(!is_file(entry.path()).await);
        assert!(!is_file(entry.meta_path()).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_copy_to_respects_overwrite() {
        let (_dir, cache) = setup().await;
        let file_id = FileId::new();
        let source = cache.entry(Slot::Cache, &file_id);
        let target = cache.entry(Slot::Permanent, &file_id);

        source.write(b"new", &meta("new"), false).await.unwrap();
        target.write(b"old", &meta("old"), false).await.unwrap();

        assert!(!source.copy_to(&target, false).await.unwrap());
        assert_eq!(target.read_meta().await.unwrap().hash, "old");

        assert!(source.copy_to(&target, true).await.unwrap());
        assert_eq!(target.read_meta().await.unwrap().hash, "new");
        assert!(source.exists().await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_move_to_publishes_event() {
        let (_dir, cache) = setup().await;
        let file_id = FileId::new();
        let source = cache.entry(Slot::Cache, &file_id);
        let target = cache.entry(Slot::Permanent, &file_id);
        source.write(b"data", &meta("h"), false).await.unwrap();

        let mut watch = cache.watch(target.path());
        source.move_to(&target).await.unwrap();

        assert!(!source.exists().await);
        assert!(target.exists().await);
        assert_eq!(
            watch.next().await.unwrap(),
            FileEvent::Moved {
                from: source.path().to_path_buf(),
                to: target.path().to_path_buf(),
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watch_filters_by_path() {
        let (_dir, cache) = setup().await;
        let watched = cache.entry(Slot::Cache, &FileId::new());
        let other = cache.entry(Slot::Cache, &FileId::new());

        let mut watch = cache.watch(watched.path());
        other.write(b"x", &meta("1"), false).await.unwrap();
        watched.write(b"y", &meta("2"), false).await.unwrap();
        watched.write(b"z", &meta("3"), true).await.unwrap();
        watched.delete().await.unwrap();

        let path = watched.path().to_path_buf();
        assert_eq!(watch.next().await.unwrap(), FileEvent::Created(path.clone()));
        assert_eq!(watch.next().await.unwrap(), FileEvent::Modified(path.clone()));
        assert_eq!(watch.next().await.unwrap(), FileEvent::Deleted(path));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_only_complete_entries() {
        let (_dir, cache) = setup().await;
        let complete = FileId::new();
        cache
            .entry(Slot::Cache, &complete)
            .write(b"x", &meta("1"), false)
            .await
            .unwrap();
        fs::write(cache.entry(Slot::Cache, &FileId::new()).path(), b"orphan")
            .await
            .unwrap();

        assert_eq!(cache.list(Slot::Cache).await.unwrap(), vec![complete]);
        assert!(cache.list(Slot::Permanent).await.unwrap().is_empty());
    }
}
