//! Hash-gated download of a single remote file into the local cache.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::{FileId, RemoteFileInfo};

use super::cache::{CachedFile, FileCache, Slot};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Result of [`SynchronizedFile::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Data file now holding the current remote content
    pub path: PathBuf,
    /// Whether bytes were transferred; `false` when the hashes already matched
    pub downloaded: bool,
    pub meta: RemoteFileInfo,
}

/// A remote binary together with its two local slots.
#[derive(Debug, Clone, Copy)]
pub struct SynchronizedFile<'a> {
    file_id: FileId,
    cache: &'a FileCache,
    api: &'a ApiClient,
}

impl<'a> SynchronizedFile<'a> {
    pub const fn new(file_id: FileId, cache: &'a FileCache, api: &'a ApiClient) -> Self {
        Self {
            file_id,
            cache,
            api,
        }
    }

    pub const fn file_id(&self) -> FileId {
        self.file_id
    }

    pub fn cached(&self) -> CachedFile {
        self.cache.entry(Slot::Cache, &self.file_id)
    }

    pub fn permanent(&self) -> CachedFile {
        self.cache.entry(Slot::Permanent, &self.file_id)
    }

    /// The entry reads should use: permanent first, then cache.
    pub async fn local(&self) -> Option<CachedFile> {
        let permanent = self.permanent();
        if permanent.exists().await {
            return Some(permanent);
        }
        let cached = self.cached();
        if cached.exists().await {
            return Some(cached);
        }
        None
    }

    /// Where a refresh lands: the permanent slot if it is populated, else the cache.
    pub async fn write_target(&self) -> CachedFile {
        let permanent = self.permanent();
        if permanent.exists().await {
            permanent
        } else {
            self.cached()
        }
    }

    pub async fn local_meta(&self) -> Result<Option<RemoteFileInfo>> {
        match self.local().await {
            Some(entry) => entry.meta().await,
            None => Ok(None),
        }
    }

    pub async fn remote_meta(&self) -> Result<RemoteFileInfo> {
        self.api.file_info(&self.file_id).await
    }

    /// Bring the local copy in line with the server.
    ///
    /// Nothing is downloaded when the local sidecar hash already matches.
    /// `progress` receives `(received, total)` at most every 100 ms plus once
    /// on completion.
    pub async fn update(
        &self,
        width: Option<u32>,
        progress: impl FnMut(u64, u64),
    ) -> Result<UpdateOutcome> {
        let remote = self.remote_meta().await?;
        let target = self.write_target().await;

        if let Some(local) = target.meta().await? {
            if local.hash == remote.hash {
                tracing::debug!("File {} is up to date", self.file_id);
                return Ok(UpdateOutcome {
                    path: target.path().to_path_buf(),
                    downloaded: false,
                    meta: local,
                });
            }
        }

        let entry = self.download_into(&target, &remote, width, progress).await?;
        Ok(UpdateOutcome {
            path: entry.path().to_path_buf(),
            downloaded: true,
            meta: remote,
        })
    }

    /// Stream the remote bytes into `target`, replacing what is there.
    ///
    /// A failed request leaves no entry behind.
    pub async fn download_into(
        &self,
        target: &CachedFile,
        remote: &RemoteFileInfo,
        width: Option<u32>,
        mut progress: impl FnMut(u64, u64),
    ) -> Result<CachedFile> {
        tracing::debug!(
            "Downloading file {} into {:?} slot",
            self.file_id,
            target.slot()
        );
        let mut response = self.api.download(&self.file_id, width).await?;
        let total = response.content_length().unwrap_or(remote.size);

        let mut writer = target.writer(true).await?.ok_or_else(|| {
            Error::State(format!("could not open {} for writing", target.path().display()))
        })?;
        let mut throttle = ProgressThrottle::new(PROGRESS_INTERVAL);
        while let Some(chunk) = response.chunk().await? {
            writer.append(&chunk).await?;
            if throttle.ready() {
                progress(writer.written(), total);
            }
        }
        progress(writer.written(), total);

        writer.commit(remote).await
    }
}

struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    fn ready(&mut self) -> bool {
        let now = Instant::now();
        match self.last {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn remote(hash: &str, size: u64) -> RemoteFileInfo {
        RemoteFileInfo {
            download: "download/file".to_string(),
            filename: "sketch.png".to_string(),
            size,
            hash: hash.to_string(),
        }
    }

    async fn setup(server: &MockServer) -> (TempDir, FileCache, ApiClient) {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::open_in(dir.path()).await.unwrap();
        let api = ApiClient::new(server.base_url(), None).unwrap();
        (dir, cache, api)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_sidecar_downloads_data_and_meta() {
        let server = MockServer::start_async().await;
        let (_dir, cache, api) = setup(&server).await;
        let file_id = FileId::new();

        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/files/{file_id}"));
                then.status(200)
                    .json_body(json!({"data": remote("abc", 5)}));
            })
            .await;
        let download = server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/download/{file_id}"));
                then.status(200).body("bytes");
            })
            .await;

        let file = SynchronizedFile::new(file_id, &cache, &api);
        let mut reports = Vec::new();
        let outcome = file
            .update(None, |received, total| reports.push((received, total)))
            .await
            .unwrap();

        assert!(outcome.downloaded);
        download.assert_async().await;
        assert_eq!(tokio::fs::read(&outcome.path).await.unwrap(), b"bytes");
        assert_eq!(file.local_meta().await.unwrap(), Some(remote("abc", 5)));
        assert_eq!(reports.last(), Some(&(5, 5)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_matching_hash_transfers_nothing() {
        let server = MockServer::start_async().await;
        let (_dir, cache, api) = setup(&server).await;
        let file_id = FileId::new();

        cache
            .entry(Slot::Cache, &file_id)
            .write(b"bytes", &remote("abc", 5), false)
            .await
            .unwrap();
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/files/{file_id}"));
                then.status(200).json_body(json!({"data": remote("abc", 5)}));
            })
            .await;
        let download = server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/download/{file_id}"));
                then.status(200).body("other");
            })
            .await;

        let outcome = SynchronizedFile::new(file_id, &cache, &api)
            .update(None, |_, _| {})
            .await
            .unwrap();

        assert!(!outcome.downloaded);
        assert_eq!(download.hits_async().await, 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changed_hash_refreshes_permanent_slot() {
        let server = MockServer::start_async().await;
        let (_dir, cache, api) = setup(&server).await;
        let file_id = FileId::new();

        cache
            .entry(Slot::Permanent, &file_id)
            .write(b"old", &remote("old", 3), false)
            .await
            .unwrap();
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/files/{file_id}"));
                then.status(200).json_body(json!({"data": remote("new", 3)}));
            })
            .await;
        let download = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path(format!("/download/{file_id}"))
                    .query_param("width", "640");
                then.status(200).body("new");
            })
            .await;

        let file = SynchronizedFile::new(file_id, &cache, &api);
        let outcome = file.update(Some(640), |_, _| {}).await.unwrap();

        download.assert_async().await;
        assert_eq!(outcome.path, file.permanent().path());
        assert!(!file.cached().exists().await);
        assert_eq!(file.local_meta().await.unwrap().unwrap().hash, "new");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_download_leaves_no_entry() {
        let server = MockServer::start_async().await;
        let (_dir, cache, api) = setup(&server).await;
        let file_id = FileId::new();

        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/files/{file_id}"));
                then.status(200).json_body(json!({"data": remote("abc", 5)}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path(format!("/download/{file_id}"));
                then.status(500).body("boom");
            })
            .await;

        let file = SynchronizedFile::new(file_id, &cache, &api);
        let err = file.update(None, |_, _| {}).await.unwrap_err();

        assert!(err.is_retryable());
        assert!(file.local().await.is_none());
    }

    #[test]
    fn test_progress_throttle() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert!(throttle.ready());
        assert!(!throttle.ready());
    }
}
