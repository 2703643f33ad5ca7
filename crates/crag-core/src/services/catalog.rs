//! Shared catalog service used by the sync engine and clients.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    Database, EntityStore, LibSqlEntityRepository, LibSqlSettingsRepository, SettingsRepository,
};
use crate::error::{Error, Result};
use crate::models::{Entity, EntityKind, LocalDeletion, SyncBookkeeping};
use crate::util::unix_millis_now;

/// Thread-safe handle over the local catalog database.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl CatalogService {
    /// Open the catalog at the given filesystem path.
    ///
    /// A file that is not a database is moved aside and a fresh catalog is
    /// created in its place; the next sync repopulates it.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = match Database::open(&db_path).await {
            Ok(db) => db,
            Err(error) if Self::is_corrupted_db_error(&error) => {
                tracing::warn!(
                    "Catalog at {} is unreadable: {error}. Starting from an empty catalog.",
                    db_path.display()
                );
                Self::quarantine_corrupted_db_files(&db_path)?;
                Database::open(&db_path).await?
            }
            Err(error) => return Err(error),
        };

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory catalog (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Location of the database file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn is_corrupted_db_error(error: &Error) -> bool {
        let message = error.to_string().to_ascii_lowercase();
        message.contains("file is not a database") || message.contains("malformed")
    }

    fn quarantine_corrupted_db_files(db_path: &Path) -> Result<()> {
        if db_path.exists() {
            let base_name = db_path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("catalog.db");
            let backup_name = format!("{base_name}.corrupt-{}", unix_millis_now());
            let backup_path = db_path.with_file_name(backup_name);

            std::fs::rename(db_path, &backup_path)?;
            tracing::warn!(
                "Moved corrupted catalog from {} to {}",
                db_path.display(),
                backup_path.display()
            );
        }

        let Some(parent) = db_path.parent() else {
            return Ok(());
        };
        let Some(base_name) = db_path.file_name().and_then(|name| name.to_str()) else {
            return Ok(());
        };
        let sidecar_prefix = format!("{base_name}-");

        for entry in std::fs::read_dir(parent)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            if file_name.to_string_lossy().starts_with(&sidecar_prefix) {
                let path = entry.path();
                std::fs::remove_file(&path)?;
                tracing::warn!("Removed stale catalog sidecar {}", path.display());
            }
        }

        Ok(())
    }

    /// Records of a kind, optionally restricted to one parent, in display order.
    pub async fn list<E: Entity>(&self, parent_id: Option<i64>) -> Result<Vec<E>> {
        let mut entities = match parent_id {
            Some(parent_id) => self.children::<E>(parent_id).await?,
            None => self.get_all::<E>().await?,
        };
        entities.sort_by_key(Entity::sort_key);
        Ok(entities)
    }

    /// Store a user edit: stamps the record with the current time and marks
    /// the catalog as locally modified so the next sync pushes it.
    ///
    /// Id 0 holds the single unsaved draft of a kind. Saving a new id-0
    /// record while a draft exists fails with [`Error::State`]; remove the
    /// draft first to replace it.
    pub async fn save<E: Entity>(&self, entity: &mut E) -> Result<()> {
        let db = self.db.lock().await;
        let repo = LibSqlEntityRepository::new(db.connection());
        let exists = repo.get::<E>(entity.id()).await?.is_some();
        if exists && entity.id() == 0 {
            return Err(Error::State(format!(
                "an unsaved {} already exists; remove it before creating another",
                E::KIND
            )));
        }

        let now = unix_millis_now();
        entity.set_timestamp(now);
        if exists {
            repo.update(entity).await?;
        } else {
            repo.insert(entity).await?;
        }
        LibSqlSettingsRepository::new(db.connection())
            .mark_local_modification(now)
            .await?;
        tracing::debug!("Saved local edit of {} {}", E::KIND, entity.id());
        Ok(())
    }

    /// Delete a record and its subtree on behalf of the user, queueing the
    /// deletions for the server. Fails with `NotFound` for unknown records.
    pub async fn remove<E: Entity>(&self, id: i64) -> Result<Vec<LocalDeletion>> {
        let db = self.db.lock().await;
        let tombstones = LibSqlEntityRepository::new(db.connection())
            .delete_cascade(E::KIND, id)
            .await?;
        if !tombstones.is_empty() {
            LibSqlSettingsRepository::new(db.connection())
                .mark_local_modification(unix_millis_now())
                .await?;
        }
        tracing::info!(
            "Removed {} {id}; {} deletions queued for the server",
            E::KIND,
            tombstones.len()
        );
        Ok(tombstones)
    }

    /// Bookmark or unbookmark a record. Favorites never leave this device.
    pub async fn set_favorite(&self, kind: EntityKind, id: i64, favorite: bool) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .set_favorite(kind, id, favorite)
            .await
    }

    pub async fn is_favorite(&self, kind: EntityKind, id: i64) -> Result<bool> {
        Ok(self.favorite_ids(kind).await?.contains(&id))
    }

    /// Favorite ids of a kind, oldest bookmark first.
    pub async fn favorite_ids(&self, kind: EntityKind) -> Result<Vec<i64>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .favorite_ids(kind)
            .await
    }

    /// Favorite records of a kind; bookmarks whose record is gone are skipped.
    pub async fn favorites<E: Entity>(&self) -> Result<Vec<E>> {
        let mut favorites = Vec::new();
        for id in self.favorite_ids(E::KIND).await? {
            if let Some(entity) = self.get::<E>(id).await? {
                favorites.push(entity);
            }
        }
        Ok(favorites)
    }
}

impl EntityStore for CatalogService {
    async fn get<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection()).get(id).await
    }

    async fn get_all<E: Entity>(&self) -> Result<Vec<E>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection()).get_all().await
    }

    async fn children<E: Entity>(&self, parent_id: i64) -> Result<Vec<E>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .children(parent_id)
            .await
    }

    async fn insert<E: Entity>(&self, entity: &E) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .insert(entity)
            .await
    }

    async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .update(entity)
            .await
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .delete(kind, id)
            .await
    }

    async fn ids(&self, kind: EntityKind) -> Result<BTreeSet<i64>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection()).ids(kind).await
    }

    async fn pending_deletions(&self, kind: EntityKind) -> Result<Vec<LocalDeletion>> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .pending_deletions(kind)
            .await
    }

    async fn notify_deletion(&self, deletion: &LocalDeletion) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .notify_deletion(deletion)
            .await
    }

    async fn clear_deletion(&self, deletion: &LocalDeletion) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlEntityRepository::new(db.connection())
            .clear_deletion(deletion)
            .await
    }
}

impl SettingsRepository for CatalogService {
    async fn load_bookkeeping(&self) -> Result<SyncBookkeeping> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .load_bookkeeping()
            .await
    }

    async fn save_bookkeeping(&self, bookkeeping: &SyncBookkeeping) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .save_bookkeeping(bookkeeping)
            .await
    }

    async fn mark_local_modification(&self, at: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlSettingsRepository::new(db.connection())
            .mark_local_modification(at)
            .await
    }
}
