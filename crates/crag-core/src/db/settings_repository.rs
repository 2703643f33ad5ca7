//! Settings repository implementation

use crate::error::Result;
use crate::models::SyncBookkeeping;
use libsql::Connection;

const KEY_LAST_SYNC: &str = "last_sync";
const KEY_LAST_SERVER_UPDATE: &str = "last_server_update";
const KEY_LAST_LOCAL_MODIFICATION: &str = "last_local_modification";
const KEY_HAS_SYNCED: &str = "has_synced";

/// Trait for sync bookkeeping storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SettingsRepository {
    /// Load bookkeeping from the database
    async fn load_bookkeeping(&self) -> Result<SyncBookkeeping>;

    /// Save bookkeeping to the database
    async fn save_bookkeeping(&self, bookkeeping: &SyncBookkeeping) -> Result<()>;

    /// Record that the user changed something locally at `at` (Unix ms)
    async fn mark_local_modification(&self, at: i64) -> Result<()>;
}

/// libSQL implementation of `SettingsRepository`
pub struct LibSqlSettingsRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSettingsRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for LibSqlSettingsRepository<'_> {
    async fn load_bookkeeping(&self) -> Result<SyncBookkeeping> {
        Ok(SyncBookkeeping {
            last_sync: self.get_instant(KEY_LAST_SYNC).await?,
            last_server_update: self.get_instant(KEY_LAST_SERVER_UPDATE).await?,
            last_local_modification: self.get_instant(KEY_LAST_LOCAL_MODIFICATION).await?,
            has_synced: self.get_setting(KEY_HAS_SYNCED).await?.is_some_and(|value| {
                matches!(
                    value.trim().to_ascii_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                )
            }),
        })
    }

    async fn save_bookkeeping(&self, bookkeeping: &SyncBookkeeping) -> Result<()> {
        self.set_instant(KEY_LAST_SYNC, bookkeeping.last_sync)
            .await?;
        self.set_instant(KEY_LAST_SERVER_UPDATE, bookkeeping.last_server_update)
            .await?;
        self.set_instant(
            KEY_LAST_LOCAL_MODIFICATION,
            bookkeeping.last_local_modification,
        )
        .await?;
        self.set_setting(
            KEY_HAS_SYNCED,
            if bookkeeping.has_synced {
                "true"
            } else {
                "false"
            },
        )
        .await?;
        Ok(())
    }

    async fn mark_local_modification(&self, at: i64) -> Result<()> {
        self.set_setting(KEY_LAST_LOCAL_MODIFICATION, &at.to_string())
            .await
    }
}

impl LibSqlSettingsRepository<'_> {
    async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM settings WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn get_instant(&self, key: &str) -> Result<Option<i64>> {
        Ok(self
            .get_setting(key)
            .await?
            .and_then(|value| value.trim().parse().ok()))
    }

    async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)",
                [key, value],
            )
            .await?;
        Ok(())
    }

    async fn set_instant(&self, key: &str, value: Option<i64>) -> Result<()> {
        match value {
            Some(value) => self.set_setting(key, &value.to_string()).await,
            None => {
                self.conn
                    .execute("DELETE FROM settings WHERE key = ?", [key])
                    .await?;
                Ok(())
            }
        }
    }
}
