//! Entity repository implementation

use std::collections::BTreeSet;

use libsql::params::IntoParams;
use libsql::{params, Connection, Value};

use crate::error::{Error, Result};
use crate::models::{Entity, EntityKind, LocalDeletion};

/// Typed access to locally stored catalog records and the deletion queue.
///
/// Every operation is individually atomic.
#[allow(async_fn_in_trait)]
pub trait EntityStore {
    /// Get a record by id
    async fn get<E: Entity>(&self, id: i64) -> Result<Option<E>>;

    /// All records of a kind
    async fn get_all<E: Entity>(&self) -> Result<Vec<E>>;

    /// Records whose parent is `parent_id`
    async fn children<E: Entity>(&self, parent_id: i64) -> Result<Vec<E>>;

    /// Store a record that does not exist yet
    async fn insert<E: Entity>(&self, entity: &E) -> Result<()>;

    /// Replace an existing record
    async fn update<E: Entity>(&self, entity: &E) -> Result<()>;

    /// Remove a record; removing an absent record is not an error
    async fn delete(&self, kind: EntityKind, id: i64) -> Result<()>;

    /// Ids of every stored record of a kind
    async fn ids(&self, kind: EntityKind) -> Result<BTreeSet<i64>>;

    /// Tombstones queued for a kind
    async fn pending_deletions(&self, kind: EntityKind) -> Result<Vec<LocalDeletion>>;

    /// Queue a tombstone
    async fn notify_deletion(&self, deletion: &LocalDeletion) -> Result<()>;

    /// Drop a tombstone once the server confirmed the deletion
    async fn clear_deletion(&self, deletion: &LocalDeletion) -> Result<()>;
}

/// libSQL implementation of `EntityStore`
pub struct LibSqlEntityRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlEntityRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Mark or unmark a record as favorite
    pub async fn set_favorite(&self, kind: EntityKind, id: i64, favorite: bool) -> Result<()> {
        if favorite {
            self.conn
                .execute(
                    "INSERT OR IGNORE INTO favorites (kind, id, created_at) VALUES (?, ?, ?)",
                    params![kind.as_str(), id, crate::util::unix_millis_now()],
                )
                .await?;
        } else {
            self.conn
                .execute(
                    "DELETE FROM favorites WHERE kind = ? AND id = ?",
                    params![kind.as_str(), id],
                )
                .await?;
        }
        Ok(())
    }

    /// Favorite ids of a kind, oldest bookmark first
    pub async fn favorite_ids(&self, kind: EntityKind) -> Result<Vec<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM favorites WHERE kind = ? ORDER BY created_at ASC, id ASC",
                params![kind.as_str()],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    /// Ids of `kind` records whose parent is `parent_id`
    pub async fn child_ids(&self, kind: EntityKind, parent_id: i64) -> Result<Vec<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM entities WHERE kind = ? AND parent_id = ? ORDER BY id ASC",
                params![kind.as_str(), parent_id],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    /// Delete a record and all of its descendants in one transaction, queueing
    /// a tombstone for every removed record that exists on the server.
    ///
    /// Returns the queued tombstones, children first.
    pub async fn delete_cascade(&self, kind: EntityKind, id: i64) -> Result<Vec<LocalDeletion>> {
        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        match self.delete_cascade_inner(kind, id).await {
            Ok(tombstones) => {
                self.conn.execute("COMMIT", ()).await?;
                Ok(tombstones)
            }
            Err(error) => {
                self.conn.execute("ROLLBACK", ()).await.ok();
                Err(error)
            }
        }
    }

    async fn delete_cascade_inner(&self, kind: EntityKind, id: i64) -> Result<Vec<LocalDeletion>> {
        if !self.exists(kind, id).await? {
            return Err(Error::NotFound(format!("{kind} {id}")));
        }

        let mut levels = vec![(kind, vec![id])];
        let mut current = (kind, vec![id]);
        while let Some(child) = current.0.child() {
            let mut ids = Vec::new();
            for parent_id in &current.1 {
                ids.extend(self.child_ids(child, *parent_id).await?);
            }
            current = (child, ids);
            levels.push(current.clone());
        }

        let mut tombstones = Vec::new();
        for (kind, ids) in levels.into_iter().rev() {
            for id in ids {
                self.delete(kind, id).await?;
                if id != 0 {
                    let tombstone = LocalDeletion::new(kind, id);
                    self.notify_deletion(&tombstone).await?;
                    tombstones.push(tombstone);
                }
            }
        }
        Ok(tombstones)
    }

    async fn exists(&self, kind: EntityKind, id: i64) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT 1 FROM entities WHERE kind = ? AND id = ?",
                params![kind.as_str(), id],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn query_entities<E: Entity>(
        &self,
        sql: &str,
        params: impl IntoParams,
    ) -> Result<Vec<E>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next().await? {
            let data = row.get::<String>(0)?;
            entities.push(Self::parse_entity(&data)?);
        }
        Ok(entities)
    }

    fn parse_entity<E: Entity>(data: &str) -> Result<E> {
        serde_json::from_str(data)
            .map_err(|error| Error::Database(format!("Corrupt {} row: {error}", E::KIND)))
    }

    fn parent_value<E: Entity>(entity: &E) -> Value {
        entity.parent_id().map_or(Value::Null, Value::Integer)
    }
}

impl EntityStore for LibSqlEntityRepository<'_> {
    async fn get<E: Entity>(&self, id: i64) -> Result<Option<E>> {
        let mut entities = self
            .query_entities::<E>(
                "SELECT data FROM entities WHERE kind = ? AND id = ?",
                params![E::KIND.as_str(), id],
            )
            .await?;
        Ok(entities.pop())
    }

    async fn get_all<E: Entity>(&self) -> Result<Vec<E>> {
        self.query_entities(
            "SELECT data FROM entities WHERE kind = ? ORDER BY id ASC",
            params![E::KIND.as_str()],
        )
        .await
    }

    async fn children<E: Entity>(&self, parent_id: i64) -> Result<Vec<E>> {
        let mut children: Vec<E> = self
            .query_entities(
                "SELECT data FROM entities WHERE kind = ? AND parent_id = ? ORDER BY id ASC",
                params![E::KIND.as_str(), parent_id],
            )
            .await?;
        children.sort_by_key(|entity| entity.sort_key());
        Ok(children)
    }

    async fn insert<E: Entity>(&self, entity: &E) -> Result<()> {
        let data = serde_json::to_string(entity)?;
        self.conn
            .execute(
                "INSERT INTO entities (kind, id, parent_id, timestamp, data) \
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    E::KIND.as_str(),
                    entity.id(),
                    Self::parent_value(entity),
                    entity.timestamp(),
                    data
                ],
            )
            .await?;
        Ok(())
    }

    async fn update<E: Entity>(&self, entity: &E) -> Result<()> {
        let data = serde_json::to_string(entity)?;
        let rows = self
            .conn
            .execute(
                "UPDATE entities SET parent_id = ?, timestamp = ?, data = ? \
                 WHERE kind = ? AND id = ?",
                params![
                    Self::parent_value(entity),
                    entity.timestamp(),
                    data,
                    E::KIND.as_str(),
                    entity.id()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("{} {}", E::KIND, entity.id())));
        }
        Ok(())
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM entities WHERE kind = ? AND id = ?",
                params![kind.as_str(), id],
            )
            .await?;
        self.conn
            .execute(
                "DELETE FROM favorites WHERE kind = ? AND id = ?",
                params![kind.as_str(), id],
            )
            .await?;
        Ok(())
    }

    async fn ids(&self, kind: EntityKind) -> Result<BTreeSet<i64>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id FROM entities WHERE kind = ?",
                params![kind.as_str()],
            )
            .await?;

        let mut ids = BTreeSet::new();
        while let Some(row) = rows.next().await? {
            ids.insert(row.get::<i64>(0)?);
        }
        Ok(ids)
    }

    async fn pending_deletions(&self, kind: EntityKind) -> Result<Vec<LocalDeletion>> {
        let mut rows = self
            .conn
            .query(
                "SELECT delete_id FROM local_deletions WHERE kind = ? ORDER BY delete_id ASC",
                params![kind.as_str()],
            )
            .await?;

        let mut deletions = Vec::new();
        while let Some(row) = rows.next().await? {
            deletions.push(LocalDeletion::new(kind, row.get::<i64>(0)?));
        }
        Ok(deletions)
    }

    async fn notify_deletion(&self, deletion: &LocalDeletion) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR IGNORE INTO local_deletions (kind, delete_id) VALUES (?, ?)",
                params![deletion.kind.as_str(), deletion.delete_id],
            )
            .await?;
        Ok(())
    }

    async fn clear_deletion(&self, deletion: &LocalDeletion) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM local_deletions WHERE kind = ? AND delete_id = ?",
                params![deletion.kind.as_str(), deletion.delete_id],
            )
            .await?;
        Ok(())
    }
}
