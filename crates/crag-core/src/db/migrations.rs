//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master \
             WHERE type = 'table' AND name = 'schema_version')",
            (),
        )
        .await?;

    let exists = if let Some(row) = rows.next().await? {
        row.get::<i64>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version = if let Some(row) = rows.next().await? {
        row.get::<i64>(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: Initial schema
async fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Every catalog record, stored as JSON keyed by kind + server id
        "CREATE TABLE IF NOT EXISTS entities (
            kind TEXT NOT NULL,
            id INTEGER NOT NULL,
            parent_id INTEGER,
            timestamp INTEGER NOT NULL,
            data TEXT NOT NULL,
            PRIMARY KEY (kind, id)
        )",
        "CREATE INDEX IF NOT EXISTS idx_entities_parent ON entities(kind, parent_id)",
        // Tombstones waiting for a remote DELETE
        "CREATE TABLE IF NOT EXISTS local_deletions (
            kind TEXT NOT NULL,
            delete_id INTEGER NOT NULL,
            PRIMARY KEY (kind, delete_id)
        )",
        // Local-only bookmarks
        "CREATE TABLE IF NOT EXISTS favorites (
            kind TEXT NOT NULL,
            id INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (kind, id)
        )",
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for statement in statements {
        if let Err(error) = conn.execute(statement, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(error.into());
        }
    }

    conn.execute("COMMIT", ()).await?;
    tracing::debug!("Applied schema migration v1");
    Ok(())
}
