//! # Sync Cursor Repository
//!
//! Pull cursors, one per entity kind plus a dedicated tombstone cursor.
//!
//! A cursor is the opaque server-issued timestamp string from the last
//! successful pull of that kind. The engine advances a cursor ONLY after
//! the page it covers has been fully applied, so a crash mid-pull replays
//! the page (upserts are idempotent) rather than skipping it.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::DbResult;
use bahi_core::EntityKind;

/// Key under which the tombstone stream's cursor is stored.
const TOMBSTONE_CURSOR_KEY: &str = "tombstones";

/// Repository for sync cursors.
#[derive(Debug, Clone)]
pub struct CursorRepository {
    pool: SqlitePool,
}

impl CursorRepository {
    /// Creates a new CursorRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CursorRepository { pool }
    }

    /// Gets the pull cursor for an entity kind, if one exists.
    ///
    /// `None` means this kind has never been pulled; the caller asks the
    /// server for everything.
    pub async fn get(&self, kind: EntityKind) -> DbResult<Option<String>> {
        self.get_raw(kind.as_str()).await
    }

    /// Advances the pull cursor for an entity kind.
    pub async fn set(&self, kind: EntityKind, cursor: &str) -> DbResult<()> {
        self.set_raw(kind.as_str(), cursor).await
    }

    /// Gets the tombstone stream's cursor.
    pub async fn get_tombstone(&self) -> DbResult<Option<String>> {
        self.get_raw(TOMBSTONE_CURSOR_KEY).await
    }

    /// Advances the tombstone stream's cursor.
    pub async fn set_tombstone(&self, cursor: &str) -> DbResult<()> {
        self.set_raw(TOMBSTONE_CURSOR_KEY, cursor).await
    }

    async fn get_raw(&self, key: &str) -> DbResult<Option<String>> {
        let cursor: Option<String> =
            sqlx::query_scalar("SELECT cursor FROM sync_cursors WHERE entity_kind = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(cursor)
    }

    async fn set_raw(&self, key: &str, cursor: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_cursors (entity_kind, cursor, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(entity_kind) DO UPDATE SET
                cursor = excluded.cursor,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(cursor)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
