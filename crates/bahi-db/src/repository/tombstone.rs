//! # Tombstone Repository
//!
//! Append-only deletion log. Every local delete writes a row here so the
//! push cycle can tell the server, and other devices, to drop the record.
//!
//! Tombstones are never updated, only inserted and (once acknowledged)
//! marked synced. There is no `updated_at` guard because the row cannot
//! change after it is written.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bahi_core::{DeletedRecord, EntityKind, SyncStatus};

/// Repository for deletion tombstones.
#[derive(Debug, Clone)]
pub struct TombstoneRepository {
    pool: SqlitePool,
}

impl TombstoneRepository {
    /// Creates a new TombstoneRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TombstoneRepository { pool }
    }

    /// Records a deletion.
    pub async fn insert(&self, record: &DeletedRecord) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        insert_tombstone_in(&mut conn, record).await
    }

    /// Lists tombstones awaiting push.
    pub async fn list_dirty(&self, business_slug: &str) -> DbResult<Vec<DeletedRecord>> {
        let records = sqlx::query_as::<_, DeletedRecord>(
            "SELECT * FROM deleted_records WHERE business_slug = ? AND sync_status = ? ORDER BY id",
        )
        .bind(business_slug)
        .bind(SyncStatus::Dirty)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Marks an acknowledged tombstone as synced.
    pub async fn mark_synced(&self, entity_kind: EntityKind, record_slug: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE deleted_records SET sync_status = ? WHERE entity_kind = ? AND record_slug = ?",
        )
        .bind(SyncStatus::Synced)
        .bind(entity_kind)
        .bind(record_slug)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Writes a tombstone on the given connection (ledger delete path).
pub(crate) async fn insert_tombstone_in(
    conn: &mut SqliteConnection,
    record: &DeletedRecord,
) -> DbResult<i64> {
    debug!(
        kind = record.entity_kind.as_str(),
        slug = %record.record_slug,
        "Recording tombstone"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO deleted_records (
            business_slug, entity_kind, record_slug, deleted_at, sync_status
        ) VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.business_slug)
    .bind(record.entity_kind)
    .bind(&record.record_slug)
    .bind(record.deleted_at)
    .bind(record.sync_status)
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}
