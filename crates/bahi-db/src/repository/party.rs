//! # Party Repository
//!
//! Database operations for customers, vendors and investors.
//!
//! The running `balance` column is NOT written here. Only the ledger engine
//! moves balances, via additive updates inside its own transaction.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bahi_core::{Party, SyncStatus};

/// Repository for party database operations.
#[derive(Debug, Clone)]
pub struct PartyRepository {
    pool: SqlitePool,
}

impl PartyRepository {
    /// Creates a new PartyRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PartyRepository { pool }
    }

    /// Inserts a locally created party (always dirty).
    pub async fn insert(&self, party: &Party) -> DbResult<i64> {
        debug!(slug = %party.slug, name = %party.name, "Inserting party");

        let result = sqlx::query(
            r#"
            INSERT INTO parties (
                slug, business_slug, name, phone, role,
                opening_balance, balance, sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&party.slug)
        .bind(&party.business_slug)
        .bind(&party.name)
        .bind(&party.phone)
        .bind(party.role)
        .bind(party.opening_balance)
        .bind(party.balance)
        .bind(SyncStatus::Dirty)
        .bind(party.created_at)
        .bind(party.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Gets a party by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<Party>> {
        let party = sqlx::query_as::<_, Party>("SELECT * FROM parties WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(party)
    }

    /// Lists all parties for a business.
    pub async fn list(&self, business_slug: &str) -> DbResult<Vec<Party>> {
        let parties = sqlx::query_as::<_, Party>(
            "SELECT * FROM parties WHERE business_slug = ? ORDER BY name",
        )
        .bind(business_slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(parties)
    }

    /// Lists rows awaiting push.
    pub async fn list_dirty(&self, business_slug: &str) -> DbResult<Vec<Party>> {
        let parties = sqlx::query_as::<_, Party>(
            "SELECT * FROM parties WHERE business_slug = ? AND sync_status = ? ORDER BY id",
        )
        .bind(business_slug)
        .bind(SyncStatus::Dirty)
        .fetch_all(&self.pool)
        .await?;
        Ok(parties)
    }

    /// Updates a locally edited party.
    ///
    /// Bumps `updated_at` and puts the row back in the dirty set. Returns
    /// whether a row was updated.
    pub async fn update(&self, party: &Party) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE parties SET
                name = ?, phone = ?, role = ?, opening_balance = ?,
                sync_status = ?, updated_at = ?
            WHERE slug = ?
            "#,
        )
        .bind(&party.name)
        .bind(&party.phone)
        .bind(party.role)
        .bind(party.opening_balance)
        .bind(SyncStatus::Dirty)
        .bind(Utc::now())
        .bind(&party.slug)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Marks a pushed row as synced, guarded by the revision captured at
    /// push time.
    ///
    /// If the row was edited while its push was in flight, `updated_at` no
    /// longer matches, no row is updated, and the newer revision stays
    /// dirty for the next cycle. Returns whether the mark took effect.
    pub async fn mark_synced(&self, slug: &str, pushed_at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE parties SET sync_status = ? WHERE slug = ? AND updated_at = ?",
        )
        .bind(SyncStatus::Synced)
        .bind(slug)
        .bind(pushed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upserts a row pulled from the server (remote is authoritative).
    ///
    /// The local autoincrement id is preserved on conflict; everything else
    /// is overwritten and the row lands `Synced`.
    pub async fn upsert_remote(&self, party: &Party) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO parties (
                slug, business_slug, name, phone, role,
                opening_balance, balance, sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO UPDATE SET
                business_slug = excluded.business_slug,
                name = excluded.name,
                phone = excluded.phone,
                role = excluded.role,
                opening_balance = excluded.opening_balance,
                balance = excluded.balance,
                sync_status = excluded.sync_status,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&party.slug)
        .bind(&party.business_slug)
        .bind(&party.name)
        .bind(&party.phone)
        .bind(party.role)
        .bind(party.opening_balance)
        .bind(party.balance)
        .bind(SyncStatus::Synced)
        .bind(party.created_at)
        .bind(party.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes a party by slug (tombstone application).
    pub async fn delete_by_slug(&self, slug: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM parties WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
