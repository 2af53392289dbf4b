//! # Transaction Repository
//!
//! Database operations for transaction headers and their line items.
//!
//! ## Write Path Split
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  Reads (pool methods)        Writes (connection methods)            │
//! │  ──────────────────────      ─────────────────────────────────────  │
//! │  get_by_slug                 insert_in / replace_in / delete_in     │
//! │  list_dirty                                                         │
//! │  children_of                 The `*_in` methods take the live       │
//! │  mark_synced                 connection of the ledger engine's      │
//! │                              SQLite transaction, so header, lines   │
//! │                              and balance deltas commit atomically.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Details are always replaced wholesale; there is no per-line update.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use bahi_core::{SyncStatus, Transaction, TransactionDetail};

/// Repository for transaction database operations.
#[derive(Debug, Clone)]
pub struct TransactionRepository {
    pool: SqlitePool,
}

impl TransactionRepository {
    /// Creates a new TransactionRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TransactionRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a transaction with its details by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<Transaction>> {
        let header =
            sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;

        let Some(mut tx) = header else {
            return Ok(None);
        };
        tx.details = self.details_of(slug).await?;
        Ok(Some(tx))
    }

    /// Loads the detail rows for one transaction.
    pub async fn details_of(&self, transaction_slug: &str) -> DbResult<Vec<TransactionDetail>> {
        let details = sqlx::query_as::<_, TransactionDetail>(
            "SELECT * FROM transaction_details WHERE transaction_slug = ? ORDER BY id",
        )
        .bind(transaction_slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(details)
    }

    /// Lists the children of a composite transaction, details included.
    pub async fn children_of(&self, parent_slug: &str) -> DbResult<Vec<Transaction>> {
        let headers = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE parent_slug = ? ORDER BY id",
        )
        .bind(parent_slug)
        .fetch_all(&self.pool)
        .await?;

        let mut children = Vec::with_capacity(headers.len());
        for mut child in headers {
            child.details = self.details_of(&child.slug).await?;
            children.push(child);
        }
        Ok(children)
    }

    /// Lists transactions awaiting push, details included.
    pub async fn list_dirty(&self, business_slug: &str) -> DbResult<Vec<Transaction>> {
        let headers = sqlx::query_as::<_, Transaction>(
            "SELECT * FROM transactions WHERE business_slug = ? AND sync_status = ? ORDER BY id",
        )
        .bind(business_slug)
        .bind(SyncStatus::Dirty)
        .fetch_all(&self.pool)
        .await?;

        let mut transactions = Vec::with_capacity(headers.len());
        for mut tx in headers {
            tx.details = self.details_of(&tx.slug).await?;
            transactions.push(tx);
        }
        Ok(transactions)
    }

    // =========================================================================
    // Sync writes
    // =========================================================================

    /// Marks a pushed transaction as synced if not edited since push time.
    pub async fn mark_synced(&self, slug: &str, pushed_at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE transactions SET sync_status = ? WHERE slug = ? AND updated_at = ?",
        )
        .bind(SyncStatus::Synced)
        .bind(slug)
        .bind(pushed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upserts a transaction pulled from the server, details and all.
    ///
    /// Remote rows arrive with their balance effects already reflected in
    /// the remote balances, so this NEVER runs the effect calculator. It
    /// is a plain replace: header upsert, details wiped and reinserted,
    /// everything marked `Synced`.
    pub async fn upsert_remote(&self, tx: &Transaction) -> DbResult<()> {
        let mut conn = self.pool.begin().await?;

        let mut synced = tx.clone();
        synced.sync_status = SyncStatus::Synced;
        insert_or_replace_header_in(&mut conn, &synced).await?;
        delete_details_in(&mut conn, &tx.slug).await?;
        insert_details_in(&mut conn, &tx.details).await?;

        conn.commit().await?;
        Ok(())
    }

    /// Deletes a transaction and its details by slug (tombstone
    /// application; the balance reversal already happened on the device
    /// that deleted it).
    pub async fn delete_by_slug(&self, slug: &str) -> DbResult<bool> {
        let mut conn = self.pool.begin().await?;
        delete_details_in(&mut conn, slug).await?;
        let result = sqlx::query("DELETE FROM transactions WHERE slug = ?")
            .bind(slug)
            .execute(&mut *conn)
            .await?;
        conn.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// In-transaction writes (used by the ledger engine)
// =============================================================================

/// Inserts a transaction header on the given connection.
pub(crate) async fn insert_header_in(
    conn: &mut SqliteConnection,
    tx: &Transaction,
) -> DbResult<()> {
    debug!(slug = %tx.slug, kind = tx.transaction_type.display_name(), "Inserting transaction");

    sqlx::query(
        r#"
        INSERT INTO transactions (
            slug, business_slug, transaction_type, party_slug,
            to_payment_method_slug, from_payment_method_slug,
            warehouse_slug, to_warehouse_slug, parent_slug,
            total_paid, discount, discount_mode, tax, tax_mode,
            additional_charges, grand_total, description, transaction_date,
            sync_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&tx.slug)
    .bind(&tx.business_slug)
    .bind(tx.transaction_type)
    .bind(&tx.party_slug)
    .bind(&tx.to_payment_method_slug)
    .bind(&tx.from_payment_method_slug)
    .bind(&tx.warehouse_slug)
    .bind(&tx.to_warehouse_slug)
    .bind(&tx.parent_slug)
    .bind(tx.total_paid)
    .bind(tx.discount)
    .bind(tx.discount_mode)
    .bind(tx.tax)
    .bind(tx.tax_mode)
    .bind(tx.additional_charges)
    .bind(tx.grand_total)
    .bind(&tx.description)
    .bind(tx.transaction_date)
    .bind(tx.sync_status)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Inserts or replaces a transaction header by slug.
pub(crate) async fn insert_or_replace_header_in(
    conn: &mut SqliteConnection,
    tx: &Transaction,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO transactions (
            slug, business_slug, transaction_type, party_slug,
            to_payment_method_slug, from_payment_method_slug,
            warehouse_slug, to_warehouse_slug, parent_slug,
            total_paid, discount, discount_mode, tax, tax_mode,
            additional_charges, grand_total, description, transaction_date,
            sync_status, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(slug) DO UPDATE SET
            business_slug = excluded.business_slug,
            transaction_type = excluded.transaction_type,
            party_slug = excluded.party_slug,
            to_payment_method_slug = excluded.to_payment_method_slug,
            from_payment_method_slug = excluded.from_payment_method_slug,
            warehouse_slug = excluded.warehouse_slug,
            to_warehouse_slug = excluded.to_warehouse_slug,
            parent_slug = excluded.parent_slug,
            total_paid = excluded.total_paid,
            discount = excluded.discount,
            discount_mode = excluded.discount_mode,
            tax = excluded.tax,
            tax_mode = excluded.tax_mode,
            additional_charges = excluded.additional_charges,
            grand_total = excluded.grand_total,
            description = excluded.description,
            transaction_date = excluded.transaction_date,
            sync_status = excluded.sync_status,
            created_at = excluded.created_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&tx.slug)
    .bind(&tx.business_slug)
    .bind(tx.transaction_type)
    .bind(&tx.party_slug)
    .bind(&tx.to_payment_method_slug)
    .bind(&tx.from_payment_method_slug)
    .bind(&tx.warehouse_slug)
    .bind(&tx.to_warehouse_slug)
    .bind(&tx.parent_slug)
    .bind(tx.total_paid)
    .bind(tx.discount)
    .bind(tx.discount_mode)
    .bind(tx.tax)
    .bind(tx.tax_mode)
    .bind(tx.additional_charges)
    .bind(tx.grand_total)
    .bind(&tx.description)
    .bind(tx.transaction_date)
    .bind(tx.sync_status)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Inserts detail rows on the given connection.
pub(crate) async fn insert_details_in(
    conn: &mut SqliteConnection,
    details: &[TransactionDetail],
) -> DbResult<()> {
    for detail in details {
        sqlx::query(
            r#"
            INSERT INTO transaction_details (
                slug, business_slug, transaction_slug, product_slug,
                quantity, unit_price, tax, discount, profit,
                quantity_unit_slug, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&detail.slug)
        .bind(&detail.business_slug)
        .bind(&detail.transaction_slug)
        .bind(&detail.product_slug)
        .bind(detail.quantity)
        .bind(detail.unit_price)
        .bind(detail.tax)
        .bind(detail.discount)
        .bind(detail.profit)
        .bind(&detail.quantity_unit_slug)
        .bind(detail.created_at)
        .bind(detail.updated_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Removes all detail rows of one transaction on the given connection.
pub(crate) async fn delete_details_in(
    conn: &mut SqliteConnection,
    transaction_slug: &str,
) -> DbResult<()> {
    sqlx::query("DELETE FROM transaction_details WHERE transaction_slug = ?")
        .bind(transaction_slug)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Removes a transaction header on the given connection.
pub(crate) async fn delete_header_in(
    conn: &mut SqliteConnection,
    slug: &str,
) -> DbResult<bool> {
    let result = sqlx::query("DELETE FROM transactions WHERE slug = ?")
        .bind(slug)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
