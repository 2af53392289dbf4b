//! # Ledger Mutation Engine
//!
//! The ONLY write path for party balances, payment method amounts, stock
//! quantities and average purchase prices.
//!
//! ## Commit Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Ledger Commit                                  │
//! │                                                                     │
//! │  1. VALIDATE        ensure_valid() per transaction kind             │
//! │  2. LOCK            acquire the global commit lock                  │
//! │  3. COMPUTE         net_effects() from bahi-core (pure)             │
//! │  4. CHECK STOCK     net deltas vs persisted quantities              │
//! │  5. ONE SQLITE TX   header + details + every delta + tombstones     │
//! │  6. UNLOCK          (guard drops)                                   │
//! │                                                                     │
//! │  A rejected commit (validation, insufficient stock, storage error)  │
//! │  leaves the database EXACTLY as it was.                             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## The Commit Lock
//! Balance and stock deltas are associative `SET x = x + ?` updates and
//! would serialize fine on SQLite alone. The average purchase price is
//! not: it is a read-recompute-write over (quantity, price), so commits
//! hold a global `tokio::sync::Mutex` for their whole pipeline. One ledger
//! mutation is in flight at a time, by construction.
//!
//! ## Update = Reverse Then Apply
//! Editing never patches rows in place. The old transaction's effects are
//! re-derived through its reverse kind, merged with the new transaction's
//! effects, and the NET is applied. Stock headroom is therefore only
//! needed for the net change.

use std::sync::Arc;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::product::ProductRepository;
use crate::repository::tombstone::insert_tombstone_in;
use crate::repository::transaction::{
    delete_details_in, delete_header_in, insert_details_in, insert_header_in,
    insert_or_replace_header_in, TransactionRepository,
};
use bahi_core::{
    ensure_valid, line_profit, net_effects, new_slug, recompute_avg_price, reversal_effects,
    totals, DeletedRecord, EntityKind, LedgerEffects, SyncStatus, Transaction, TransactionType,
};

/// The ledger mutation engine.
///
/// Cheap to clone; obtained from [`crate::Database::ledger`]. All clones
/// share the same commit lock.
#[derive(Debug, Clone)]
pub struct LedgerEngine {
    pool: SqlitePool,
    commit_lock: Arc<Mutex<()>>,
}

impl LedgerEngine {
    /// Creates a new LedgerEngine.
    pub(crate) fn new(pool: SqlitePool, commit_lock: Arc<Mutex<()>>) -> Self {
        LedgerEngine { pool, commit_lock }
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Commits a new transaction: validates, checks stock, then writes the
    /// header, details and every balance delta atomically.
    ///
    /// Returns the stored transaction (grand total derived, profits set,
    /// marked dirty).
    pub async fn commit(&self, tx: Transaction) -> DbResult<Transaction> {
        ensure_valid(&tx)?;
        let _guard = self.commit_lock.lock().await;
        self.commit_locked(tx).await
    }

    async fn commit_locked(&self, mut tx: Transaction) -> DbResult<Transaction> {
        let now = Utc::now();
        tx.sync_status = SyncStatus::Dirty;
        tx.updated_at = now;
        finalize_lines(&mut tx);

        let products = ProductRepository::new(self.pool.clone());
        let flags = products.flags_for(&line_products(&tx)).await?;
        let effects = net_effects(None, &tx, &flags);

        let level_keys: Vec<_> = effects.stock_deltas.keys().cloned().collect();
        let levels = products.stock_levels(&level_keys).await?;
        effects.check_stock(&levels)?;

        self.set_profits(&mut tx).await?;

        let mut conn = self.pool.begin().await?;
        insert_header_in(&mut conn, &tx).await?;
        insert_details_in(&mut conn, &tx.details).await?;
        self.apply_effects(&mut conn, &tx.business_slug, &effects).await?;
        conn.commit().await?;

        info!(
            slug = %tx.slug,
            kind = tx.transaction_type.display_name(),
            grand_total = tx.grand_total,
            "Transaction committed"
        );
        Ok(tx)
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Replaces a stored transaction with an edited version.
    ///
    /// Applies `reverse(old) + apply(new)` as one net change. The header is
    /// replaced and the details are deleted and reinserted wholesale.
    pub async fn update(&self, mut tx: Transaction) -> DbResult<Transaction> {
        ensure_valid(&tx)?;
        let _guard = self.commit_lock.lock().await;

        let repo = TransactionRepository::new(self.pool.clone());
        let old = repo
            .get_by_slug(&tx.slug)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", &tx.slug))?;

        let now = Utc::now();
        tx.id = old.id;
        tx.created_at = old.created_at;
        tx.updated_at = now;
        tx.sync_status = SyncStatus::Dirty;
        finalize_lines(&mut tx);

        let products = ProductRepository::new(self.pool.clone());
        let mut product_slugs = line_products(&old);
        product_slugs.extend(line_products(&tx));
        let flags = products.flags_for(&product_slugs).await?;
        let effects = net_effects(Some(&old), &tx, &flags);

        let level_keys: Vec<_> = effects.stock_deltas.keys().cloned().collect();
        let levels = products.stock_levels(&level_keys).await?;
        effects.check_stock(&levels)?;

        self.set_profits(&mut tx).await?;

        let mut conn = self.pool.begin().await?;
        insert_or_replace_header_in(&mut conn, &tx).await?;
        delete_details_in(&mut conn, &tx.slug).await?;
        insert_details_in(&mut conn, &tx.details).await?;
        self.apply_effects(&mut conn, &tx.business_slug, &effects).await?;
        conn.commit().await?;

        info!(slug = %tx.slug, "Transaction updated");
        Ok(tx)
    }

    // =========================================================================
    // Delete
    // =========================================================================

    /// Deletes a transaction: reverses its effects, removes the header and
    /// details, and records a tombstone. Children of a composite parent are
    /// deleted (and reversed) along with it.
    pub async fn delete(&self, slug: &str) -> DbResult<()> {
        let _guard = self.commit_lock.lock().await;

        let repo = TransactionRepository::new(self.pool.clone());
        let tx = repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| DbError::not_found("Transaction", slug))?;

        let mut targets = vec![tx];
        targets.extend(repo.children_of(slug).await?);

        let products = ProductRepository::new(self.pool.clone());
        let mut product_slugs = Vec::new();
        for target in &targets {
            product_slugs.extend(line_products(target));
        }
        let flags = products.flags_for(&product_slugs).await?;

        let mut effects = LedgerEffects::default();
        for target in &targets {
            effects.merge(reversal_effects(target, &flags));
        }

        let level_keys: Vec<_> = effects.stock_deltas.keys().cloned().collect();
        let levels = products.stock_levels(&level_keys).await?;
        effects.check_stock(&levels)?;

        let business_slug = targets[0].business_slug.clone();
        let mut conn = self.pool.begin().await?;
        for target in &targets {
            delete_details_in(&mut conn, &target.slug).await?;
            delete_header_in(&mut conn, &target.slug).await?;
            let tombstone =
                DeletedRecord::new(&business_slug, EntityKind::Transaction, &target.slug);
            insert_tombstone_in(&mut conn, &tombstone).await?;
        }
        self.apply_effects(&mut conn, &business_slug, &effects).await?;
        conn.commit().await?;

        info!(slug = %slug, removed = targets.len(), "Transaction deleted");
        Ok(())
    }

    // =========================================================================
    // Composite Transactions
    // =========================================================================

    /// Commits an effect-free parent and its children atomically.
    ///
    /// Children get `parent_slug` set, each is validated individually, and
    /// their merged effects are stock-checked and applied as one unit.
    pub async fn commit_composite(
        &self,
        mut parent: Transaction,
        mut children: Vec<Transaction>,
    ) -> DbResult<Transaction> {
        for child in &mut children {
            child.parent_slug = Some(parent.slug.clone());
        }
        ensure_valid(&parent)?;
        for child in &children {
            ensure_valid(child)?;
        }

        let _guard = self.commit_lock.lock().await;
        let now = Utc::now();

        parent.sync_status = SyncStatus::Dirty;
        parent.updated_at = now;

        let products = ProductRepository::new(self.pool.clone());
        let mut product_slugs = Vec::new();
        for child in &mut children {
            child.sync_status = SyncStatus::Dirty;
            child.updated_at = now;
            finalize_lines(child);
            product_slugs.extend(line_products(child));
        }
        let flags = products.flags_for(&product_slugs).await?;

        let mut effects = net_effects(None, &parent, &flags);
        for child in &children {
            effects.merge(net_effects(None, child, &flags));
        }

        let level_keys: Vec<_> = effects.stock_deltas.keys().cloned().collect();
        let levels = products.stock_levels(&level_keys).await?;
        effects.check_stock(&levels)?;

        for child in &mut children {
            self.set_profits(child).await?;
        }

        let mut conn = self.pool.begin().await?;
        insert_header_in(&mut conn, &parent).await?;
        insert_details_in(&mut conn, &parent.details).await?;
        for child in &children {
            insert_header_in(&mut conn, child).await?;
            insert_details_in(&mut conn, &child.details).await?;
        }
        self.apply_effects(&mut conn, &parent.business_slug, &effects).await?;
        conn.commit().await?;

        info!(
            slug = %parent.slug,
            children = children.len(),
            "Composite transaction committed"
        );
        Ok(parent)
    }

    /// Commits a manufacture: consumes ingredient stock and produces the
    /// recipe product, at a unit cost derived from the ingredients.
    ///
    /// Builds an effect-free `Manufacture` parent with two children:
    /// a `Sale` consuming the ingredients and a `Purchase` producing
    /// `output_quantity` of the recipe product. The purchase child is what
    /// lets a recipe product gain stock and an average price.
    pub async fn commit_manufacture(
        &self,
        business_slug: &str,
        warehouse_slug: &str,
        recipe_product_slug: &str,
        output_quantity: f64,
        ingredients: &[(String, f64, f64)],
    ) -> DbResult<Transaction> {
        let mut parent = Transaction::new(business_slug, TransactionType::Manufacture);
        parent.warehouse_slug = Some(warehouse_slug.to_string());

        let mut consume = Transaction::new(business_slug, TransactionType::Sale);
        consume.warehouse_slug = Some(warehouse_slug.to_string());
        for (product_slug, quantity, unit_cost) in ingredients {
            consume.details.push(bahi_core::TransactionDetail::new(
                business_slug,
                &consume.slug,
                product_slug,
                *quantity,
                *unit_cost,
            ));
        }

        let total_cost: f64 = ingredients.iter().map(|(_, q, p)| q * p).sum();
        let unit_cost = if output_quantity > 0.0 {
            totals::round_to_2(total_cost / output_quantity)
        } else {
            0.0
        };

        let mut produce = Transaction::new(business_slug, TransactionType::Purchase);
        produce.warehouse_slug = Some(warehouse_slug.to_string());
        produce.details.push(bahi_core::TransactionDetail::new(
            business_slug,
            &produce.slug,
            recipe_product_slug,
            output_quantity,
            unit_cost,
        ));

        debug!(
            recipe = %recipe_product_slug,
            output_quantity,
            unit_cost,
            "Committing manufacture"
        );
        self.commit_composite(parent, vec![consume, produce]).await
    }

    // =========================================================================
    // Delta Application
    // =========================================================================

    /// Applies a computed effect set on the given connection.
    ///
    /// Balance and stock moves are associative additive updates. Average
    /// price adjustments are replayed in order against a locally tracked
    /// quantity, BEFORE the stock deltas land, so each adjustment sees the
    /// pre-adjustment quantity.
    async fn apply_effects(
        &self,
        conn: &mut SqliteConnection,
        business_slug: &str,
        effects: &LedgerEffects,
    ) -> DbResult<()> {
        let now = Utc::now();

        for (slug, delta) in &effects.party_deltas {
            if *delta == 0.0 {
                continue;
            }
            debug!(party = %slug, delta, "Applying party balance delta");
            let result = sqlx::query(
                "UPDATE parties SET balance = balance + ?, sync_status = ?, updated_at = ? \
                 WHERE slug = ?",
            )
            .bind(delta)
            .bind(SyncStatus::Dirty)
            .bind(now)
            .bind(slug)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Party", slug));
            }
        }

        for (slug, delta) in &effects.cash_deltas {
            if *delta == 0.0 {
                continue;
            }
            debug!(method = %slug, delta, "Applying payment method delta");
            let result = sqlx::query(
                "UPDATE payment_methods SET amount = amount + ?, sync_status = ?, updated_at = ? \
                 WHERE slug = ?",
            )
            .bind(delta)
            .bind(SyncStatus::Dirty)
            .bind(now)
            .bind(slug)
            .execute(&mut *conn)
            .await?;
            if result.rows_affected() == 0 {
                return Err(DbError::not_found("Payment method", slug));
            }
        }

        // Price adjustments first: each needs the quantity as it stood
        // before this commit's own stock movement.
        let mut tracked_qty = std::collections::BTreeMap::new();
        for adjustment in &effects.price_adjustments {
            let product_slug = &adjustment.product_slug;

            let qty = match tracked_qty.get(product_slug) {
                Some(q) => *q,
                None => {
                    let q: f64 = sqlx::query_scalar(
                        "SELECT COALESCE(SUM(current_quantity), 0.0) FROM product_stocks \
                         WHERE product_slug = ?",
                    )
                    .bind(product_slug)
                    .fetch_one(&mut *conn)
                    .await?;
                    q
                }
            };

            let avg: f64 =
                sqlx::query_scalar("SELECT avg_purchase_price FROM products WHERE slug = ?")
                    .bind(product_slug)
                    .fetch_optional(&mut *conn)
                    .await?
                    .ok_or_else(|| DbError::not_found("Product", product_slug))?;

            if let Some(new_avg) = recompute_avg_price(qty, avg, adjustment) {
                debug!(product = %product_slug, old_avg = avg, new_avg, "Updating average price");
                sqlx::query(
                    "UPDATE products SET avg_purchase_price = ?, sync_status = ?, updated_at = ? \
                     WHERE slug = ?",
                )
                .bind(new_avg)
                .bind(SyncStatus::Dirty)
                .bind(now)
                .bind(product_slug)
                .execute(&mut *conn)
                .await?;
            }

            let moved = match adjustment.update {
                bahi_core::PriceUpdate::Accumulate => adjustment.quantity.abs(),
                bahi_core::PriceUpdate::Decumulate => -adjustment.quantity.abs(),
            };
            tracked_qty.insert(product_slug.clone(), qty + moved);
        }

        for ((product_slug, warehouse_slug), delta) in &effects.stock_deltas {
            if *delta == 0.0 {
                continue;
            }
            debug!(
                product = %product_slug,
                warehouse = %warehouse_slug,
                delta,
                "Applying stock delta"
            );

            // Lazy row creation: first touch of a (product, warehouse)
            // pair materializes its stock row at zero.
            sqlx::query(
                r#"
                INSERT INTO product_stocks (
                    slug, business_slug, product_slug, warehouse_slug,
                    opening_quantity, current_quantity, minimum_quantity, maximum_quantity,
                    sync_status, created_at, updated_at
                ) VALUES (?, ?, ?, ?, 0, 0, 0, 0, ?, ?, ?)
                ON CONFLICT(product_slug, warehouse_slug) DO NOTHING
                "#,
            )
            .bind(new_slug())
            .bind(business_slug)
            .bind(product_slug)
            .bind(warehouse_slug)
            .bind(SyncStatus::Dirty)
            .bind(now)
            .bind(now)
            .execute(&mut *conn)
            .await?;

            sqlx::query(
                "UPDATE product_stocks \
                 SET current_quantity = current_quantity + ?, sync_status = ?, updated_at = ? \
                 WHERE product_slug = ? AND warehouse_slug = ?",
            )
            .bind(delta)
            .bind(SyncStatus::Dirty)
            .bind(now)
            .bind(product_slug)
            .bind(warehouse_slug)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Stamps per-line profit from the product's current average price.
    async fn set_profits(&self, tx: &mut Transaction) -> DbResult<()> {
        if tx.details.is_empty() {
            return Ok(());
        }
        let ty = tx.transaction_type;
        if ty != TransactionType::Sale && ty != TransactionType::CustomerReturn {
            return Ok(());
        }

        for detail in &mut tx.details {
            let avg: Option<f64> =
                sqlx::query_scalar("SELECT avg_purchase_price FROM products WHERE slug = ?")
                    .bind(&detail.product_slug)
                    .fetch_optional(&self.pool)
                    .await?;
            detail.profit = line_profit(ty, detail, avg.unwrap_or(0.0));
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Derives the grand total from the lines and points every detail at the
/// header. Headers without lines (cash payments, expenses, records) keep
/// the caller-provided grand total.
fn finalize_lines(tx: &mut Transaction) {
    for detail in &mut tx.details {
        detail.transaction_slug = tx.slug.clone();
        detail.business_slug = tx.business_slug.clone();
    }
    if !tx.details.is_empty() {
        tx.grand_total = totals::grand_total(tx);
    }
}

fn line_products(tx: &Transaction) -> Vec<String> {
    tx.details.iter().map(|d| d.product_slug.clone()).collect()
}
