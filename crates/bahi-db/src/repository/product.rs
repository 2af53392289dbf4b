//! # Product Repository
//!
//! Database operations for products and their per-warehouse stock rows.
//!
//! ## Stock Rows Are Lazy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  product_stocks has one row per (product, warehouse) pair that      │
//! │  the ledger engine has TOUCHED. A missing row means quantity 0.     │
//! │                                                                     │
//! │  The `current_quantity` and `avg_purchase_price` columns are        │
//! │  written only by the ledger engine, under the commit lock.          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bahi_core::{Product, ProductFlagMap, ProductFlags, ProductStock, StockLevelMap, SyncStatus};

/// Repository for product and stock database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Inserts a locally created product (always dirty).
    pub async fn insert(&self, product: &Product) -> DbResult<i64> {
        debug!(slug = %product.slug, name = %product.name, "Inserting product");

        let result = sqlx::query(
            r#"
            INSERT INTO products (
                slug, business_slug, name, sale_price, purchase_price,
                avg_purchase_price, is_service, is_recipe,
                category_slug, quantity_unit_slug,
                sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&product.slug)
        .bind(&product.business_slug)
        .bind(&product.name)
        .bind(product.sale_price)
        .bind(product.purchase_price)
        .bind(product.avg_purchase_price)
        .bind(product.is_service)
        .bind(product.is_recipe)
        .bind(&product.category_slug)
        .bind(&product.quantity_unit_slug)
        .bind(SyncStatus::Dirty)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Gets a product by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT * FROM products WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists all products for a business.
    pub async fn list(&self, business_slug: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE business_slug = ? ORDER BY name",
        )
        .bind(business_slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Loads the service/recipe flags for a set of products.
    ///
    /// Used by the ledger engine to feed the effect calculator. Products
    /// not found locally are simply absent from the map (and treated as
    /// plain physical products downstream).
    pub async fn flags_for(&self, slugs: &[String]) -> DbResult<ProductFlagMap> {
        let mut flags = ProductFlagMap::new();
        if slugs.is_empty() {
            return Ok(flags);
        }

        let placeholders = vec!["?"; slugs.len()].join(", ");
        let sql = format!(
            "SELECT slug, is_service, is_recipe FROM products WHERE slug IN ({placeholders})"
        );
        let mut query = sqlx::query_as::<_, (String, bool, bool)>(&sql);
        for slug in slugs {
            query = query.bind(slug);
        }

        for (slug, is_service, is_recipe) in query.fetch_all(&self.pool).await? {
            flags.insert(
                slug,
                ProductFlags {
                    is_service,
                    is_recipe,
                },
            );
        }
        Ok(flags)
    }

    /// Lists product rows awaiting push.
    pub async fn list_dirty(&self, business_slug: &str) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT * FROM products WHERE business_slug = ? AND sync_status = ? ORDER BY id",
        )
        .bind(business_slug)
        .bind(SyncStatus::Dirty)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    /// Marks a pushed product as synced if it was not edited since push time.
    pub async fn mark_synced(&self, slug: &str, pushed_at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE products SET sync_status = ? WHERE slug = ? AND updated_at = ?",
        )
        .bind(SyncStatus::Synced)
        .bind(slug)
        .bind(pushed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upserts a product pulled from the server (remote is authoritative).
    pub async fn upsert_remote(&self, product: &Product) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO products (
                slug, business_slug, name, sale_price, purchase_price,
                avg_purchase_price, is_service, is_recipe,
                category_slug, quantity_unit_slug,
                sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO UPDATE SET
                business_slug = excluded.business_slug,
                name = excluded.name,
                sale_price = excluded.sale_price,
                purchase_price = excluded.purchase_price,
                avg_purchase_price = excluded.avg_purchase_price,
                is_service = excluded.is_service,
                is_recipe = excluded.is_recipe,
                category_slug = excluded.category_slug,
                quantity_unit_slug = excluded.quantity_unit_slug,
                sync_status = excluded.sync_status,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&product.slug)
        .bind(&product.business_slug)
        .bind(&product.name)
        .bind(product.sale_price)
        .bind(product.purchase_price)
        .bind(product.avg_purchase_price)
        .bind(product.is_service)
        .bind(product.is_recipe)
        .bind(&product.category_slug)
        .bind(&product.quantity_unit_slug)
        .bind(SyncStatus::Synced)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes a product by slug (tombstone application).
    pub async fn delete_by_slug(&self, slug: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM products WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Product Stocks
    // =========================================================================

    /// Gets the stock row for one (product, warehouse) pair.
    pub async fn get_stock(
        &self,
        product_slug: &str,
        warehouse_slug: &str,
    ) -> DbResult<Option<ProductStock>> {
        let stock = sqlx::query_as::<_, ProductStock>(
            "SELECT * FROM product_stocks WHERE product_slug = ? AND warehouse_slug = ?",
        )
        .bind(product_slug)
        .bind(warehouse_slug)
        .fetch_optional(&self.pool)
        .await?;
        Ok(stock)
    }

    /// Loads current quantities for a set of (product, warehouse) pairs.
    ///
    /// Pairs without a stock row are absent from the map; the stock check
    /// treats them as zero.
    pub async fn stock_levels(&self, pairs: &[(String, String)]) -> DbResult<StockLevelMap> {
        let mut levels = StockLevelMap::new();
        for (product_slug, warehouse_slug) in pairs {
            let quantity: Option<f64> = sqlx::query_scalar(
                "SELECT current_quantity FROM product_stocks \
                 WHERE product_slug = ? AND warehouse_slug = ?",
            )
            .bind(product_slug)
            .bind(warehouse_slug)
            .fetch_optional(&self.pool)
            .await?;
            if let Some(quantity) = quantity {
                levels.insert((product_slug.clone(), warehouse_slug.clone()), quantity);
            }
        }
        Ok(levels)
    }

    /// Lists stock rows awaiting push.
    pub async fn list_dirty_stocks(&self, business_slug: &str) -> DbResult<Vec<ProductStock>> {
        let stocks = sqlx::query_as::<_, ProductStock>(
            "SELECT * FROM product_stocks WHERE business_slug = ? AND sync_status = ? ORDER BY id",
        )
        .bind(business_slug)
        .bind(SyncStatus::Dirty)
        .fetch_all(&self.pool)
        .await?;
        Ok(stocks)
    }

    /// Marks a pushed stock row as synced if not edited since push time.
    pub async fn mark_stock_synced(&self, slug: &str, pushed_at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE product_stocks SET sync_status = ? WHERE slug = ? AND updated_at = ?",
        )
        .bind(SyncStatus::Synced)
        .bind(slug)
        .bind(pushed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upserts a stock row pulled from the server.
    ///
    /// Conflict target is the (product, warehouse) pair: two devices that
    /// each lazily created the row for the same pair converge on one row.
    pub async fn upsert_remote_stock(&self, stock: &ProductStock) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO product_stocks (
                slug, business_slug, product_slug, warehouse_slug,
                opening_quantity, current_quantity, minimum_quantity, maximum_quantity,
                sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_slug, warehouse_slug) DO UPDATE SET
                slug = excluded.slug,
                business_slug = excluded.business_slug,
                opening_quantity = excluded.opening_quantity,
                current_quantity = excluded.current_quantity,
                minimum_quantity = excluded.minimum_quantity,
                maximum_quantity = excluded.maximum_quantity,
                sync_status = excluded.sync_status,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&stock.slug)
        .bind(&stock.business_slug)
        .bind(&stock.product_slug)
        .bind(&stock.warehouse_slug)
        .bind(stock.opening_quantity)
        .bind(stock.current_quantity)
        .bind(stock.minimum_quantity)
        .bind(stock.maximum_quantity)
        .bind(SyncStatus::Synced)
        .bind(stock.created_at)
        .bind(stock.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes a stock row by slug (tombstone application).
    pub async fn delete_stock_by_slug(&self, slug: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM product_stocks WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
