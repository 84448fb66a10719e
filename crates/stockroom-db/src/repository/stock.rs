//! # Stock Record Repository
//!
//! Reads and version-checked writes of `stock_records`.
//!
//! ## Optimistic Concurrency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  read    SELECT ... WHERE product_id = ?            → version 4         │
//! │  plan    (pure, stockroom-core)                                         │
//! │  write   UPDATE ... SET version = version + 1                           │
//! │          WHERE product_id = ? AND version = 4                           │
//! │          RETURNING ...                                                  │
//! │                                                                         │
//! │          row returned   → won, record is at version 5                   │
//! │          no row         → somebody else wrote first, re-read and retry  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `available_stock` and `is_low_stock` are computed by stockroom-core, never
//! stored. The low-stock query repeats `current - reserved <= threshold` in
//! SQL only to filter and sort; every returned row is re-derived in Rust.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::{Page, Product, ProductStatus, StockFilter, StockRecord, StockSnapshot};

/// Repository for stock record operations.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

/// Product and stock columns from one joined row.
#[derive(Debug, FromRow)]
struct SnapshotRow {
    id: String,
    sku: String,
    name: String,
    category_id: Option<String>,
    price_cents: i64,
    cost_cents: i64,
    reorder_threshold: i64,
    status: ProductStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    current_stock: i64,
    reserved_stock: i64,
    warehouse: Option<String>,
    shelf: Option<String>,
    cost_per_unit_cents: i64,
    version: i64,
    last_updated: DateTime<Utc>,
}

impl From<SnapshotRow> for StockSnapshot {
    fn from(row: SnapshotRow) -> Self {
        let record = StockRecord {
            product_id: row.id.clone(),
            current_stock: row.current_stock,
            reserved_stock: row.reserved_stock,
            warehouse: row.warehouse,
            shelf: row.shelf,
            cost_per_unit_cents: row.cost_per_unit_cents,
            version: row.version,
            last_updated: row.last_updated,
        };
        let product = Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            category_id: row.category_id,
            price_cents: row.price_cents,
            cost_cents: row.cost_cents,
            reorder_threshold: row.reorder_threshold,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        StockSnapshot::new(product, record)
    }
}

impl StockRepository {
    /// Creates a new StockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Inserts the empty stock record for a new product.
    ///
    /// Runs on the caller's connection so it shares the product insert's
    /// transaction.
    pub(crate) async fn create_record(
        conn: &mut SqliteConnection,
        product_id: &str,
        warehouse: Option<&str>,
        shelf: Option<&str>,
        cost_per_unit_cents: i64,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_records (
                product_id, current_stock, reserved_stock, warehouse, shelf,
                cost_per_unit_cents, version, last_updated
            ) VALUES (?1, 0, 0, ?2, ?3, ?4, 0, ?5)
            "#,
        )
        .bind(product_id)
        .bind(warehouse)
        .bind(shelf)
        .bind(cost_per_unit_cents)
        .bind(now)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Gets the stock record for a product.
    pub async fn get(&self, product_id: &str) -> DbResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>(
            r#"
            SELECT
                product_id, current_stock, reserved_stock, warehouse, shelf,
                cost_per_unit_cents, version, last_updated
            FROM stock_records
            WHERE product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets a product's stock record joined with the product.
    pub async fn get_snapshot(&self, product_id: &str) -> DbResult<Option<StockSnapshot>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT
                p.id, p.sku, p.name, p.category_id, p.price_cents, p.cost_cents,
                p.reorder_threshold, p.status, p.created_at, p.updated_at,
                s.current_stock, s.reserved_stock, s.warehouse, s.shelf,
                s.cost_per_unit_cents, s.version, s.last_updated
            FROM stock_records s
            INNER JOIN products p ON p.id = s.product_id
            WHERE s.product_id = ?1
            "#,
        )
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(StockSnapshot::from))
    }

    /// Active products whose available stock is at or below their reorder
    /// threshold, lowest available first (ties by SKU).
    pub async fn low_stock(&self) -> DbResult<Vec<StockSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT
                p.id, p.sku, p.name, p.category_id, p.price_cents, p.cost_cents,
                p.reorder_threshold, p.status, p.created_at, p.updated_at,
                s.current_stock, s.reserved_stock, s.warehouse, s.shelf,
                s.cost_per_unit_cents, s.version, s.last_updated
            FROM stock_records s
            INNER JOIN products p ON p.id = s.product_id
            WHERE p.status = 'active'
              AND (s.current_stock - s.reserved_stock) <= p.reorder_threshold
            ORDER BY (s.current_stock - s.reserved_stock) ASC, p.sku ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(count = rows.len(), "Low-stock query returned rows");

        Ok(rows
            .into_iter()
            .map(StockSnapshot::from)
            .filter(|snapshot| snapshot.is_low_stock && snapshot.product.is_active())
            .collect())
    }

    /// One page of stock records, most recently changed first (ties by SKU).
    ///
    /// Lists every product status; the low-stock flag here only compares
    /// available stock with the threshold.
    pub async fn list(
        &self,
        filter: &StockFilter,
        page: u32,
        page_size: u32,
    ) -> DbResult<Page<StockSnapshot>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM stock_records s
            INNER JOIN products p ON p.id = s.product_id
            WHERE (?1 IS NULL OR s.warehouse = ?1)
              AND (?2 IS NULL
                   OR instr(lower(p.sku), lower(?2)) > 0
                   OR instr(lower(p.name), lower(?2)) > 0)
              AND (?3 = 0 OR (s.current_stock - s.reserved_stock) <= p.reorder_threshold)
            "#,
        )
        .bind(filter.warehouse.as_deref())
        .bind(filter.search.as_deref())
        .bind(filter.low_stock_only)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT
                p.id, p.sku, p.name, p.category_id, p.price_cents, p.cost_cents,
                p.reorder_threshold, p.status, p.created_at, p.updated_at,
                s.current_stock, s.reserved_stock, s.warehouse, s.shelf,
                s.cost_per_unit_cents, s.version, s.last_updated
            FROM stock_records s
            INNER JOIN products p ON p.id = s.product_id
            WHERE (?1 IS NULL OR s.warehouse = ?1)
              AND (?2 IS NULL
                   OR instr(lower(p.sku), lower(?2)) > 0
                   OR instr(lower(p.name), lower(?2)) > 0)
              AND (?3 = 0 OR (s.current_stock - s.reserved_stock) <= p.reorder_threshold)
            ORDER BY s.last_updated DESC, p.sku ASC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(filter.warehouse.as_deref())
        .bind(filter.search.as_deref())
        .bind(filter.low_stock_only)
        .bind(page_size as i64)
        .bind(Page::<StockSnapshot>::offset(page, page_size))
        .fetch_all(&self.pool)
        .await?;

        debug!(total, returned = rows.len(), "Stock listing query returned rows");

        let items = rows.into_iter().map(StockSnapshot::from).collect();
        Ok(Page::new(items, page, page_size, total as u64))
    }

    /// Writes a new stock level if the record is still at `expected_version`.
    ///
    /// Reserved stock is lowered to the new level when it would exceed it.
    /// Returns the updated record, or `None` when the version moved.
    pub(crate) async fn compare_and_set(
        conn: &mut SqliteConnection,
        product_id: &str,
        expected_version: i64,
        new_stock: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>(
            r#"
            UPDATE stock_records
            SET
                current_stock = ?3,
                reserved_stock = MIN(reserved_stock, ?3),
                version = version + 1,
                last_updated = ?4
            WHERE product_id = ?1 AND version = ?2
            RETURNING
                product_id, current_stock, reserved_stock, warehouse, shelf,
                cost_per_unit_cents, version, last_updated
            "#,
        )
        .bind(product_id)
        .bind(expected_version)
        .bind(new_stock)
        .bind(now)
        .fetch_optional(conn)
        .await?;

        Ok(record)
    }

    /// Sets reserved stock if the record is still at `expected_version`.
    ///
    /// Reservations do not change current stock and so do not advance the
    /// version; a concurrent stock mutation still makes this miss.
    pub async fn set_reserved(
        &self,
        product_id: &str,
        expected_version: i64,
        reserved: i64,
        now: DateTime<Utc>,
    ) -> DbResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>(
            r#"
            UPDATE stock_records
            SET reserved_stock = ?3, last_updated = ?4
            WHERE product_id = ?1 AND version = ?2
            RETURNING
                product_id, current_stock, reserved_stock, warehouse, shelf,
                cost_per_unit_cents, version, last_updated
            "#,
        )
        .bind(product_id)
        .bind(expected_version)
        .bind(reserved)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_db, widget};

    #[tokio::test]
    async fn test_compare_and_set_checks_version() {
        let (db, product) = seeded_db("W-1").await;
        let now = Utc::now();

        let mut conn = db.pool().acquire().await.unwrap();
        let updated = StockRepository::compare_and_set(&mut conn, &product.id, 0, 10, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.current_stock, 10);
        assert_eq!(updated.version, 1);

        // Stale version loses
        let stale = StockRepository::compare_and_set(&mut conn, &product.id, 0, 3, now)
            .await
            .unwrap();
        assert!(stale.is_none());
    }

    #[tokio::test]
    async fn test_stock_drop_lowers_reservation() {
        let (db, product) = seeded_db("W-1").await;
        let now = Utc::now();
        let mut conn = db.pool().acquire().await.unwrap();

        StockRepository::compare_and_set(&mut conn, &product.id, 0, 10, now)
            .await
            .unwrap();
        drop(conn);

        db.stock().set_reserved(&product.id, 1, 8, now).await.unwrap().unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let record = StockRepository::compare_and_set(&mut conn, &product.id, 1, 3, now)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.current_stock, 3);
        assert_eq!(record.reserved_stock, 3);
        assert_eq!(record.available_stock(), 0);
    }

    #[tokio::test]
    async fn test_low_stock_filters_and_sorts() {
        let (db, first) = seeded_db("W-1").await;
        let second = db.products().insert(&widget("W-2")).await.unwrap();
        let mut stocked = widget("W-3");
        stocked.reorder_threshold = 0;
        let stocked = db.products().insert(&stocked).await.unwrap();

        let now = Utc::now();
        let mut conn = db.pool().acquire().await.unwrap();
        // W-1: 3 available, W-2: 0 available, W-3: 9 available (threshold 0)
        StockRepository::compare_and_set(&mut conn, &first.id, 0, 3, now).await.unwrap();
        StockRepository::compare_and_set(&mut conn, &stocked.id, 0, 9, now).await.unwrap();
        drop(conn);

        let low = db.stock().low_stock().await.unwrap();
        let skus: Vec<&str> = low.iter().map(|s| s.product.sku.as_str()).collect();
        assert_eq!(skus, vec!["W-2", "W-1"]);
        assert_eq!(low[0].record.product_id, second.id);
        assert!(low.iter().all(|s| s.is_low_stock));
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let (db, first) = seeded_db("W-1").await;
        let second = db.products().insert(&widget("W-2")).await.unwrap();
        let mut bolt = widget("B-9");
        bolt.name = "Hex Bolt".to_string();
        bolt.warehouse = Some("annex".to_string());
        let bolt = db.products().insert(&bolt).await.unwrap();

        // Later than the inserts, one minute apart: W-1, then W-2, then B-9
        let base = Utc::now() + chrono::Duration::hours(1);
        let mut conn = db.pool().acquire().await.unwrap();
        StockRepository::compare_and_set(&mut conn, &first.id, 0, 3, base).await.unwrap();
        StockRepository::compare_and_set(&mut conn, &second.id, 0, 20, base + chrono::Duration::minutes(1))
            .await
            .unwrap();
        StockRepository::compare_and_set(&mut conn, &bolt.id, 0, 1, base + chrono::Duration::minutes(2))
            .await
            .unwrap();
        drop(conn);

        let stock = db.stock();
        let skus = |page: &Page<StockSnapshot>| -> Vec<String> {
            page.items.iter().map(|s| s.product.sku.clone()).collect()
        };

        let all = stock.list(&StockFilter::default(), 1, 10).await.unwrap();
        assert_eq!(all.total, 3);
        assert_eq!(skus(&all), vec!["B-9", "W-2", "W-1"]);

        let main = StockFilter {
            warehouse: Some("main".to_string()),
            ..StockFilter::default()
        };
        assert_eq!(skus(&stock.list(&main, 1, 10).await.unwrap()), vec!["W-2", "W-1"]);

        let by_name = StockFilter {
            search: Some("BOLT".to_string()),
            ..StockFilter::default()
        };
        assert_eq!(skus(&stock.list(&by_name, 1, 10).await.unwrap()), vec!["B-9"]);

        let by_sku = StockFilter {
            search: Some("w-2".to_string()),
            ..StockFilter::default()
        };
        assert_eq!(skus(&stock.list(&by_sku, 1, 10).await.unwrap()), vec!["W-2"]);

        let low = StockFilter {
            low_stock_only: true,
            ..StockFilter::default()
        };
        let low = stock.list(&low, 1, 10).await.unwrap();
        assert_eq!(skus(&low), vec!["B-9", "W-1"]);
        assert!(low.items.iter().all(|s| s.is_low_stock));

        let second_page = stock.list(&StockFilter::default(), 2, 2).await.unwrap();
        assert_eq!(skus(&second_page), vec!["W-1"]);
        assert_eq!(second_page.total, 3);
        assert_eq!(second_page.total_pages, 2);
    }

    #[tokio::test]
    async fn test_snapshot_missing_product() {
        let (db, _) = seeded_db("W-1").await;
        assert!(db.stock().get_snapshot("nope").await.unwrap().is_none());
    }
}
