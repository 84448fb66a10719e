//! # Sale Repository
//!
//! Read access to the sales stream for the revenue aggregator.
//!
//! ## Sales Stream
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Order flow (external) ──insert──► sales ──list_between──► aggregator  │
//! │                                                                         │
//! │  Rows are immutable to this crate apart from the initial insert.       │
//! │  Windows come in two shapes:                                            │
//! │    WindowEnd::Inclusive  [start, end]   summaries, trends, top products │
//! │    WindowEnd::Exclusive  [start, end)   period comparisons              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use stockroom_core::SaleRecord;

/// Whether a window includes its end instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEnd {
    Inclusive,
    Exclusive,
}

/// Repository for the sales stream.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Records a completed sale.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - order id already recorded
    pub async fn insert(&self, sale: &SaleRecord) -> DbResult<()> {
        debug!(order_id = %sale.order_id, marketplace = %sale.marketplace, "Recording sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                order_id, product_id, quantity, unit_price_cents,
                marketplace_fee_cents, payment_fee_cents, shipping_fee_cents,
                final_amount_cents, marketplace, sale_date,
                payment_status, order_status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.order_id)
        .bind(&sale.product_id)
        .bind(sale.quantity)
        .bind(sale.unit_price_cents)
        .bind(sale.marketplace_fee_cents)
        .bind(sale.payment_fee_cents)
        .bind(sale.shipping_fee_cents)
        .bind(sale.final_amount_cents)
        .bind(&sale.marketplace)
        .bind(sale.sale_date)
        .bind(sale.payment_status)
        .bind(sale.order_status)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("order_id", &sale.order_id),
            other => other,
        })?;

        Ok(())
    }

    /// Gets a sale by its order id.
    pub async fn get_by_order_id(&self, order_id: &str) -> DbResult<Option<SaleRecord>> {
        let sale = sqlx::query_as::<_, SaleRecord>(
            r#"
            SELECT
                order_id, product_id, quantity, unit_price_cents,
                marketplace_fee_cents, payment_fee_cents, shipping_fee_cents,
                final_amount_cents, marketplace, sale_date,
                payment_status, order_status
            FROM sales
            WHERE order_id = ?1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(sale)
    }

    /// Sales dated inside a window, oldest first (then in insertion order).
    ///
    /// ## Arguments
    /// * `start` - Window start (always inclusive)
    /// * `end` - Window end, inclusive or exclusive per `end_bound`
    /// * `marketplace` - Restrict to one marketplace
    pub async fn list_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        end_bound: WindowEnd,
        marketplace: Option<&str>,
    ) -> DbResult<Vec<SaleRecord>> {
        let sql = match end_bound {
            WindowEnd::Inclusive => {
                r#"
                SELECT
                    order_id, product_id, quantity, unit_price_cents,
                    marketplace_fee_cents, payment_fee_cents, shipping_fee_cents,
                    final_amount_cents, marketplace, sale_date,
                    payment_status, order_status
                FROM sales
                WHERE sale_date >= ?1 AND sale_date <= ?2
                  AND (?3 IS NULL OR marketplace = ?3 COLLATE NOCASE)
                ORDER BY sale_date ASC, rowid ASC
                "#
            }
            WindowEnd::Exclusive => {
                r#"
                SELECT
                    order_id, product_id, quantity, unit_price_cents,
                    marketplace_fee_cents, payment_fee_cents, shipping_fee_cents,
                    final_amount_cents, marketplace, sale_date,
                    payment_status, order_status
                FROM sales
                WHERE sale_date >= ?1 AND sale_date < ?2
                  AND (?3 IS NULL OR marketplace = ?3 COLLATE NOCASE)
                ORDER BY sale_date ASC, rowid ASC
                "#
            }
        };

        let sales = sqlx::query_as::<_, SaleRecord>(sql)
            .bind(start)
            .bind(end)
            .bind(marketplace)
            .fetch_all(&self.pool)
            .await?;

        debug!(
            start = %start,
            end = %end,
            count = sales.len(),
            "Loaded sales window"
        );

        Ok(sales)
    }

    /// Counts all recorded sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
