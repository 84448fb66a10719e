//! # Transaction Ledger Repository
//!
//! Append-only storage for stock ledger entries.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  stock_transactions (p-1)                                               │
//! │                                                                         │
//! │  seq  kind    req  prev  new  delta                                    │
//! │  ───  ──────  ───  ────  ───  ─────                                    │
//! │   1   add      10     0   10   +10                                     │
//! │   2   remove    7    10    3    -7                                     │
//! │   3   remove    5     3    0    -3   ← clamped, requested 5            │
//! │   4   set      12     0   12   +12                                     │
//! │                                       ─────                            │
//! │                                  Σ =   12  = current_stock             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `append` only runs on the connection of the engine's open transaction.
//! There is no update or delete; the schema rejects both with triggers.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use stockroom_core::{DateRange, Page, StockTransaction};

/// Repository for ledger entries.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    /// Appends one entry on the caller's (transaction) connection.
    pub(crate) async fn append(conn: &mut SqliteConnection, entry: &StockTransaction) -> DbResult<()> {
        debug!(
            product_id = %entry.product_id,
            sequence = entry.sequence,
            delta = entry.delta,
            "Appending ledger entry"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, product_id, sequence, transaction_type, mutation_kind,
                requested_amount, delta, previous_stock, new_stock,
                reason, reference, idempotency_key, actor, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(entry.sequence)
        .bind(entry.transaction_type)
        .bind(entry.mutation_kind)
        .bind(entry.requested_amount)
        .bind(entry.delta)
        .bind(entry.previous_stock)
        .bind(entry.new_stock)
        .bind(&entry.reason)
        .bind(&entry.reference)
        .bind(&entry.idempotency_key)
        .bind(&entry.actor)
        .bind(entry.created_at)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Finds the entry a product recorded under an idempotency key.
    pub async fn find_by_idempotency_key(
        &self,
        product_id: &str,
        key: &str,
    ) -> DbResult<Option<StockTransaction>> {
        let entry = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT
                id, product_id, sequence, transaction_type, mutation_kind,
                requested_amount, delta, previous_stock, new_stock,
                reason, reference, idempotency_key, actor, created_at
            FROM stock_transactions
            WHERE product_id = ?1 AND idempotency_key = ?2
            "#,
        )
        .bind(product_id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// One page of a product's history, newest first.
    ///
    /// Ordered by sequence descending. Timestamps only filter: the wall clock
    /// can step backwards between two writes, the sequence cannot.
    pub async fn history(
        &self,
        product_id: &str,
        range: &DateRange,
        page: u32,
        page_size: u32,
    ) -> DbResult<Page<StockTransaction>> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM stock_transactions
            WHERE product_id = ?1
              AND (?2 IS NULL OR created_at >= ?2)
              AND (?3 IS NULL OR created_at <= ?3)
            "#,
        )
        .bind(product_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await?;

        let items = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT
                id, product_id, sequence, transaction_type, mutation_kind,
                requested_amount, delta, previous_stock, new_stock,
                reason, reference, idempotency_key, actor, created_at
            FROM stock_transactions
            WHERE product_id = ?1
              AND (?2 IS NULL OR created_at >= ?2)
              AND (?3 IS NULL OR created_at <= ?3)
            ORDER BY sequence DESC
            LIMIT ?4 OFFSET ?5
            "#,
        )
        .bind(product_id)
        .bind(range.start)
        .bind(range.end)
        .bind(page_size as i64)
        .bind(Page::<StockTransaction>::offset(page, page_size))
        .fetch_all(&self.pool)
        .await?;

        Ok(Page::new(items, page, page_size, total as u64))
    }

    /// A product's whole ledger, oldest first.
    pub async fn all_for_product(&self, product_id: &str) -> DbResult<Vec<StockTransaction>> {
        let entries = sqlx::query_as::<_, StockTransaction>(
            r#"
            SELECT
                id, product_id, sequence, transaction_type, mutation_kind,
                requested_amount, delta, previous_stock, new_stock,
                reason, reference, idempotency_key, actor, created_at
            FROM stock_transactions
            WHERE product_id = ?1
            ORDER BY sequence ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Number of entries a product has.
    pub async fn count_for_product(&self, product_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM stock_transactions WHERE product_id = ?1")
                .bind(product_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}
