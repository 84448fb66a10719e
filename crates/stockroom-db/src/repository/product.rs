//! # Product Repository
//!
//! Catalog lookups for the ledger and the aggregator, plus the one write the
//! core owns: creating a product together with its stock record.
//!
//! ## Product Creation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    insert(NewProduct)                                   │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │    INSERT INTO products       (id, sku, ..., status)                    │
//! │    INSERT INTO stock_records  (product_id, current 0, reserved 0, v0)   │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  A product never exists without its stock record.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Products are never deleted here; `set_status(Discontinued)` archives them
//! and their stock record and ledger stay readable.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::stock::StockRepository;
use stockroom_core::validation::validate_new_product;
use stockroom_core::{NewProduct, Product, ProductStatus};

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ProductRepository::new(pool);
///
/// let product = repo.insert(&new_product).await?;
/// let same = repo.get_by_sku("WIDGET-01").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id, price_cents, cost_cents,
                reorder_threshold, status, created_at, updated_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id, price_cents, cost_cents,
                reorder_threshold, status, created_at, updated_at
            FROM products
            WHERE sku = ?1
            "#,
        )
        .bind(sku.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists products, optionally filtered by status, ordered by SKU.
    pub async fn list(&self, status: Option<ProductStatus>) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT
                id, sku, name, category_id, price_cents, cost_cents,
                reorder_threshold, status, created_at, updated_at
            FROM products
            WHERE ?1 IS NULL OR status = ?1
            ORDER BY sku
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Inserts a new product and its empty stock record in one transaction.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product
    /// * `Err(DbError::Validation)` - Field rules failed
    /// * `Err(DbError::UniqueViolation)` - SKU already exists
    pub async fn insert(&self, new: &NewProduct) -> DbResult<Product> {
        validate_new_product(new)?;

        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            category_id: new.category_id.clone(),
            price_cents: new.price_cents,
            cost_cents: new.cost_cents,
            reorder_threshold: new.reorder_threshold,
            status: new.status,
            created_at: now,
            updated_at: now,
        };

        debug!(sku = %product.sku, id = %product.id, "Inserting product");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, name, category_id, price_cents, cost_cents,
                reorder_threshold, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.name)
        .bind(&product.category_id)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.reorder_threshold)
        .bind(product.status)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("sku", &product.sku),
            other => other,
        })?;

        StockRepository::create_record(
            &mut *tx,
            &product.id,
            new.warehouse.as_deref(),
            new.shelf.as_deref(),
            product.cost_cents,
            now,
        )
        .await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(product)
    }

    /// Changes a product's lifecycle status.
    ///
    /// Discontinuing a product drops it out of low-stock monitoring; its
    /// stock record and ledger are untouched.
    pub async fn set_status(&self, id: &str, status: ProductStatus) -> DbResult<()> {
        debug!(id = %id, status = status.as_str(), "Updating product status");

        let result = sqlx::query(
            r#"
            UPDATE products
            SET status = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Counts all products (for diagnostics).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

/// Generates a new product ID.
pub fn generate_product_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::test_support::widget;

    #[tokio::test]
    async fn test_insert_creates_stock_record() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&widget("W-1")).await.unwrap();

        let record = db.stock().get(&product.id).await.unwrap().unwrap();
        assert_eq!(record.current_stock, 0);
        assert_eq!(record.reserved_stock, 0);
        assert_eq!(record.version, 0);
        assert_eq!(record.cost_per_unit_cents, 600);
        assert_eq!(record.warehouse.as_deref(), Some("main"));
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.products().insert(&widget("W-1")).await.unwrap();

        let err = db.products().insert(&widget("W-1")).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_invalid_product_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut bad = widget("W-1");
        bad.sku = "has space".to_string();

        let err = db.products().insert(&bad).await.unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[tokio::test]
    async fn test_lookup_and_status() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db.products().insert(&widget("W-1")).await.unwrap();

        let by_sku = db.products().get_by_sku("W-1").await.unwrap().unwrap();
        assert_eq!(by_sku.id, product.id);

        db.products()
            .set_status(&product.id, ProductStatus::Discontinued)
            .await
            .unwrap();
        let reloaded = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(reloaded.status, ProductStatus::Discontinued);

        let active = db.products().list(Some(ProductStatus::Active)).await.unwrap();
        assert!(active.is_empty());
        assert_eq!(db.products().list(None).await.unwrap().len(), 1);

        assert!(matches!(
            db.products().set_status("missing", ProductStatus::Active).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
