//! # Domain Types
//!
//! Core domain types shared by the stock ledger and the revenue rollups.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐ 1:1 ┌─────────────────┐ 1:N ┌──────────────────┐  │
//! │  │    Product      │────►│   StockRecord   │────►│ StockTransaction │  │
//! │  │  ─────────────  │     │  ─────────────  │     │  ──────────────  │  │
//! │  │  id (UUID)      │     │  product_id     │     │  sequence        │  │
//! │  │  sku (business) │     │  current_stock  │     │  delta           │  │
//! │  │  status         │     │  reserved_stock │     │  previous/new    │  │
//! │  │  reorder thresh │     │  version        │     │  reason, ref     │  │
//! │  └─────────────────┘     └─────────────────┘     └──────────────────┘  │
//! │           ▲                                                             │
//! │           │ N:1                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │   SaleRecord    │  (sales stream, read-only to the core)            │
//! │  │  order_id       │                                                    │
//! │  │  final_amount   │                                                    │
//! │  │  marketplace    │                                                    │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Derived Fields
//! `available_stock`, `is_low_stock`, `profit_margin_bps`, `total_fees` and
//! `net_amount` are methods, never columns. Every caller computes them through
//! the same function.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::stock::{MutationKind, TransactionType};
use crate::validation::ValidationResult;

// =============================================================================
// Product
// =============================================================================

/// Product lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    /// Listed and sellable; included in low-stock monitoring.
    Active,
    /// Temporarily hidden.
    Inactive,
    /// Soft-archived. Its stock record and ledger are kept.
    Discontinued,
}

impl Default for ProductStatus {
    fn default() -> Self {
        ProductStatus::Active
    }
}

impl ProductStatus {
    /// Returns the stored string form.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::Discontinued => "discontinued",
        }
    }
}

impl std::str::FromStr for ProductStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            "discontinued" => Ok(ProductStatus::Discontinued),
            _ => Err(ValidationError::not_allowed(
                "status",
                &["active", "inactive", "discontinued"],
            )),
        }
    }
}

/// A catalog product. Owned by the CRUD layer; read-only to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    pub name: String,

    /// Category reference (categories are plain CRUD data).
    pub category_id: Option<String>,

    /// Price in cents.
    pub price_cents: i64,

    /// Cost in cents (for margin calculations).
    pub cost_cents: i64,

    /// Available stock at or below this level flags the product as low stock.
    pub reorder_threshold: i64,

    pub status: ProductStatus,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the cost as a Money type.
    #[inline]
    pub fn cost(&self) -> Money {
        Money::from_cents(self.cost_cents)
    }

    /// Whether the product takes part in low-stock monitoring.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.status == ProductStatus::Active
    }

    /// Profit margin in basis points of price ((price - cost) / price).
    ///
    /// Returns `None` for zero-priced products.
    pub fn profit_margin_bps(&self) -> Option<i64> {
        if self.price_cents == 0 {
            return None;
        }
        let profit = (self.price_cents - self.cost_cents) as i128;
        Some((profit * 10_000 / self.price_cents as i128) as i64)
    }
}

/// Fields a caller supplies to create a product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category_id: Option<String>,
    pub price_cents: i64,
    pub cost_cents: i64,
    pub reorder_threshold: i64,
    #[serde(default)]
    pub status: ProductStatus,
    /// Warehouse for the product's stock record.
    #[serde(default)]
    pub warehouse: Option<String>,
    #[serde(default)]
    pub shelf: Option<String>,
}

// =============================================================================
// Stock Record
// =============================================================================

/// Current and reserved stock for one product.
///
/// `available_stock` is never stored; see [`StockRecord::available_stock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub product_id: String,

    /// Physical units on hand. Never negative.
    pub current_stock: i64,

    /// Units promised to open orders. `0 <= reserved_stock <= current_stock`.
    pub reserved_stock: i64,

    pub warehouse: Option<String>,
    pub shelf: Option<String>,

    /// Unit cost in cents.
    pub cost_per_unit_cents: i64,

    /// Incremented by every accepted mutation; equals the ledger length.
    pub version: i64,

    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl StockRecord {
    /// Units that can still be promised: `current_stock - reserved_stock`.
    #[inline]
    pub fn available_stock(&self) -> i64 {
        available_stock(self.current_stock, self.reserved_stock)
    }

    /// Whether available stock is at or below the product's reorder threshold.
    #[inline]
    pub fn is_low_stock(&self, reorder_threshold: i64) -> bool {
        is_low_stock(self.available_stock(), reorder_threshold)
    }

    /// Inventory value of the units on hand.
    pub fn stock_value(&self) -> Money {
        Money::from_cents(self.cost_per_unit_cents).multiply_quantity(self.current_stock)
    }
}

/// `current - reserved`.
#[inline]
pub fn available_stock(current_stock: i64, reserved_stock: i64) -> i64 {
    current_stock - reserved_stock
}

/// `available <= threshold`.
#[inline]
pub fn is_low_stock(available_stock: i64, reorder_threshold: i64) -> bool {
    available_stock <= reorder_threshold
}

/// A stock record joined with its product and the derived fields.
///
/// Returned by stock status lookups and by the low-stock monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub product: Product,
    pub record: StockRecord,
    pub available_stock: i64,
    pub is_low_stock: bool,
}

impl StockSnapshot {
    pub fn new(product: Product, record: StockRecord) -> Self {
        let available_stock = record.available_stock();
        let is_low_stock = record.is_low_stock(product.reorder_threshold);
        StockSnapshot {
            product,
            record,
            available_stock,
            is_low_stock,
        }
    }
}

// =============================================================================
// Stock Transaction
// =============================================================================

/// Immutable ledger entry for one accepted stock mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockTransaction {
    pub id: String,
    pub product_id: String,

    /// Position in the product's ledger, starting at 1.
    pub sequence: i64,

    pub transaction_type: TransactionType,
    pub mutation_kind: MutationKind,

    /// Amount the caller asked for (the target for `set`).
    pub requested_amount: i64,

    /// `new_stock - previous_stock`.
    pub delta: i64,

    pub previous_stock: i64,
    pub new_stock: i64,

    pub reason: String,

    /// Free-text correlation id (order id, ...).
    pub reference: Option<String>,

    pub idempotency_key: Option<String>,

    pub actor: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl StockTransaction {
    /// Whether a `remove` asked for more than was on hand.
    pub fn was_clamped(&self) -> bool {
        self.mutation_kind == MutationKind::Remove && -self.delta < self.requested_amount
    }
}

// =============================================================================
// Sales Stream
// =============================================================================

/// Payment status of a sale. Mutated by the sale-management flow only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Paid
    }
}

/// Fulfilment status of a sale. Mutated by the sale-management flow only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Delivered
    }
}

/// A completed sale from the sales stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct SaleRecord {
    /// External order id. Unique.
    pub order_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub marketplace_fee_cents: i64,
    pub payment_fee_cents: i64,
    pub shipping_fee_cents: i64,
    /// Amount charged to the customer, in cents.
    pub final_amount_cents: i64,
    pub marketplace: String,
    #[ts(as = "String")]
    pub sale_date: DateTime<Utc>,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
}

impl SaleRecord {
    #[inline]
    pub fn final_amount(&self) -> Money {
        Money::from_cents(self.final_amount_cents)
    }

    /// Marketplace + payment + shipping fees.
    pub fn total_fees(&self) -> Money {
        Money::from_cents(
            self.marketplace_fee_cents + self.payment_fee_cents + self.shipping_fee_cents,
        )
    }

    /// Final amount minus fees.
    pub fn net_amount(&self) -> Money {
        self.final_amount() - self.total_fees()
    }
}

// =============================================================================
// Queries
// =============================================================================

/// Inclusive date filter. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    /// No bounds.
    pub const fn all() -> Self {
        DateRange {
            start: None,
            end: None,
        }
    }

    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        DateRange {
            start: Some(start),
            end: Some(end),
        }
    }

    /// Rejects ranges whose start is after their end.
    pub fn validate(&self) -> ValidationResult<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start > end {
                return Err(ValidationError::InvalidFormat {
                    field: "dateRange".to_string(),
                    reason: "start must not be after end".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Filter for the stock listing. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct StockFilter {
    /// Exact warehouse name.
    pub warehouse: Option<String>,
    /// Case-insensitive substring of the SKU or product name.
    pub search: Option<String>,
    /// Only records at or below their product's reorder threshold.
    #[serde(default)]
    pub low_stock_only: bool,
}

/// One page of a paginated query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: u32, page_size: u32, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size as u64)
        };
        Page {
            items,
            page,
            page_size,
            total,
            total_pages,
        }
    }

    /// Row offset of the first item of `page`.
    pub fn offset(page: u32, page_size: u32) -> i64 {
        (page.saturating_sub(1) as i64) * page_size as i64
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(threshold: i64, status: ProductStatus) -> Product {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Product {
            id: "p-1".to_string(),
            sku: "SKU-1".to_string(),
            name: "Widget".to_string(),
            category_id: None,
            price_cents: 2000,
            cost_cents: 1500,
            reorder_threshold: threshold,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    fn record(current: i64, reserved: i64) -> StockRecord {
        StockRecord {
            product_id: "p-1".to_string(),
            current_stock: current,
            reserved_stock: reserved,
            warehouse: Some("main".to_string()),
            shelf: None,
            cost_per_unit_cents: 250,
            version: 0,
            last_updated: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_available_stock_is_current_minus_reserved() {
        let rec = record(10, 4);
        assert_eq!(rec.available_stock(), 6);
        assert!(!rec.is_low_stock(5));
        assert!(rec.is_low_stock(6));
    }

    #[test]
    fn test_snapshot_derives_fields() {
        let snap = StockSnapshot::new(product(5, ProductStatus::Active), record(7, 3));
        assert_eq!(snap.available_stock, 4);
        assert!(snap.is_low_stock);
    }

    #[test]
    fn test_stock_value() {
        assert_eq!(record(4, 0).stock_value().cents(), 1000);
    }

    #[test]
    fn test_profit_margin() {
        assert_eq!(product(0, ProductStatus::Active).profit_margin_bps(), Some(2500));

        let mut free = product(0, ProductStatus::Active);
        free.price_cents = 0;
        assert_eq!(free.profit_margin_bps(), None);
    }

    #[test]
    fn test_product_status_parse() {
        assert_eq!("discontinued".parse::<ProductStatus>().unwrap(), ProductStatus::Discontinued);
        assert!("archived".parse::<ProductStatus>().is_err());
        assert_eq!(ProductStatus::Inactive.as_str(), "inactive");
    }

    #[test]
    fn test_sale_fees_and_net() {
        let sale = SaleRecord {
            order_id: "ORD-1".to_string(),
            product_id: "p-1".to_string(),
            quantity: 2,
            unit_price_cents: 1000,
            marketplace_fee_cents: 150,
            payment_fee_cents: 50,
            shipping_fee_cents: 300,
            final_amount_cents: 2000,
            marketplace: "amazon".to_string(),
            sale_date: Utc.with_ymd_and_hms(2024, 1, 5, 12, 0, 0).unwrap(),
            payment_status: PaymentStatus::Paid,
            order_status: OrderStatus::Delivered,
        };
        assert_eq!(sale.total_fees().cents(), 500);
        assert_eq!(sale.net_amount().cents(), 1500);
    }

    #[test]
    fn test_date_range() {
        let a = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();

        assert!(DateRange::between(a, b).validate().is_ok());
        assert!(DateRange::between(b, a).validate().is_err());
        assert!(DateRange::between(a, b).contains(b));
        assert!(!DateRange::between(a, a).contains(b));
        assert!(DateRange::all().contains(b));
    }

    #[test]
    fn test_page_math() {
        let page: Page<i32> = Page::new(vec![1, 2], 2, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<i32>::offset(3, 20), 40);
        assert_eq!(Page::<i32>::offset(1, 20), 0);
    }
}
