//! Fixtures shared by the unit tests.

use chrono::{DateTime, Utc};
use stockroom_core::{NewProduct, OrderStatus, PaymentStatus, Product, ProductStatus, SaleRecord};

use crate::pool::{Database, DbConfig};

pub(crate) fn widget(sku: &str) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: format!("Widget {}", sku),
        category_id: None,
        price_cents: 1500,
        cost_cents: 600,
        reorder_threshold: 5,
        status: ProductStatus::Active,
        warehouse: Some("main".to_string()),
        shelf: Some("A-1".to_string()),
    }
}

/// In-memory database holding one product with an empty stock record.
pub(crate) async fn seeded_db(sku: &str) -> (Database, Product) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let product = db.products().insert(&widget(sku)).await.unwrap();
    (db, product)
}

pub(crate) fn sale(
    order_id: &str,
    product_id: &str,
    quantity: i64,
    amount_cents: i64,
    sale_date: DateTime<Utc>,
) -> SaleRecord {
    SaleRecord {
        order_id: order_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        unit_price_cents: amount_cents / quantity.max(1),
        marketplace_fee_cents: 0,
        payment_fee_cents: 0,
        shipping_fee_cents: 0,
        final_amount_cents: amount_cents,
        marketplace: "shopify".to_string(),
        sale_date,
        payment_status: PaymentStatus::Paid,
        order_status: OrderStatus::Delivered,
    }
}
