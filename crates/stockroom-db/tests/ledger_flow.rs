//! End-to-end flows through the public `Database` handle.

use chrono::{DateTime, TimeZone, Utc};
use stockroom_core::{
    DateRange, Granularity, Money, MutationKind, NewProduct, OrderStatus, PaymentStatus, Period,
    Product, ProductStatus, SaleRecord,
};
use stockroom_db::{
    BulkEntry, BulkEntryResult, Database, DbConfig, LedgerError, MutationRequest,
};

fn product(sku: &str, threshold: i64) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: format!("Item {}", sku),
        category_id: Some("general".to_string()),
        price_cents: 2000,
        cost_cents: 900,
        reorder_threshold: threshold,
        status: ProductStatus::Active,
        warehouse: Some("main".to_string()),
        shelf: None,
    }
}

fn sale(order_id: &str, product_id: &str, quantity: i64, cents: i64, at: DateTime<Utc>) -> SaleRecord {
    SaleRecord {
        order_id: order_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        unit_price_cents: cents / quantity,
        marketplace_fee_cents: 0,
        payment_fee_cents: 0,
        shipping_fee_cents: 0,
        final_amount_cents: cents,
        marketplace: "amazon".to_string(),
        sale_date: at,
        payment_status: PaymentStatus::Paid,
        order_status: OrderStatus::Delivered,
    }
}

async fn setup(skus: &[(&str, i64)]) -> (Database, Vec<Product>) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let mut products = Vec::new();
    for (sku, threshold) in skus {
        products.push(db.products().insert(&product(sku, *threshold)).await.unwrap());
    }
    (db, products)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_removes_chain_without_lost_updates() {
    let (db, products) = setup(&[("SKU-1", 0)]).await;
    let id = products[0].id.clone();
    let ledger = db.stock_ledger();

    ledger
        .apply_mutation(MutationRequest::new(&id, MutationKind::Set, 10, "count"))
        .await
        .unwrap();

    let a = {
        let ledger = db.stock_ledger();
        let id = id.clone();
        tokio::spawn(async move {
            ledger
                .apply_mutation(MutationRequest::new(&id, MutationKind::Remove, 7, "order A"))
                .await
        })
    };
    let b = {
        let ledger = db.stock_ledger();
        let id = id.clone();
        tokio::spawn(async move {
            ledger
                .apply_mutation(MutationRequest::new(&id, MutationKind::Remove, 5, "order B"))
                .await
        })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let status = ledger.stock_status(&id).await.unwrap();
    assert_eq!(status.record.current_stock, 0);
    assert_eq!(status.record.version, 3);

    let history = ledger
        .transaction_history(&id, DateRange::all(), None, None)
        .await
        .unwrap();
    assert_eq!(history.total, 3);

    // Newest first; each entry starts where the previous one ended
    let newest = &history.items[0];
    let middle = &history.items[1];
    assert_eq!(newest.sequence, 3);
    assert_eq!(newest.previous_stock, middle.new_stock);
    assert_eq!(newest.new_stock, 0);

    let audit = ledger.verify_ledger(&id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.folded_stock, 0);
}

#[tokio::test]
async fn bulk_update_reports_successes_and_failures() {
    let (db, products) = setup(&[("SKU-1", 5), ("SKU-2", 5)]).await;
    let ledger = db.stock_ledger();

    let outcome = ledger
        .bulk_apply(vec![
            BulkEntry::new(&products[0].id, 40),
            BulkEntry::new("no-such-product", 3),
            BulkEntry::new(&products[1].id, 12),
        ])
        .await;

    assert_eq!(outcome.success_count, 2);
    assert_eq!(outcome.error_count, 1);
    assert!(matches!(outcome.results[1], BulkEntryResult::Failed { .. }));

    let mut negative = BulkEntry::new(&products[1].id, 0);
    negative.amount = Some(-4);
    let rejected = ledger.bulk_apply(vec![negative]).await;
    assert_eq!(rejected.error_count, 1);

    let second = ledger.stock_status(&products[1].id).await.unwrap();
    assert_eq!(second.record.current_stock, 12);
}

#[tokio::test]
async fn low_stock_excludes_discontinued_and_orders_by_available() {
    let (db, products) = setup(&[("SKU-A", 10), ("SKU-B", 10), ("SKU-C", 10), ("SKU-D", 10)]).await;
    let ledger = db.stock_ledger();

    for (p, level) in products.iter().zip([8, 3, 50, 1]) {
        ledger
            .apply_mutation(MutationRequest::new(&p.id, MutationKind::Set, level, "count"))
            .await
            .unwrap();
    }
    db.products()
        .set_status(&products[3].id, ProductStatus::Discontinued)
        .await
        .unwrap();

    let low = ledger.low_stock_items().await.unwrap();
    let skus: Vec<&str> = low.iter().map(|item| item.product.sku.as_str()).collect();
    assert_eq!(skus, vec!["SKU-B", "SKU-A"]);
    assert!(low.iter().all(|item| item.is_low_stock));
}

#[tokio::test]
async fn idempotency_key_replays_original_entry() {
    let (db, products) = setup(&[("SKU-1", 0)]).await;
    let ledger = db.stock_ledger();
    let id = &products[0].id;

    let request = MutationRequest::new(id, MutationKind::Add, 25, "PO received").idempotency_key("PO-1001");
    let first = ledger.apply_mutation(request.clone()).await.unwrap();
    let replay = ledger.apply_mutation(request).await.unwrap();

    assert!(replay.replayed);
    assert_eq!(replay.transaction, first.transaction);
    assert_eq!(ledger.stock_status(id).await.unwrap().record.current_stock, 25);
}

#[tokio::test]
async fn missing_product_is_not_found_everywhere() {
    let (db, _) = setup(&[]).await;
    let ledger = db.stock_ledger();

    assert!(matches!(
        ledger.stock_status("nope").await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.verify_ledger("nope").await,
        Err(LedgerError::NotFound { .. })
    ));
    assert!(matches!(
        ledger.set_reserved_stock("nope", 1).await,
        Err(LedgerError::NotFound { .. })
    ));
}

#[tokio::test]
async fn revenue_rollups_over_recorded_sales() {
    let (db, products) = setup(&[("SKU-1", 0), ("SKU-2", 0)]).await;
    let revenue = db.revenue();
    let day = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap();

    revenue.record_sale(&sale("A-1", &products[0].id, 1, 2_000, day(9, 14))).await.unwrap();
    revenue.record_sale(&sale("A-2", &products[1].id, 4, 8_000, day(10, 8))).await.unwrap();
    revenue.record_sale(&sale("A-3", &products[0].id, 2, 4_000, day(10, 9))).await.unwrap();

    let daily = revenue.summarize(Period::Daily, None, day(10, 12)).await.unwrap();
    assert_eq!(daily.aggregate.total_revenue, Money::from_cents(14_000));
    assert_eq!(daily.aggregate.total_sales, 3);

    let trend = revenue.trend(Granularity::Day, 7, None, day(10, 12)).await.unwrap();
    assert_eq!(trend.len(), 2);
    assert_eq!(trend[1].total_revenue, Money::from_cents(12_000));

    let top = revenue.top_products(7, 5, None, day(10, 12)).await.unwrap();
    assert_eq!(top[0].sku, "SKU-2");
    assert_eq!(top[0].total_quantity, 4);

    let comparison = revenue.compare(day(10, 0), day(9, 0), Granularity::Day).await.unwrap();
    assert_eq!(comparison.deltas.revenue_change, Money::from_cents(10_000));
    assert_eq!(comparison.deltas.revenue_change_percent, 500.0);
    assert_eq!(comparison.deltas.sales_change, 1);
}
