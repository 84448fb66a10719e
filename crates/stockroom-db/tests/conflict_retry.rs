//! Two processes sharing one database file.
//!
//! Each `Database` handle has its own per-product locks, so writers on
//! different handles only meet at the version check in `stock_records`.

use std::path::Path;

use stockroom_core::{DateRange, MutationKind, NewProduct, Product, ProductStatus};
use stockroom_db::{Database, DbConfig, LedgerConfig, LedgerError, MutationRequest};
use tempfile::TempDir;

fn product(sku: &str) -> NewProduct {
    NewProduct {
        sku: sku.to_string(),
        name: format!("Item {}", sku),
        category_id: None,
        price_cents: 1000,
        cost_cents: 400,
        reorder_threshold: 0,
        status: ProductStatus::Active,
        warehouse: Some("main".to_string()),
        shelf: None,
    }
}

async fn open(path: &Path, retries: u32) -> Database {
    Database::connect(
        DbConfig::new(path),
        LedgerConfig::default().max_conflict_retries(retries),
    )
    .await
    .unwrap()
}

/// Two handles on the same file, with one product stocked at `level`.
async fn two_handles(dir: &TempDir, retries: u32, level: i64) -> (Database, Database, Product) {
    let path = dir.path().join("stock.db");
    let first = open(&path, retries).await;
    let second = open(&path, retries).await;

    let item = first.products().insert(&product("SKU-RACE")).await.unwrap();
    first
        .stock_ledger()
        .apply_mutation(MutationRequest::new(&item.id, MutationKind::Set, level, "count"))
        .await
        .unwrap();
    (first, second, item)
}

/// Fires `count` single-unit removes, alternating between the two handles.
async fn race_removes(
    first: &Database,
    second: &Database,
    product_id: &str,
    count: usize,
) -> Vec<Result<(), LedgerError>> {
    let mut tasks = Vec::with_capacity(count);
    for i in 0..count {
        let ledger = if i % 2 == 0 { first.stock_ledger() } else { second.stock_ledger() };
        let id = product_id.to_string();
        tasks.push(tokio::spawn(async move {
            ledger
                .apply_mutation(MutationRequest::new(&id, MutationKind::Remove, 1, format!("order {}", i)))
                .await
                .map(|_| ())
        }));
    }

    let mut results = Vec::with_capacity(count);
    for task in tasks {
        results.push(task.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_handles_retry_until_every_remove_lands() {
    let dir = TempDir::new().unwrap();
    let (first, second, item) = two_handles(&dir, 10, 40).await;

    let results = race_removes(&first, &second, &item.id, 40).await;
    assert!(results.iter().all(|r| r.is_ok()), "{:?}", results);

    let ledger = second.stock_ledger();
    let status = ledger.stock_status(&item.id).await.unwrap();
    assert_eq!(status.record.current_stock, 0);
    assert_eq!(status.record.version, 41);

    let history = ledger
        .transaction_history(&item.id, DateRange::all(), None, Some(100))
        .await
        .unwrap();
    assert_eq!(history.total, 41);
    let sequences: Vec<i64> = history.items.iter().map(|t| t.sequence).collect();
    assert_eq!(sequences, (1..=41).rev().collect::<Vec<i64>>());

    let audit = first.stock_ledger().verify_ledger(&item.id).await.unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.folded_stock, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn exhausted_retries_surface_conflict_without_partial_writes() {
    let dir = TempDir::new().unwrap();
    let (first, second, item) = two_handles(&dir, 0, 40).await;
    let ledger = first.stock_ledger();

    let mut conflicts = 0usize;
    for round in 0..20 {
        ledger
            .apply_mutation(MutationRequest::new(&item.id, MutationKind::Set, 40, "recount"))
            .await
            .unwrap();

        let results = race_removes(&first, &second, &item.id, 40).await;
        let mut applied = 0i64;
        for result in &results {
            match result {
                Ok(()) => applied += 1,
                Err(LedgerError::Conflict { product_id, attempts }) => {
                    assert_eq!(product_id, &item.id);
                    assert_eq!(*attempts, 1);
                    conflicts += 1;
                }
                Err(other) => panic!("round {}: unexpected error {:?}", round, other),
            }
        }

        // A lost race writes nothing: stock and ledger only reflect the winners
        let status = ledger.stock_status(&item.id).await.unwrap();
        assert_eq!(status.record.current_stock, 40 - applied);

        let audit = second.stock_ledger().verify_ledger(&item.id).await.unwrap();
        assert!(audit.consistent, "round {}: {:?}", round, audit);
        assert_eq!(audit.folded_stock, 40 - applied);

        if conflicts > 0 {
            break;
        }
    }

    assert!(conflicts > 0, "no writer ever lost the version check");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_handles_share_one_idempotent_entry() {
    let dir = TempDir::new().unwrap();
    let (first, second, item) = two_handles(&dir, 3, 5).await;

    let request = MutationRequest::new(&item.id, MutationKind::Add, 25, "PO received")
        .idempotency_key("PO-7731");
    let a = {
        let ledger = first.stock_ledger();
        let request = request.clone();
        tokio::spawn(async move { ledger.apply_mutation(request).await })
    };
    let b = {
        let ledger = second.stock_ledger();
        tokio::spawn(async move { ledger.apply_mutation(request).await })
    };
    let a = a.await.unwrap().unwrap();
    let b = b.await.unwrap().unwrap();

    assert_eq!(a.transaction.id, b.transaction.id);
    assert!(a.replayed != b.replayed);

    let status = first.stock_ledger().stock_status(&item.id).await.unwrap();
    assert_eq!(status.record.current_stock, 30);
    assert_eq!(first.ledger().count_for_product(&item.id).await.unwrap(), 2);
}
