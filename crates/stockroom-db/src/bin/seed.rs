//! # Seed Data Generator
//!
//! Populates the database with products, stock history and sales for
//! development.
//!
//! ## Usage
//! ```bash
//! # 200 products, 90 days of sales (default)
//! cargo run -p stockroom-db --bin seed
//!
//! # Custom amounts
//! cargo run -p stockroom-db --bin seed -- --count 1000 --days 365
//!
//! # Specify database path
//! cargo run -p stockroom-db --bin seed -- --db ./data/stockroom.db
//!
//! # Show every mutation
//! RUST_LOG=stockroom_db=debug cargo run -p stockroom-db --bin seed
//! ```
//!
//! ## Generated Data
//! - Products across five categories, SKU `{CATEGORY}-{ABBR}-{INDEX}`
//! - An opening stock count per product, then restocks and order removals,
//!   all written through the stock ledger
//! - Sales spread over the last `--days` days across four marketplaces

use chrono::{Duration, Utc};
use std::env;
use stockroom_core::{
    MutationKind, NewProduct, OrderStatus, PaymentStatus, Period, ProductStatus, SaleRecord,
};
use stockroom_db::{BulkEntry, Database, DbConfig, LedgerConfig, MutationRequest};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Product categories for realistic test data
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "APP",
        &[
            "Cotton T-Shirt",
            "Denim Jacket",
            "Wool Beanie",
            "Rain Shell",
            "Hoodie",
            "Chino Shorts",
            "Linen Shirt",
            "Running Socks",
        ],
    ),
    (
        "HOM",
        &[
            "Ceramic Mug",
            "Scented Candle",
            "Throw Blanket",
            "Cutting Board",
            "Desk Lamp",
            "Plant Pot",
            "Wall Clock",
            "Bath Towel",
        ],
    ),
    (
        "ELE",
        &[
            "USB-C Cable",
            "Wireless Charger",
            "Bluetooth Speaker",
            "Phone Stand",
            "Power Bank",
            "Earbuds",
            "Webcam Cover",
            "Laptop Sleeve",
        ],
    ),
    (
        "OUT",
        &[
            "Water Bottle",
            "Camping Mug",
            "Headlamp",
            "Trail Map Case",
            "Dry Bag",
            "Hammock",
            "Carabiner Set",
            "Picnic Blanket",
        ],
    ),
    (
        "BTY",
        &[
            "Lip Balm",
            "Hand Cream",
            "Bar Soap",
            "Face Mist",
            "Hair Oil",
            "Bath Salts",
            "Nail Kit",
            "Sheet Mask",
        ],
    ),
];

/// Size variants and their price add-on in cents
const SIZES: &[(&str, i64)] = &[("S", 0), ("M", 150), ("L", 300), ("XL", 450), ("Bundle", 900)];

/// Marketplaces and their fee rate in basis points
const MARKETPLACES: &[(&str, i64)] = &[("shopify", 290), ("amazon", 1500), ("ebay", 1325), ("etsy", 650)];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut days: i64 = 90;
    let mut db_path = String::from("./stockroom_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--days" => {
                if i + 1 < args.len() {
                    days = args[i + 1].parse().unwrap_or(90);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Stockroom Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of products to generate (default: 200)");
                println!("      --days <N>     Days of sales history (default: 90)");
                println!("  -d, --db <PATH>    Database file path (default: ./stockroom_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, products = count, days, "Seeding database");

    let db = Database::connect(DbConfig::new(&db_path), LedgerConfig::from_env()?).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        warn!(existing, "Database already has products; skipping seed");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let ledger = db.stock_ledger();

    // Products
    let mut product_ids = Vec::with_capacity(count);
    'outer: for (category_idx, (category_code, names)) in CATEGORIES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if product_ids.len() >= count {
                    break 'outer;
                }
                let seed = category_idx * 1000 + name_idx * 20 + size_idx;
                let new = generate_product(category_code, name, size, *price_addon, seed);
                match db.products().insert(&new).await {
                    Ok(product) => product_ids.push(product.id),
                    Err(e) => warn!(sku = %new.sku, error = %e, "Failed to insert product"),
                }
            }
        }
    }
    info!(generated = product_ids.len(), "Products created");

    // Opening stock count
    let opening: Vec<BulkEntry> = product_ids
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let mut entry = BulkEntry::new(id, ((idx * 37) % 120) as i64);
            entry.reason = Some("Opening stock count".to_string());
            entry
        })
        .collect();
    let outcome = ledger.bulk_apply(opening).await;
    info!(
        applied = outcome.success_count,
        failed = outcome.error_count,
        "Opening stock recorded"
    );

    // Sales and the matching stock movements
    let now = Utc::now();
    let mut sales = 0usize;
    for day in 0..days {
        let orders_today = 3 + (day % 5) as usize;
        for order in 0..orders_today {
            let seed = (day as usize) * 31 + order * 7;
            let Some(product_id) = product_ids.get(seed % product_ids.len().max(1)) else {
                break;
            };
            let product = match db.products().get_by_id(product_id).await? {
                Some(p) => p,
                None => continue,
            };

            let quantity = 1 + (seed % 3) as i64;
            let (marketplace, fee_bps) = MARKETPLACES[seed % MARKETPLACES.len()];
            let gross = product.price_cents * quantity;
            let sale = SaleRecord {
                order_id: format!("ORD-{}", &Uuid::new_v4().simple().to_string()[..12].to_uppercase()),
                product_id: product_id.clone(),
                quantity,
                unit_price_cents: product.price_cents,
                marketplace_fee_cents: gross * fee_bps / 10_000,
                payment_fee_cents: gross * 29 / 1_000 + 30,
                shipping_fee_cents: if quantity > 1 { 0 } else { 499 },
                final_amount_cents: gross,
                marketplace: marketplace.to_string(),
                sale_date: now - Duration::days(days - day) + Duration::minutes((order * 97) as i64),
                payment_status: PaymentStatus::Paid,
                order_status: OrderStatus::Delivered,
            };

            ledger
                .apply_mutation(
                    MutationRequest::new(product_id, MutationKind::Remove, quantity, "Order fulfilled")
                        .reference(sale.order_id.clone())
                        .actor("seed"),
                )
                .await?;
            db.revenue().record_sale(&sale).await?;
            sales += 1;
        }

        // Weekly restock of everything that ran low
        if day % 7 == 6 {
            for item in ledger.low_stock_items().await? {
                ledger
                    .apply_mutation(
                        MutationRequest::new(&item.product.id, MutationKind::Add, 50, "Weekly restock")
                            .actor("seed"),
                    )
                    .await?;
            }
        }
    }

    let summary = db.revenue().summarize(Period::Monthly, None, now).await?;
    let low = ledger.low_stock_items().await?;

    info!(
        sales,
        monthly_revenue = %summary.aggregate.total_revenue,
        low_stock = low.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Seed complete"
    );

    Ok(())
}

/// Generates a single product with realistic data.
fn generate_product(category: &str, name: &str, size: &str, price_addon: i64, seed: usize) -> NewProduct {
    let abbr: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:04}", category, abbr, seed);

    // $4.99 - $24.99 + size addon
    let price_cents = 499 + ((seed * 17) % 2000) as i64 + price_addon;

    // Cost is 35-55% of price
    let cost_cents = price_cents * (35 + (seed % 20) as i64) / 100;

    NewProduct {
        sku,
        name: format!("{} ({})", name, size),
        category_id: Some(category.to_lowercase()),
        price_cents,
        cost_cents,
        reorder_threshold: 5 + (seed % 4) as i64 * 5,
        status: if seed % 41 == 0 {
            ProductStatus::Discontinued
        } else {
            ProductStatus::Active
        },
        warehouse: Some("main".to_string()),
        shelf: Some(format!("{}-{}", category, seed % 12 + 1)),
    }
}
