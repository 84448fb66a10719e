//! # Repository Module
//!
//! Database repository implementations for the stockroom store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  StockLedger / RevenueAggregator (services)                            │
//! │       │                                                                 │
//! │       │  db.stock().get("p-1")                                         │
//! │       ▼                                                                 │
//! │  ┌───────────────────┐ ┌───────────────────┐ ┌───────────────────┐     │
//! │  │ ProductRepository │ │ StockRepository   │ │ LedgerRepository  │     │
//! │  │ insert, get_by_*  │ │ get, low_stock    │ │ history, find_by_ │     │
//! │  │ set_status        │ │ compare_and_set   │ │ idempotency_key   │     │
//! │  └───────────────────┘ └───────────────────┘ └───────────────────┘     │
//! │                          ┌───────────────────┐                          │
//! │                          │ SaleRepository    │                          │
//! │                          │ list_between      │                          │
//! │                          └───────────────────┘                          │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes that must share a transaction (`StockRepository::compare_and_set`,
//! `LedgerRepository::append`) take a `&mut SqliteConnection` instead of
//! using the pool.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Catalog lookups, product creation
//! - [`StockRepository`](stock::StockRepository) - Stock records and low-stock query
//! - [`LedgerRepository`](ledger::LedgerRepository) - Append-only stock ledger
//! - [`SaleRepository`](sale::SaleRepository) - Sales stream windows

pub mod ledger;
pub mod product;
pub mod sale;
pub mod stock;
