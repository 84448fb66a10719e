//! # stockroom-db: Storage and Services for the Stock Ledger
//!
//! SQLite storage (via sqlx) for products, stock records, the stock ledger
//! and the sales stream, plus the two services built on top of it.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Back-office Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /inventory/:id/mutations, GET /revenue/summary)    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   stockroom-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Services    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │ (service/)    │    │ (repository/) │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ StockLedger   │───►│ StockRepo     │    │ 001_initial_ │  │   │
//! │  │   │ Revenue-      │    │ LedgerRepo    │    │   schema.sql │  │   │
//! │  │   │  Aggregator   │───►│ SaleRepo      │    │              │  │   │
//! │  │   └───────┬───────┘    └───────────────┘    └──────────────┘  │   │
//! │  │           │ KeyedLocks · TtlCache · LedgerConfig               │   │
//! │  │           ▼                                                     │   │
//! │  │   stockroom-core  (stock arithmetic, periods, buckets)          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool and the [`Database`] handle
//! - [`config`] - Service tuning read from the environment
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Storage and service error types
//! - [`repository`] - Table-level access
//! - [`service`] - Stock ledger engine and revenue aggregator
//! - [`locks`], [`cache`] - Per-product locks and the revenue answer cache
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stockroom_db::{Database, DbConfig, LedgerConfig, MutationRequest};
//! use stockroom_core::{MutationKind, Period};
//!
//! let db = Database::connect(DbConfig::from_env()?, LedgerConfig::from_env()?).await?;
//!
//! let outcome = db
//!     .stock_ledger()
//!     .apply_mutation(MutationRequest::new(&product_id, MutationKind::Remove, 2, "order"))
//!     .await?;
//!
//! let today = db.revenue().summarize(Period::Daily, None, chrono::Utc::now()).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod config;
pub mod error;
pub mod locks;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod service;

#[cfg(test)]
pub(crate) mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, LedgerConfig};
pub use error::{DbError, DbResult, ErrorKind, LedgerError, LedgerResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::ledger::LedgerRepository;
pub use repository::product::ProductRepository;
pub use repository::sale::{SaleRepository, WindowEnd};
pub use repository::stock::StockRepository;

pub use service::revenue::RevenueAggregator;
pub use service::stock_ledger::{
    BulkEntry, BulkEntryResult, BulkOutcome, LowStockItem, MutationOutcome, MutationRequest,
    StockLedger,
};
