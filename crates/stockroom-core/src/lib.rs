//! # stockroom-core: Pure Business Logic for the Stock Ledger
//!
//! This crate holds the rules of the inventory stock ledger and the revenue
//! rollups as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockroom Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Back-office HTTP / CRUD layer (external)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │         stockroom-db services (StockLedger, RevenueAggregator)  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ stockroom-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   stock   │  │  revenue  │  │ validation│  │   │
//! │  │   │  Product  │  │ Mutation  │  │  Period   │  │   rules   │  │   │
//! │  │   │ StockRec  │  │  fold     │  │  Buckets  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, StockRecord, StockTransaction, SaleRecord)
//! - [`stock`] - Mutation kinds, stock arithmetic, ledger fold/verification
//! - [`revenue`] - Periods, granularities, bucketing and aggregation
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use stockroom_core::stock::{compute_new_stock, MutationKind};
//!
//! // Over-removal clamps to zero
//! assert_eq!(compute_new_stock(6, MutationKind::Remove, 10).unwrap(), 0);
//! assert_eq!(compute_new_stock(6, MutationKind::Add, 4).unwrap(), 10);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod revenue;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use revenue::{Granularity, Period, RevenueAggregate, RevenueBucket};
pub use stock::{MutationKind, TransactionType};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Actor recorded on ledger entries when the caller does not name one.
pub const DEFAULT_ACTOR: &str = "system";

/// Maximum length of a mutation reason.
pub const MAX_REASON_LEN: usize = 500;

/// Maximum length of a correlation reference or idempotency key.
pub const MAX_REFERENCE_LEN: usize = 100;

/// Largest lookback window accepted by trend/top-product queries (~10 years).
pub const MAX_WINDOW_DAYS: u32 = 3660;

/// Largest result count accepted by top-product queries.
pub const MAX_TOP_PRODUCTS: u32 = 100;
