//! # Services
//!
//! The two components with invariants, built on the repositories:
//!
//! - [`StockLedger`](stock_ledger::StockLedger) - validated stock mutations,
//!   per-product ordering, ledger writes, low-stock and history queries
//! - [`RevenueAggregator`](revenue::RevenueAggregator) - summaries, trends,
//!   comparisons and rankings over the sales stream
//!
//! Both return [`LedgerError`](crate::error::LedgerError).

pub mod revenue;
pub mod stock_ledger;
