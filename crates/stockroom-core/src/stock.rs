//! # Stock Mutation Rules
//!
//! The arithmetic behind every stock change, kept free of I/O so the ledger
//! engine and the tests share one implementation.
//!
//! ## Mutation Kinds
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  kind     new stock                      ledger type                    │
//! │  ──────   ───────────────────────────    ───────────                    │
//! │  add      current + amount               inbound                        │
//! │  remove   max(0, current - amount)       outbound   (clamped at zero)   │
//! │  set      amount                         adjustment                     │
//! │                                                                         │
//! │  delta = new - previous   (signed, what the ledger folds)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reconstructability
//! A product's ledger, folded by adding deltas from zero, reproduces its
//! current stock. [`audit_ledger`] checks that plus the previous/new chain.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::StockTransaction;

// =============================================================================
// Mutation Kind
// =============================================================================

/// How a mutation's amount is applied to current stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Add,
    Remove,
    Set,
}

impl MutationKind {
    pub const ALL: [&'static str; 3] = ["add", "remove", "set"];

    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationKind::Add => "add",
            MutationKind::Remove => "remove",
            MutationKind::Set => "set",
        }
    }

    /// Ledger classification for entries produced by this kind.
    pub const fn transaction_type(&self) -> TransactionType {
        match self {
            MutationKind::Add => TransactionType::Inbound,
            MutationKind::Remove => TransactionType::Outbound,
            MutationKind::Set => TransactionType::Adjustment,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "add" => Ok(MutationKind::Add),
            "remove" => Ok(MutationKind::Remove),
            "set" => Ok(MutationKind::Set),
            _ => Err(ValidationError::not_allowed("kind", &Self::ALL)),
        }
    }
}

/// Ledger entry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Inbound,
    Outbound,
    Adjustment,
}

impl TransactionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Inbound => "inbound",
            TransactionType::Outbound => "outbound",
            TransactionType::Adjustment => "adjustment",
        }
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

/// Computes the stock level after applying `kind` with `amount`.
///
/// ## Errors
/// - `amount < 0` → `ValidationError::MustNotBeNegative`
/// - `add` overflowing `i64` → `CoreError::StockOverflow`
///
/// ## Example
/// ```rust
/// use stockroom_core::stock::{compute_new_stock, MutationKind};
///
/// assert_eq!(compute_new_stock(10, MutationKind::Remove, 3).unwrap(), 7);
/// assert_eq!(compute_new_stock(2, MutationKind::Remove, 5).unwrap(), 0);
/// assert_eq!(compute_new_stock(2, MutationKind::Set, 40).unwrap(), 40);
/// assert!(compute_new_stock(2, MutationKind::Add, -1).is_err());
/// ```
pub fn compute_new_stock(current: i64, kind: MutationKind, amount: i64) -> CoreResult<i64> {
    if amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        }
        .into());
    }

    match kind {
        MutationKind::Add => current.checked_add(amount).ok_or(CoreError::StockOverflow {
            current,
            kind: kind.to_string(),
            amount,
        }),
        MutationKind::Remove => Ok(current.saturating_sub(amount).max(0)),
        MutationKind::Set => Ok(amount),
    }
}

/// Everything the engine needs to write for one accepted mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationPlan {
    pub kind: MutationKind,
    pub requested_amount: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub delta: i64,
    /// Reserved stock after the mutation (lowered when stock drops below it).
    pub new_reserved: i64,
    /// `remove` asked for more than was on hand.
    pub clamped: bool,
}

impl MutationPlan {
    pub fn transaction_type(&self) -> TransactionType {
        self.kind.transaction_type()
    }

    /// Whether reserved stock had to be lowered to stay within current stock.
    pub fn reservation_trimmed(&self, previous_reserved: i64) -> bool {
        self.new_reserved < previous_reserved
    }
}

/// Plans a mutation against a record's current and reserved stock.
///
/// Keeps `0 <= reserved <= current` by lowering reserved stock when the new
/// current stock falls below it.
pub fn plan_mutation(
    current_stock: i64,
    reserved_stock: i64,
    kind: MutationKind,
    amount: i64,
) -> CoreResult<MutationPlan> {
    let new_stock = compute_new_stock(current_stock, kind, amount)?;
    let clamped = kind == MutationKind::Remove && amount > current_stock;

    Ok(MutationPlan {
        kind,
        requested_amount: amount,
        previous_stock: current_stock,
        new_stock,
        delta: new_stock - current_stock,
        new_reserved: reserved_stock.clamp(0, new_stock),
        clamped,
    })
}

/// Checks a new reserved level against current stock.
pub fn validate_reservation(current_stock: i64, reserved: i64) -> CoreResult<()> {
    if reserved < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "reservedStock".to_string(),
        }
        .into());
    }
    if reserved > current_stock {
        return Err(CoreError::ReservationExceedsStock {
            reserved,
            current: current_stock,
        });
    }
    Ok(())
}

// =============================================================================
// Ledger Audit
// =============================================================================

/// Sums signed deltas starting from zero.
pub fn fold_deltas<I>(deltas: I) -> i64
where
    I: IntoIterator<Item = i64>,
{
    deltas.into_iter().sum()
}

/// Result of replaying a product's ledger against its stock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LedgerAudit {
    pub product_id: String,
    pub entries: u64,
    pub folded_stock: i64,
    pub current_stock: i64,
    /// Sequence of the first entry that does not continue the chain.
    pub first_break: Option<i64>,
    pub consistent: bool,
}

/// Replays `entries` (oldest first) and compares with `current_stock`.
///
/// An entry breaks the chain when its sequence is not the next integer, its
/// `previous_stock` differs from the prior `new_stock` (0 for the first
/// entry), or its delta disagrees with its own previous/new values.
pub fn audit_ledger(
    product_id: &str,
    entries: &[StockTransaction],
    current_stock: i64,
) -> LedgerAudit {
    let mut expected_previous = 0;
    let mut first_break = None;

    for (index, entry) in entries.iter().enumerate() {
        let chained = entry.sequence == index as i64 + 1
            && entry.previous_stock == expected_previous
            && entry.new_stock - entry.previous_stock == entry.delta;
        if !chained && first_break.is_none() {
            first_break = Some(entry.sequence);
        }
        expected_previous = entry.new_stock;
    }

    let folded_stock = fold_deltas(entries.iter().map(|e| e.delta));

    LedgerAudit {
        product_id: product_id.to_string(),
        entries: entries.len() as u64,
        folded_stock,
        current_stock,
        first_break,
        consistent: first_break.is_none() && folded_stock == current_stock,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
