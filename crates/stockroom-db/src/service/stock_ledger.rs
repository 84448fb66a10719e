//! # Stock Ledger Engine
//!
//! Applies stock mutations and keeps the ledger that explains them.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_mutation(request)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate   product id, amount >= 0, reason, reference, key            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  lock(product_id) ─────────────────────────────────────────────┐        │
//! │       │                                                        │        │
//! │       ▼                                              attempt ≤ retries+1│
//! │  idempotency key seen?  ── yes ──► return original, replayed   │        │
//! │       │ no                                                     │        │
//! │       ▼                                                        │        │
//! │  read record (version v) → plan_mutation (stockroom-core)      │        │
//! │       │                                                        │        │
//! │       ▼                                                        │        │
//! │  BEGIN                                                         │        │
//! │    UPDATE stock_records ... WHERE version = v   ── 0 rows ─────┘        │
//! │    INSERT stock_transactions (sequence = v + 1)                         │
//! │  COMMIT                                                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  MutationOutcome { record, transaction, replayed: false }               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The record update and the ledger append commit together or not at all, so
//! the ledger always folds to the record's current stock.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{DbError, ErrorKind, LedgerError, LedgerResult};
use crate::config::LedgerConfig;
use crate::locks::KeyedLocks;
use crate::repository::ledger::LedgerRepository;
use crate::repository::stock::StockRepository;
use stockroom_core::stock::{audit_ledger, plan_mutation, validate_reservation, LedgerAudit, MutationPlan};
use stockroom_core::validation::{
    normalize_optional, parse_amount, validate_amount, validate_page, validate_product_id,
    validate_reason, validate_reference,
};
use stockroom_core::{
    DateRange, MutationKind, Page, StockFilter, StockRecord, StockSnapshot, StockTransaction,
    DEFAULT_ACTOR,
};

/// Reason recorded for bulk entries that do not give one.
pub const BULK_DEFAULT_REASON: &str = "Bulk update";

/// A low-stock result: the product, its stock record and derived fields.
pub type LowStockItem = StockSnapshot;

// =============================================================================
// Requests and Outcomes
// =============================================================================

/// One stock mutation as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    pub product_id: String,
    pub kind: MutationKind,
    /// Units to add or remove, or the target level for `set`.
    pub amount: Option<i64>,
    pub reason: String,
    #[serde(default)]
    pub reference: Option<String>,
    /// Replaying a request with the same key returns the first result.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

impl MutationRequest {
    pub fn new(
        product_id: impl Into<String>,
        kind: MutationKind,
        amount: i64,
        reason: impl Into<String>,
    ) -> Self {
        MutationRequest {
            product_id: product_id.into(),
            kind,
            amount: Some(amount),
            reason: reason.into(),
            reference: None,
            idempotency_key: None,
            actor: None,
        }
    }

    /// Builds a request from raw form/query strings.
    ///
    /// Unknown kinds and non-numeric or missing amounts are `InvalidArgument`.
    pub fn parse(
        product_id: &str,
        kind: &str,
        amount: Option<&str>,
        reason: &str,
    ) -> LedgerResult<Self> {
        let kind: MutationKind = kind.parse()?;
        let amount = parse_amount(amount)?;
        Ok(MutationRequest::new(product_id, kind, amount, reason))
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }
}

/// Result of an accepted (or replayed) mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationOutcome {
    pub record: StockRecord,
    pub transaction: StockTransaction,
    /// The idempotency key matched an earlier mutation; nothing was applied.
    pub replayed: bool,
}

/// One entry of a bulk stock count. Applied with `set` semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkEntry {
    pub product_id: String,
    /// New absolute stock level.
    pub amount: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
}

impl BulkEntry {
    pub fn new(product_id: impl Into<String>, amount: i64) -> Self {
        BulkEntry {
            product_id: product_id.into(),
            amount: Some(amount),
            reason: None,
            reference: None,
        }
    }
}

/// Per-entry result of a bulk application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BulkEntryResult {
    Applied {
        product_id: String,
        previous_stock: i64,
        new_stock: i64,
        transaction: StockTransaction,
    },
    Failed {
        product_id: String,
        kind: ErrorKind,
        error: String,
    },
}

impl BulkEntryResult {
    pub fn product_id(&self) -> &str {
        match self {
            BulkEntryResult::Applied { product_id, .. } | BulkEntryResult::Failed { product_id, .. } => {
                product_id
            }
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, BulkEntryResult::Applied { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    /// One result per input entry, in input order.
    pub results: Vec<BulkEntryResult>,
    pub success_count: usize,
    pub error_count: usize,
}

/// A request that passed boundary validation.
#[derive(Debug, Clone)]
struct ValidatedMutation {
    product_id: String,
    kind: MutationKind,
    amount: i64,
    reason: String,
    reference: Option<String>,
    idempotency_key: Option<String>,
    actor: String,
}

impl TryFrom<MutationRequest> for ValidatedMutation {
    type Error = LedgerError;

    fn try_from(request: MutationRequest) -> LedgerResult<Self> {
        validate_product_id(&request.product_id)?;
        let amount = validate_amount(request.amount)?;
        validate_reason(&request.reason)?;

        let reference = normalize_optional(request.reference);
        validate_reference("reference", reference.as_deref())?;

        let idempotency_key = normalize_optional(request.idempotency_key);
        validate_reference("idempotencyKey", idempotency_key.as_deref())?;

        let actor = normalize_optional(request.actor).unwrap_or_else(|| DEFAULT_ACTOR.to_string());
        validate_reference("actor", Some(&actor))?;

        Ok(ValidatedMutation {
            product_id: request.product_id.trim().to_string(),
            kind: request.kind,
            amount,
            reason: request.reason.trim().to_string(),
            reference,
            idempotency_key,
            actor,
        })
    }
}

// =============================================================================
// Engine
// =============================================================================

/// The stock ledger engine.
///
/// Obtained from [`Database::stock_ledger`](crate::Database::stock_ledger);
/// all handles from one `Database` share the same per-product locks.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
    stock: StockRepository,
    ledger: LedgerRepository,
    locks: KeyedLocks,
    config: LedgerConfig,
}

impl StockLedger {
    pub fn new(pool: SqlitePool, locks: KeyedLocks, config: LedgerConfig) -> Self {
        StockLedger {
            stock: StockRepository::new(pool.clone()),
            ledger: LedgerRepository::new(pool.clone()),
            pool,
            locks,
            config,
        }
    }

    /// Applies one add/remove/set mutation.
    ///
    /// ## Errors
    /// - `InvalidArgument` - missing/negative amount, blank reason, overlong
    ///   reference, overflowing add
    /// - `NotFound` - no stock record for the product
    /// - `Conflict` - lost the version check more than `max_conflict_retries` times
    /// - `StorageFault` - the store failed; nothing was written
    pub async fn apply_mutation(&self, request: MutationRequest) -> LedgerResult<MutationOutcome> {
        let mutation = ValidatedMutation::try_from(request)?;

        let guard = self.locks.lock(&mutation.product_id).await;
        let result = self.apply_locked(&mutation).await;
        drop(guard);
        self.locks.release(&mutation.product_id).await;

        result
    }

    async fn apply_locked(&self, mutation: &ValidatedMutation) -> LedgerResult<MutationOutcome> {
        let attempts = self.config.max_conflict_retries.saturating_add(1);

        for attempt in 1..=attempts {
            if let Some(key) = &mutation.idempotency_key {
                if let Some(original) = self
                    .ledger
                    .find_by_idempotency_key(&mutation.product_id, key)
                    .await?
                {
                    let record = self.require_record(&mutation.product_id).await?;
                    info!(
                        product_id = %mutation.product_id,
                        idempotency_key = %key,
                        sequence = original.sequence,
                        "Replayed mutation; returning original entry"
                    );
                    return Ok(MutationOutcome {
                        record,
                        transaction: original,
                        replayed: true,
                    });
                }
            }

            let record = self.require_record(&mutation.product_id).await?;
            let plan = plan_mutation(
                record.current_stock,
                record.reserved_stock,
                mutation.kind,
                mutation.amount,
            )?;

            if plan.clamped {
                warn!(
                    product_id = %mutation.product_id,
                    requested = mutation.amount,
                    on_hand = record.current_stock,
                    "Remove exceeds stock on hand; clamped to zero"
                );
            }
            if plan.reservation_trimmed(record.reserved_stock) {
                warn!(
                    product_id = %mutation.product_id,
                    reserved = record.reserved_stock,
                    new_reserved = plan.new_reserved,
                    "Stock fell below reservations; reserved stock lowered"
                );
            }

            match self.try_commit(mutation, &record, &plan).await? {
                Some(outcome) => {
                    info!(
                        product_id = %mutation.product_id,
                        kind = %mutation.kind,
                        delta = plan.delta,
                        new_stock = plan.new_stock,
                        sequence = outcome.transaction.sequence,
                        "Stock mutation applied"
                    );
                    return Ok(outcome);
                }
                None => {
                    warn!(
                        product_id = %mutation.product_id,
                        attempt,
                        version = record.version,
                        "Stock record changed underneath mutation; retrying"
                    );
                }
            }
        }

        Err(LedgerError::Conflict {
            product_id: mutation.product_id.clone(),
            attempts,
        })
    }

    /// Writes the record update and the ledger entry in one transaction.
    ///
    /// `Ok(None)` means another writer got there first and nothing was
    /// written.
    async fn try_commit(
        &self,
        mutation: &ValidatedMutation,
        record: &StockRecord,
        plan: &MutationPlan,
    ) -> LedgerResult<Option<MutationOutcome>> {
        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let Some(updated) = StockRepository::compare_and_set(
            &mut *tx,
            &mutation.product_id,
            record.version,
            plan.new_stock,
            now,
        )
        .await?
        else {
            tx.rollback().await?;
            return Ok(None);
        };

        let transaction = StockTransaction {
            id: Uuid::new_v4().to_string(),
            product_id: mutation.product_id.clone(),
            sequence: updated.version,
            transaction_type: plan.transaction_type(),
            mutation_kind: plan.kind,
            requested_amount: plan.requested_amount,
            delta: plan.delta,
            previous_stock: plan.previous_stock,
            new_stock: plan.new_stock,
            reason: mutation.reason.clone(),
            reference: mutation.reference.clone(),
            idempotency_key: mutation.idempotency_key.clone(),
            actor: mutation.actor.clone(),
            created_at: now,
        };

        match LedgerRepository::append(&mut *tx, &transaction).await {
            Ok(()) => {}
            // Sequence or idempotency key claimed by a writer outside this process
            Err(DbError::UniqueViolation { .. }) => {
                tx.rollback().await?;
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(Some(MutationOutcome {
            record: updated,
            transaction,
            replayed: false,
        }))
    }

    /// Applies a stock count: each entry sets one product's stock.
    ///
    /// Entries run one after another in input order. An entry that fails
    /// validation, names an unknown product or keeps losing the version check
    /// is reported and the batch continues. A storage fault is reported the
    /// same way, with kind `Server`, and the remaining entries still run.
    pub async fn bulk_apply(&self, entries: Vec<BulkEntry>) -> BulkOutcome {
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            let product_id = entry.product_id.clone();
            let reference = normalize_optional(entry.reference).unwrap_or_else(|| {
                format!("BULK-{}-{}", Utc::now().timestamp_millis(), product_id)
            });
            let reason = normalize_optional(entry.reason)
                .unwrap_or_else(|| BULK_DEFAULT_REASON.to_string());

            let request = MutationRequest {
                product_id: entry.product_id,
                kind: MutationKind::Set,
                amount: entry.amount,
                reason,
                reference: Some(reference),
                idempotency_key: None,
                actor: None,
            };

            match self.apply_mutation(request).await {
                Ok(outcome) => results.push(BulkEntryResult::Applied {
                    product_id,
                    previous_stock: outcome.transaction.previous_stock,
                    new_stock: outcome.transaction.new_stock,
                    transaction: outcome.transaction,
                }),
                Err(err) => {
                    if matches!(err, LedgerError::StorageFault(_)) {
                        error!(product_id = %product_id, error = %err, "Bulk entry hit a storage fault");
                    } else {
                        debug!(product_id = %product_id, error = %err, "Bulk entry rejected");
                    }
                    results.push(BulkEntryResult::Failed {
                        product_id,
                        kind: err.kind(),
                        error: err.to_string(),
                    });
                }
            }
        }

        let success_count = results.iter().filter(|r| r.is_applied()).count();
        let error_count = results.len() - success_count;

        info!(success_count, error_count, "Bulk inventory update completed");

        BulkOutcome {
            results,
            success_count,
            error_count,
        }
    }

    /// Active products at or below their reorder threshold, lowest available
    /// stock first.
    pub async fn low_stock_items(&self) -> LedgerResult<Vec<LowStockItem>> {
        Ok(self.stock.low_stock().await?)
    }

    /// The inventory listing: stock records with their products, most
    /// recently changed first.
    ///
    /// Blank `warehouse`/`search` values are ignored. Paging works as in
    /// [`transaction_history`](Self::transaction_history).
    pub async fn list_stock(
        &self,
        filter: StockFilter,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> LedgerResult<Page<StockSnapshot>> {
        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(self.config.default_page_size);
        validate_page(page, page_size, self.config.max_page_size)?;

        let filter = StockFilter {
            warehouse: normalize_optional(filter.warehouse),
            search: normalize_optional(filter.search),
            low_stock_only: filter.low_stock_only,
        };

        Ok(self.stock.list(&filter, page, page_size).await?)
    }

    /// A product's ledger, newest first, one page at a time.
    ///
    /// `page` defaults to 1 and `page_size` to the configured default.
    pub async fn transaction_history(
        &self,
        product_id: &str,
        range: DateRange,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> LedgerResult<Page<StockTransaction>> {
        validate_product_id(product_id)?;
        range.validate()?;

        let page = page.unwrap_or(1);
        let page_size = page_size.unwrap_or(self.config.default_page_size);
        validate_page(page, page_size, self.config.max_page_size)?;

        self.require_record(product_id).await?;

        Ok(self.ledger.history(product_id, &range, page, page_size).await?)
    }

    /// Stock record and product with derived available/low-stock fields.
    pub async fn stock_status(&self, product_id: &str) -> LedgerResult<StockSnapshot> {
        validate_product_id(product_id)?;
        self.stock
            .get_snapshot(product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("StockRecord", product_id))
    }

    /// Sets how many units are promised to open orders.
    ///
    /// Current stock is unchanged, so no ledger entry is written.
    pub async fn set_reserved_stock(&self, product_id: &str, reserved: i64) -> LedgerResult<StockRecord> {
        validate_product_id(product_id)?;

        let guard = self.locks.lock(product_id).await;
        let result = self.set_reserved_locked(product_id, reserved).await;
        drop(guard);
        self.locks.release(product_id).await;

        result
    }

    async fn set_reserved_locked(&self, product_id: &str, reserved: i64) -> LedgerResult<StockRecord> {
        let attempts = self.config.max_conflict_retries.saturating_add(1);

        for attempt in 1..=attempts {
            let record = self.require_record(product_id).await?;
            validate_reservation(record.current_stock, reserved)?;

            if let Some(updated) = self
                .stock
                .set_reserved(product_id, record.version, reserved, Utc::now())
                .await?
            {
                info!(
                    product_id = %product_id,
                    reserved,
                    available = updated.available_stock(),
                    "Reserved stock updated"
                );
                return Ok(updated);
            }

            warn!(product_id = %product_id, attempt, "Reservation lost version check; retrying");
        }

        Err(LedgerError::Conflict {
            product_id: product_id.to_string(),
            attempts,
        })
    }

    /// Replays a product's ledger against its stock record.
    pub async fn verify_ledger(&self, product_id: &str) -> LedgerResult<LedgerAudit> {
        validate_product_id(product_id)?;

        let guard = self.locks.lock(product_id).await;
        let result = async {
            let record = self.require_record(product_id).await?;
            let entries = self.ledger.all_for_product(product_id).await?;
            Ok::<_, LedgerError>(audit_ledger(product_id, &entries, record.current_stock))
        }
        .await;
        drop(guard);
        self.locks.release(product_id).await;

        let audit = result?;
        if !audit.consistent {
            error!(
                product_id = %product_id,
                folded = audit.folded_stock,
                current = audit.current_stock,
                first_break = ?audit.first_break,
                "Ledger does not reproduce stock record"
            );
        }
        Ok(audit)
    }

    async fn require_record(&self, product_id: &str) -> LedgerResult<StockRecord> {
        self.stock
            .get(product_id)
            .await?
            .ok_or_else(|| LedgerError::not_found("StockRecord", product_id))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{seeded_db, widget};

    #[tokio::test]
    async fn test_add_remove_set_and_ledger_chain() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();

        let added = ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Add, 10, "restock"))
            .await
            .unwrap();
        assert_eq!(added.record.current_stock, 10);
        assert_eq!(added.record.version, 1);
        assert_eq!(added.transaction.sequence, 1);
        assert_eq!(added.transaction.transaction_type.as_str(), "inbound");
        assert_eq!(added.transaction.actor, DEFAULT_ACTOR);
        assert!(!added.replayed);

        let removed = ledger
            .apply_mutation(
                MutationRequest::new(&product.id, MutationKind::Remove, 4, "order")
                    .reference("ORD-1")
                    .actor("picker-7"),
            )
            .await
            .unwrap();
        assert_eq!(removed.record.current_stock, 6);
        assert_eq!(removed.transaction.delta, -4);
        assert_eq!(removed.transaction.previous_stock, 10);
        assert_eq!(removed.transaction.reference.as_deref(), Some("ORD-1"));
        assert_eq!(removed.transaction.actor, "picker-7");

        let set = ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Set, 2, "cycle count"))
            .await
            .unwrap();
        assert_eq!(set.transaction.delta, -4);
        assert_eq!(set.transaction.transaction_type.as_str(), "adjustment");

        let audit = ledger.verify_ledger(&product.id).await.unwrap();
        assert!(audit.consistent);
        assert_eq!(audit.entries, 3);
        assert_eq!(audit.folded_stock, 2);
    }

    #[tokio::test]
    async fn test_over_remove_clamps_and_records_request() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();
        ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Add, 6, "restock"))
            .await
            .unwrap();

        let outcome = ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Remove, 10, "damage"))
            .await
            .unwrap();
        assert_eq!(outcome.record.current_stock, 0);
        assert_eq!(outcome.transaction.delta, -6);
        assert_eq!(outcome.transaction.requested_amount, 10);
        assert!(outcome.transaction.was_clamped());
    }

    #[tokio::test]
    async fn test_invalid_requests() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();

        let mut missing_amount = MutationRequest::new(&product.id, MutationKind::Add, 1, "x");
        missing_amount.amount = None;
        assert!(matches!(
            ledger.apply_mutation(missing_amount).await,
            Err(LedgerError::InvalidArgument(_))
        ));

        assert!(matches!(
            ledger
                .apply_mutation(MutationRequest::new(&product.id, MutationKind::Set, -1, "x"))
                .await,
            Err(LedgerError::InvalidArgument(_))
        ));

        assert!(matches!(
            ledger
                .apply_mutation(MutationRequest::new(&product.id, MutationKind::Add, 1, "  "))
                .await,
            Err(LedgerError::InvalidArgument(_))
        ));

        assert!(matches!(
            MutationRequest::parse(&product.id, "subtract", Some("3"), "x"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            MutationRequest::parse(&product.id, "add", Some("three"), "x"),
            Err(LedgerError::InvalidArgument(_))
        ));

        assert!(matches!(
            ledger
                .apply_mutation(MutationRequest::new("unknown", MutationKind::Add, 1, "x"))
                .await,
            Err(LedgerError::NotFound { .. })
        ));

        // Nothing was written
        assert_eq!(db.ledger().count_for_product(&product.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_add_overflow_is_invalid_argument() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();
        ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Set, i64::MAX, "max"))
            .await
            .unwrap();

        let err = ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Add, 1, "one more"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_idempotent_replay() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();
        let request =
            MutationRequest::new(&product.id, MutationKind::Add, 5, "restock").idempotency_key("po-77");

        let first = ledger.apply_mutation(request.clone()).await.unwrap();
        let second = ledger.apply_mutation(request).await.unwrap();

        assert!(!first.replayed);
        assert!(second.replayed);
        assert_eq!(second.transaction.id, first.transaction.id);
        assert_eq!(second.record.current_stock, 5);
        assert_eq!(db.ledger().count_for_product(&product.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_bulk_reports_per_entry() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();

        let mut no_amount = BulkEntry::new(&product.id, 0);
        no_amount.amount = None;

        let outcome = ledger
            .bulk_apply(vec![
                BulkEntry::new(&product.id, 12),
                BulkEntry::new("ghost", 3),
                no_amount,
            ])
            .await;

        assert_eq!(outcome.success_count, 1);
        assert_eq!(outcome.error_count, 2);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.results[1].product_id(), "ghost");
        assert!(matches!(
            &outcome.results[1],
            BulkEntryResult::Failed { kind: ErrorKind::Client, .. }
        ));

        match &outcome.results[0] {
            BulkEntryResult::Applied { transaction, new_stock, .. } => {
                assert_eq!(*new_stock, 12);
                assert_eq!(transaction.reason, BULK_DEFAULT_REASON);
                assert!(transaction
                    .reference
                    .as_deref()
                    .is_some_and(|r| r.starts_with("BULK-") && r.ends_with(&product.id)));
            }
            other => panic!("expected applied entry, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bulk_continues_past_storage_fault() {
        let (db, first) = seeded_db("W-1").await;
        let second = db.products().insert(&widget("W-2")).await.unwrap();
        let third = db.products().insert(&widget("W-3")).await.unwrap();

        // Every write to the second product's stock record fails in the store
        sqlx::query(&format!(
            "CREATE TRIGGER fail_stock_write BEFORE UPDATE ON stock_records \
             WHEN NEW.product_id = '{}' \
             BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END",
            second.id
        ))
        .execute(db.pool())
        .await
        .unwrap();

        let ledger = db.stock_ledger();
        let outcome = ledger
            .bulk_apply(vec![
                BulkEntry::new(&first.id, 5),
                BulkEntry::new(&second.id, 5),
                BulkEntry::new(&third.id, 7),
            ])
            .await;

        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.error_count, 1);
        assert!(outcome.results[0].is_applied());
        assert!(outcome.results[2].is_applied());
        match &outcome.results[1] {
            BulkEntryResult::Failed { product_id, kind, error } => {
                assert_eq!(product_id, &second.id);
                assert_eq!(*kind, ErrorKind::Server);
                assert!(error.contains("disk I/O error"));
            }
            other => panic!("expected failed entry, got {:?}", other),
        }

        assert_eq!(ledger.stock_status(&first.id).await.unwrap().record.current_stock, 5);
        assert_eq!(ledger.stock_status(&third.id).await.unwrap().record.current_stock, 7);
        assert_eq!(ledger.stock_status(&second.id).await.unwrap().record.current_stock, 0);
        assert_eq!(db.ledger().count_for_product(&second.id).await.unwrap(), 0);
    }

    #[test]
    fn test_bulk_result_wire_format() {
        let failed = BulkEntryResult::Failed {
            product_id: "p-1".to_string(),
            kind: ErrorKind::Client,
            error: "StockRecord not found: p-1".to_string(),
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["productId"], "p-1");
        assert_eq!(json["kind"], "client");
    }

    #[tokio::test]
    async fn test_reservations() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();
        ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Add, 10, "restock"))
            .await
            .unwrap();

        let record = ledger.set_reserved_stock(&product.id, 4).await.unwrap();
        assert_eq!(record.available_stock(), 6);
        assert_eq!(record.version, 1);

        assert!(matches!(
            ledger.set_reserved_stock(&product.id, 11).await,
            Err(LedgerError::InvalidArgument(_))
        ));

        // Removing below the reservation trims it
        let outcome = ledger
            .apply_mutation(MutationRequest::new(&product.id, MutationKind::Remove, 8, "order"))
            .await
            .unwrap();
        assert_eq!(outcome.record.current_stock, 2);
        assert_eq!(outcome.record.reserved_stock, 2);

        let status = ledger.stock_status(&product.id).await.unwrap();
        assert_eq!(status.available_stock, 0);
        assert!(status.is_low_stock);
    }

    #[tokio::test]
    async fn test_history_validation_and_not_found() {
        let (db, product) = seeded_db("W-1").await;
        let ledger = db.stock_ledger();

        assert!(matches!(
            ledger.transaction_history("ghost", DateRange::all(), None, None).await,
            Err(LedgerError::NotFound { .. })
        ));
        assert!(matches!(
            ledger
                .transaction_history(&product.id, DateRange::all(), Some(0), None)
                .await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger
                .transaction_history(&product.id, DateRange::all(), Some(1), Some(1_000))
                .await,
            Err(LedgerError::InvalidArgument(_))
        ));

        let empty = ledger
            .transaction_history(&product.id, DateRange::all(), None, None)
            .await
            .unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.page_size, 20);
    }

    #[tokio::test]
    async fn test_list_stock_normalizes_filter_and_pages() {
        let (db, first) = seeded_db("W-1").await;
        let second = db.products().insert(&widget("W-2")).await.unwrap();
        let ledger = db.stock_ledger();

        ledger
            .apply_mutation(MutationRequest::new(&first.id, MutationKind::Set, 2, "count"))
            .await
            .unwrap();
        ledger
            .apply_mutation(MutationRequest::new(&second.id, MutationKind::Set, 40, "count"))
            .await
            .unwrap();

        let blank = StockFilter {
            warehouse: Some("   ".to_string()),
            search: Some("".to_string()),
            low_stock_only: false,
        };
        let all = ledger.list_stock(blank, None, None).await.unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(all.page, 1);
        assert_eq!(all.page_size, 20);

        let low = StockFilter {
            warehouse: Some(" main ".to_string()),
            low_stock_only: true,
            ..StockFilter::default()
        };
        let low = ledger.list_stock(low, None, None).await.unwrap();
        assert_eq!(low.total, 1);
        assert_eq!(low.items[0].product.id, first.id);
        assert_eq!(low.items[0].available_stock, 2);

        assert!(matches!(
            ledger.list_stock(StockFilter::default(), Some(0), None).await,
            Err(LedgerError::InvalidArgument(_))
        ));
        assert!(matches!(
            ledger.list_stock(StockFilter::default(), None, Some(1_000)).await,
            Err(LedgerError::InvalidArgument(_))
        ));
    }
}
