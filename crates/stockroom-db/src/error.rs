//! # Database and Service Error Types
//!
//! `DbError` categorizes storage failures; `LedgerError` is what the stock
//! ledger and revenue services return to their callers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          ValidationError / CoreError       │
//! │       │                                     │                           │
//! │       ▼                                     │                           │
//! │  DbError ← Adds context and categorization  │                           │
//! │       │                                     │                           │
//! │       ▼                                     ▼                           │
//! │  LedgerError { InvalidArgument | NotFound | Conflict | StorageFault }  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ErrorKind { client | transient | server } ← HTTP layer picks status    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use stockroom_core::{CoreError, ValidationError};
use thiserror::Error;

/// Database operation errors.
///
/// These errors wrap sqlx errors and provide additional context
/// for debugging and user feedback.
#[derive(Debug, Error)]
pub enum DbError {
    /// Entity not found in database.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Inserting a duplicate SKU or order id
    /// - Two ledger entries claiming the same (product, sequence)
    /// - Reusing an idempotency key for a product
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// CHECK constraint violation (negative stock, reserved above current).
    #[error("Constraint violation: {message}")]
    CheckViolation { message: String },

    /// Input rejected before reaching SQL.
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file doesn't exist and can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed to begin or commit.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DbError::PoolExhausted | DbError::ConnectionFailed(_) | DbError::TransactionFailed(_)
        )
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message();

                // SQLite constraint messages:
                // "UNIQUE constraint failed: <table>.<column>"
                // "FOREIGN KEY constraint failed"
                // "CHECK constraint failed: <expr>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation {
                        message: msg.to_string(),
                    }
                } else if msg.contains("CHECK constraint failed") {
                    DbError::CheckViolation {
                        message: msg.to_string(),
                    }
                } else {
                    DbError::QueryFailed(msg.to_string())
                }
            }

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Service Errors
// =============================================================================

/// Response class for a [`LedgerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The request itself is wrong; do not retry unchanged.
    Client,
    /// Lost a race or hit a busy store; retry may succeed.
    Transient,
    /// Storage or internal failure.
    Server,
}

/// Errors returned by the stock ledger and revenue services.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed or out-of-range input: bad kind, negative amount, blank
    /// reason, bad page, bad period/granularity.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The referenced product or stock record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Another writer kept winning the compare-and-set on this product.
    #[error("Concurrent modification of product {product_id} ({attempts} attempts)")]
    Conflict { product_id: String, attempts: u32 },

    /// The store failed. Never swallowed.
    #[error("Storage fault: {0}")]
    StorageFault(#[source] DbError),
}

impl LedgerError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::InvalidArgument(_) | LedgerError::NotFound { .. } => ErrorKind::Client,
            LedgerError::Conflict { .. } => ErrorKind::Transient,
            LedgerError::StorageFault(err) if err.is_transient() => ErrorKind::Transient,
            LedgerError::StorageFault(_) => ErrorKind::Server,
        }
    }

    /// Stable machine-readable code for API responses.
    pub const fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidArgument(_) => "INVALID_ARGUMENT",
            LedgerError::NotFound { .. } => "NOT_FOUND",
            LedgerError::Conflict { .. } => "CONFLICT",
            LedgerError::StorageFault(_) => "STORAGE_FAULT",
        }
    }
}

impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        LedgerError::InvalidArgument(err.to_string())
    }
}

impl From<CoreError> for LedgerError {
    fn from(err: CoreError) -> Self {
        LedgerError::InvalidArgument(err.to_string())
    }
}

impl From<DbError> for LedgerError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => LedgerError::NotFound { entity, id },
            DbError::Validation(v) => LedgerError::InvalidArgument(v.to_string()),
            other => LedgerError::StorageFault(other),
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        LedgerError::from(DbError::from(err))
    }
}

/// Result type for service operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
