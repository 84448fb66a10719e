//! # Validation Module
//!
//! Boundary checks for ledger and analytics inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP layer (external)                                        │
//! │  ├── Request schema, parameter parsing                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: Services (stockroom-db)                                      │
//! │  └── THIS MODULE: field rules, enum parsing, paging bounds             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (current_stock >= 0), CHECK (reserved <= current)           │
//! │  ├── UNIQUE (sku), UNIQUE (order_id), UNIQUE (product_id, sequence)    │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use stockroom_core::validation::{parse_amount, validate_reason};
//!
//! assert_eq!(parse_amount(Some("12")).unwrap(), 12);
//! assert!(parse_amount(Some("twelve")).is_err());
//! assert!(parse_amount(None).is_err());
//! assert!(validate_reason("cycle count").is_ok());
//! ```

use crate::error::ValidationError;
use crate::types::NewProduct;
use crate::{MAX_REASON_LEN, MAX_REFERENCE_LEN, MAX_TOP_PRODUCTS, MAX_WINDOW_DAYS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use stockroom_core::validation::validate_sku;
///
/// assert!(validate_sku("WIDGET-01").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("has space").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name (1-200 characters).
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a product id reference (non-blank, at most 64 characters).
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "productId".to_string(),
        });
    }

    if id.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "productId".to_string(),
            max: 64,
        });
    }

    Ok(())
}

/// Validates a mutation reason. Every ledger entry must say why it exists.
pub fn validate_reason(reason: &str) -> ValidationResult<()> {
    if reason.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.len() > MAX_REASON_LEN {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LEN,
        });
    }

    Ok(())
}

/// Validates an optional correlation reference or idempotency key.
///
/// Blank strings count as absent; callers should normalize with
/// [`normalize_optional`] first.
pub fn validate_reference(field: &str, reference: Option<&str>) -> ValidationResult<()> {
    if let Some(reference) = reference {
        if reference.len() > MAX_REFERENCE_LEN {
            return Err(ValidationError::TooLong {
                field: field.to_string(),
                max: MAX_REFERENCE_LEN,
            });
        }
    }
    Ok(())
}

/// Trims an optional string and maps blank values to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a mutation amount: present and non-negative.
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Stock adjustment form                                                 │
/// │                                                                         │
/// │  amount: ""   → Required                                               │
/// │  amount: -3   → MustNotBeNegative                                      │
/// │  amount: 0    → OK (set to zero, or a no-op add/remove)                │
/// │  amount: 12   → OK                                                     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_amount(amount: Option<i64>) -> ValidationResult<i64> {
    let amount = amount.ok_or_else(|| ValidationError::Required {
        field: "amount".to_string(),
    })?;

    if amount < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "amount".to_string(),
        });
    }

    Ok(amount)
}

/// Parses a raw amount string from a form or query string.
pub fn parse_amount(raw: Option<&str>) -> ValidationResult<i64> {
    let raw = raw.map(str::trim).filter(|s| !s.is_empty());
    let parsed = match raw {
        None => None,
        Some(s) => Some(s.parse::<i64>().map_err(|_| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: "must be a whole number".to_string(),
        })?),
    };
    validate_amount(parsed)
}

/// Validates paging parameters.
///
/// ## Rules
/// - `page >= 1`
/// - `1 <= page_size <= max_page_size`
pub fn validate_page(page: u32, page_size: u32, max_page_size: u32) -> ValidationResult<()> {
    if page == 0 {
        return Err(ValidationError::OutOfRange {
            field: "page".to_string(),
            min: 1,
            max: u32::MAX as i64,
        });
    }

    if page_size == 0 || page_size > max_page_size {
        return Err(ValidationError::OutOfRange {
            field: "pageSize".to_string(),
            min: 1,
            max: max_page_size as i64,
        });
    }

    Ok(())
}

/// Validates a lookback window in days.
pub fn validate_window_days(days: u32) -> ValidationResult<()> {
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(ValidationError::OutOfRange {
            field: "windowDays".to_string(),
            min: 1,
            max: MAX_WINDOW_DAYS as i64,
        });
    }
    Ok(())
}

/// Validates a top-N limit.
pub fn validate_limit(limit: u32) -> ValidationResult<()> {
    if limit == 0 || limit > MAX_TOP_PRODUCTS {
        return Err(ValidationError::OutOfRange {
            field: "limit".to_string(),
            min: 1,
            max: MAX_TOP_PRODUCTS as i64,
        });
    }
    Ok(())
}

/// Validates a price or cost in cents (zero allowed).
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates the fields of a product about to be created.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_sku(&product.sku)?;
    validate_product_name(&product.name)?;
    validate_price_cents("priceCents", product.price_cents)?;
    validate_price_cents("costCents", product.cost_cents)?;

    if product.reorder_threshold < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: "reorderThreshold".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
