//! # Validation Module
//!
//! Input validation utilities for Tally POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extractor (axum Json)                                   │
//! │  └── Type validation (deserialization)                                 │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE: Business rule validation                        │
//! │  └── Also re-run by the Sale Ledger before it opens a transaction      │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK (stock >= 0), CHECK (price_cents >= 0)                      │
//! │  ├── UNIQUE sku, UNIQUE email                                          │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tally_core::validation::{validate_sku, validate_quantity};
//!
//! assert!(validate_sku("COKE-330").is_ok());
//! assert!(validate_quantity(0).is_err());
//! ```

use crate::error::ValidationError;
use crate::types::{CreateSale, NewProduct};
use crate::MIN_PASSWORD_LEN;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 50 characters
/// - Should contain only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_sku;
///
/// assert!(validate_sku("COKE-330").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::required("sku"));
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

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be between 1 and 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 200)
}

/// Validates a payment method label ("cash", "card", ...).
///
/// Free-form, but never blank.
pub fn validate_payment_method(method: &str) -> ValidationResult<()> {
    validate_text("payment_method", method, 50)
}

/// Validates a staff display name.
pub fn validate_user_name(name: &str) -> ValidationResult<()> {
    validate_text("name", name, 100)
}

/// Validates an email address.
///
/// Only a light structural check: something before and after a single `@`,
/// and a dot in the domain part.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    validate_text("email", email, 254)?;

    let invalid = || ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: "must look like name@example.com".to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    Ok(())
}

/// Validates a new password (length only).
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::required("password"));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::TooShort {
            field: "password".to_string(),
            min: MIN_PASSWORD_LEN,
        });
    }
    Ok(())
}

fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::required(field));
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
///
/// ## User Workflow
/// ```text
/// Sale line: quantity 3
///      │
///      ▼
/// validate_quantity(3) ← THIS FUNCTION
///      │
///      ├── qty <= 0? → InvalidRequest, nothing touched
///      │
///      └── OK → Ledger reserves stock
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    validate_positive("quantity", qty)
}

/// Validates a price in cents.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
///
/// ## Example
/// ```rust
/// use tally_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());  // $10.99
/// assert!(validate_price_cents(0).is_ok());     // Free item
/// assert!(validate_price_cents(-100).is_err()); // Invalid
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    validate_non_negative("price_cents", cents)
}

/// Validates a stock level (>= 0).
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    validate_non_negative("stock", stock)
}

/// Validates a tendered amount (>= 0). It is deliberately not compared
/// against the sale total.
pub fn validate_paid_cents(cents: i64) -> ValidationResult<()> {
    validate_non_negative("paid_cents", cents)
}

/// Validates a low-stock threshold (>= 0).
pub fn validate_low_stock_threshold(threshold: i64) -> ValidationResult<()> {
    validate_non_negative("threshold", threshold)
}

/// Validates a report row limit (> 0).
pub fn validate_report_limit(limit: i64) -> ValidationResult<()> {
    validate_positive("limit", limit)
}

fn validate_positive(field: &str, value: i64) -> ValidationResult<()> {
    if value <= 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: i64) -> ValidationResult<()> {
    if value < 0 {
        return Err(ValidationError::MustNotBeNegative {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Request Validators
// =============================================================================

/// Validates every editable product field.
pub fn validate_new_product(product: &NewProduct) -> ValidationResult<()> {
    validate_product_name(&product.name)?;
    validate_sku(&product.sku)?;
    validate_price_cents(product.price_cents)?;
    validate_stock(product.stock)?;
    Ok(())
}

/// Validates the shape of a sale request before any storage access.
///
/// ## Rules
/// - At least one line
/// - Every line: non-blank product id, quantity > 0, override (if any) >= 0
/// - Paid amount >= 0
/// - Payment method non-blank
///
/// Field names in errors carry the line index, e.g. `items[1].quantity`.
pub fn validate_sale_request(request: &CreateSale) -> ValidationResult<()> {
    if request.items.is_empty() {
        return Err(ValidationError::required("items"));
    }

    for (index, line) in request.items.iter().enumerate() {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required(format!("items[{index}].product_id")));
        }
        validate_positive(&format!("items[{index}].quantity"), line.quantity)?;
        if let Some(cents) = line.unit_price_override_cents {
            validate_non_negative(&format!("items[{index}].unit_price_override_cents"), cents)?;
        }
    }

    validate_paid_cents(request.paid_cents)?;
    validate_payment_method(&request.payment_method)?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
