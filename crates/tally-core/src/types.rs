//! # Domain Types
//!
//! Core domain types for Tally POS.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Entity Relationship Diagram                        │
//! │                                                                         │
//! │   ┌──────────┐          ┌──────────┐         ┌──────────┐              │
//! │   │ Product  │◄─────────│ SaleItem │────────►│   Sale   │              │
//! │   └──────────┘  N : 1   └──────────┘  N : 1  └──────────┘              │
//! │   RESTRICT delete        name snapshot        CASCADE delete            │
//! │                                                                         │
//! │   ┌──────────┐                                                          │
//! │   │   User   │  manager | cashier                                       │
//! │   └──────────┘                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every money field is an integer count of cents named `*_cents`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name shown to cashier and on receipt.
    pub name: String,

    /// Stock Keeping Unit - unique business identifier.
    pub sku: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Sellable units on hand. Never negative.
    pub stock: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Checks whether `qty` units can be sold from current stock.
    #[inline]
    pub fn can_sell(&self, qty: i64) -> bool {
        qty > 0 && self.stock >= qty
    }
}

/// Editable product fields, used for both create and full update.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewProduct {
    pub name: String,
    pub sku: String,
    pub price_cents: i64,
    pub stock: i64,
}

// =============================================================================
// Sale
// =============================================================================

/// A committed sale. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,

    /// Sum of all line totals, in cents.
    pub total_cents: i64,

    /// Amount tendered by the customer. Not tied to the total.
    pub paid_cents: i64,

    /// Free-form payment method ("cash", "card", ...).
    pub payment_method: String,

    /// Shared by the sale and every one of its items.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// Line items in request order.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub items: Vec<SaleItem>,
}

impl Sale {
    /// Returns the total as a Money type.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the tendered amount as a Money type.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Paid minus total. Negative for partial payment.
    #[inline]
    pub fn change_due(&self) -> Money {
        self.paid() - self.total()
    }
}

/// A line item within a sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,

    /// Product name as it was when the sale was made.
    pub product_name: String,

    pub quantity: i64,

    /// Price charged per unit (catalog price or override) in cents.
    pub unit_price_cents: i64,

    /// unit_price_cents × quantity.
    pub line_total_cents: i64,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    /// Returns the line total as a Money type.
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

/// One requested line of a new sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,

    /// Charge this unit price instead of the catalog price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub unit_price_override_cents: Option<i64>,
}

impl SaleLineRequest {
    /// A line charged at the catalog price.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
            unit_price_override_cents: None,
        }
    }

    /// Sets a per-unit price override.
    pub fn with_override(mut self, cents: i64) -> Self {
        self.unit_price_override_cents = Some(cents);
        self
    }
}

/// Request to record a new sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateSale {
    pub items: Vec<SaleLineRequest>,
    pub payment_method: String,
    pub paid_cents: i64,
}

// =============================================================================
// Users
// =============================================================================

/// Staff role. Managers administer the catalog and read reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Manager,
    Cashier,
}

impl Role {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Role::Manager => "manager",
            Role::Cashier => "cashier",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manager" => Ok(Role::Manager),
            "cashier" => Ok(Role::Cashier),
            _ => Err(ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["manager".to_string(), "cashier".to_string()],
            }),
        }
    }
}

/// A staff account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,

    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: String,

    pub role: Role,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Registration input. The password is plain text until hashed by tally-db.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

// =============================================================================
// Reports
// =============================================================================

/// Totals over a reporting window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesSummary {
    pub total_sales: i64,
    pub total_revenue_cents: i64,
    pub total_items: i64,
}

/// One day of sales, keyed by UTC calendar date (`YYYY-MM-DD`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailySales {
    pub date: String,
    pub total_sales: i64,
    pub total_revenue_cents: i64,
}

/// A product ranked by revenue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub revenue_cents: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: "p-1".to_string(),
            name: "Coffee".to_string(),
            sku: "COF-1".to_string(),
            price_cents: 500,
            stock,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_can_sell() {
        let p = product(10);
        assert!(p.can_sell(10));
        assert!(!p.can_sell(11));
        assert!(!p.can_sell(0));
        assert_eq!(p.price().cents(), 500);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("manager".parse::<Role>().unwrap(), Role::Manager);
        assert_eq!(" Cashier ".parse::<Role>().unwrap(), Role::Cashier);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Cashier.to_string(), "cashier");
    }

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: "u-1".to_string(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::Manager,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "manager");
    }

    #[test]
    fn test_sale_line_request_override_is_optional() {
        let line: SaleLineRequest =
            serde_json::from_str(r#"{"product_id":"p-1","quantity":2}"#).unwrap();
        assert_eq!(line.unit_price_override_cents, None);

        let line: SaleLineRequest = serde_json::from_str(
            r#"{"product_id":"p-1","quantity":2,"unit_price_override_cents":400}"#,
        )
        .unwrap();
        assert_eq!(line.unit_price_override_cents, Some(400));
    }

    #[test]
    fn test_change_due() {
        let sale = Sale {
            id: "s-1".to_string(),
            total_cents: 1500,
            paid_cents: 2000,
            payment_method: "cash".to_string(),
            created_at: Utc::now(),
            items: vec![],
        };
        assert_eq!(sale.change_due().cents(), 500);
        assert_eq!(sale.total().cents(), 1500);
    }
}
