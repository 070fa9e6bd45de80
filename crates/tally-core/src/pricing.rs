//! # Sale Pricing
//!
//! Pure pricing of sale lines and accumulation of the order total.
//!
//! The Sale Ledger in tally-db feeds each line into a [`SaleDraft`] as soon as
//! the line's stock has been reserved, then turns the draft into the [`Sale`]
//! it persists. Nothing here touches storage.
//!
//! ## Pricing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleLineRequest { product_id, quantity, unit_price_override_cents? }   │
//! │       │                                                                 │
//! │       │  + catalog name / price (read inside the transaction)          │
//! │       ▼                                                                 │
//! │  SaleDraft::add_line()                                                  │
//! │       ├── unit price = override ?? catalog price                        │
//! │       ├── line total = unit price × quantity     (checked)              │
//! │       └── total     += line total                (checked)              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleDraft::into_sale(id, payment, created_at) → Sale + SaleItems       │
//! │  (one timestamp shared by every row)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{Sale, SaleItem, SaleLineRequest};
use crate::validation::ValidationResult;

/// A sale line with its price resolved.
///
/// `product_name` is frozen here; later catalog renames never reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

/// Lines priced so far plus their running total.
///
/// ## Invariant
/// `total == Σ line.line_total` at every point, exactly.
#[derive(Debug, Clone, Default)]
pub struct SaleDraft {
    lines: Vec<PricedLine>,
    total: Money,
}

impl SaleDraft {
    pub fn new() -> Self {
        SaleDraft::default()
    }

    /// Prices one requested line and appends it.
    ///
    /// ## Arguments
    /// * `product_name` - Catalog name at this moment (snapshot)
    /// * `catalog_price` - Catalog unit price, used when no override is given
    /// * `request` - The caller's line
    ///
    /// ## Returns
    /// * `Ok(&PricedLine)` - The line as it will be persisted
    /// * `Err(ValidationError::Overflow)` - Line or order total out of range
    pub fn add_line(
        &mut self,
        product_name: impl Into<String>,
        catalog_price: Money,
        request: &SaleLineRequest,
    ) -> ValidationResult<&PricedLine> {
        let unit_price = request
            .unit_price_override_cents
            .map(Money::from_cents)
            .unwrap_or(catalog_price);

        let line_total = unit_price
            .checked_multiply_quantity(request.quantity)
            .ok_or_else(|| ValidationError::Overflow {
                field: "line total".to_string(),
            })?;

        self.total = self
            .total
            .checked_add(line_total)
            .ok_or_else(|| ValidationError::Overflow {
                field: "sale total".to_string(),
            })?;

        self.lines.push(PricedLine {
            product_id: request.product_id.clone(),
            product_name: product_name.into(),
            quantity: request.quantity,
            unit_price,
            line_total,
        });

        Ok(&self.lines[self.lines.len() - 1])
    }

    pub fn lines(&self) -> &[PricedLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Builds the committed shape of the sale.
    ///
    /// `next_item_id` is called once per line, in line order.
    pub fn into_sale(
        self,
        sale_id: String,
        payment_method: String,
        paid: Money,
        created_at: DateTime<Utc>,
        mut next_item_id: impl FnMut() -> String,
    ) -> Sale {
        let items = self
            .lines
            .into_iter()
            .map(|line| SaleItem {
                id: next_item_id(),
                sale_id: sale_id.clone(),
                product_id: line.product_id,
                product_name: line.product_name,
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                line_total_cents: line.line_total.cents(),
                created_at,
            })
            .collect();

        Sale {
            id: sale_id,
            total_cents: self.total.cents(),
            paid_cents: paid.cents(),
            payment_method,
            created_at,
            items,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_price_used_without_override() {
        let mut draft = SaleDraft::new();
        let line = draft
            .add_line("Coffee", Money::from_cents(500), &SaleLineRequest::new("a", 3))
            .unwrap();
        assert_eq!(line.unit_price.cents(), 500);
        assert_eq!(line.line_total.cents(), 1500);
        assert_eq!(draft.total().cents(), 1500);
    }

    #[test]
    fn test_override_replaces_catalog_price() {
        let mut draft = SaleDraft::new();
        let request = SaleLineRequest::new("a", 2).with_override(400);
        let line = draft.add_line("Coffee", Money::from_cents(500), &request).unwrap();
        assert_eq!(line.unit_price.cents(), 400);
        assert_eq!(line.line_total.cents(), 800);
    }

    #[test]
    fn test_zero_override_is_a_free_line() {
        let mut draft = SaleDraft::new();
        let request = SaleLineRequest::new("a", 5).with_override(0);
        draft.add_line("Coffee", Money::from_cents(500), &request).unwrap();
        assert!(draft.total().is_zero());
    }

    #[test]
    fn test_total_equals_sum_of_lines() {
        let mut draft = SaleDraft::new();
        draft.add_line("A", Money::from_cents(333), &SaleLineRequest::new("a", 3)).unwrap();
        draft.add_line("B", Money::from_cents(1), &SaleLineRequest::new("b", 7)).unwrap();
        draft
            .add_line("A", Money::from_cents(333), &SaleLineRequest::new("a", 1).with_override(250))
            .unwrap();

        let sum: Money = draft.lines().iter().map(|l| l.line_total).sum();
        assert_eq!(draft.total(), sum);
        assert_eq!(draft.total().cents(), 999 + 7 + 250);
    }

    #[test]
    fn test_line_overflow_is_rejected() {
        let mut draft = SaleDraft::new();
        let err = draft
            .add_line("A", Money::from_cents(i64::MAX), &SaleLineRequest::new("a", 2))
            .unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
        assert!(draft.is_empty());
    }

    #[test]
    fn test_total_overflow_is_rejected() {
        let mut draft = SaleDraft::new();
        draft
            .add_line("A", Money::from_cents(i64::MAX), &SaleLineRequest::new("a", 1))
            .unwrap();
        let err = draft
            .add_line("B", Money::from_cents(1), &SaleLineRequest::new("b", 1))
            .unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
        assert_eq!(draft.lines().len(), 1);
    }

    #[test]
    fn test_into_sale_shares_timestamp_and_keeps_order() {
        let mut draft = SaleDraft::new();
        draft.add_line("Tea", Money::from_cents(200), &SaleLineRequest::new("t", 1)).unwrap();
        draft.add_line("Cake", Money::from_cents(350), &SaleLineRequest::new("c", 2)).unwrap();

        let now = Utc::now();
        let mut n = 0;
        let sale = draft.into_sale(
            "sale-1".to_string(),
            "card".to_string(),
            Money::from_cents(1000),
            now,
            || {
                n += 1;
                format!("item-{n}")
            },
        );

        assert_eq!(sale.total_cents, 900);
        assert_eq!(sale.paid_cents, 1000);
        assert_eq!(sale.items.len(), 2);
        assert_eq!(sale.items[0].product_name, "Tea");
        assert_eq!(sale.items[0].id, "item-1");
        assert_eq!(sale.items[1].product_id, "c");
        assert!(sale.items.iter().all(|i| i.created_at == now && i.sale_id == "sale-1"));
    }
}
