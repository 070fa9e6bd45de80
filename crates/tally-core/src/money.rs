//! # Money
//!
//! Every amount in Tally (prices, overrides, line totals, sale totals, paid
//! amounts, report revenue) is a whole number of cents.
//!
//! ## Exactness
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A sale total must equal the sum of its line totals EXACTLY.           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    line_total = unit_price_cents × quantity   (checked, no rounding)    │
//! │    total      = Σ line_total                  (checked, no rounding)    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let latte = Money::from_cents(475);
//! let order = latte * 2 + Money::from_cents(350);
//! assert_eq!(order.to_string(), "$13.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// An amount of money in cents.
///
/// ## Where Money is Used
/// ```text
/// Product.price_cents ──┬──► SaleItem.unit_price_cents ──► line_total_cents
///                       │
/// override_cents ───────┘
///
/// Σ line_total_cents ──► Sale.total_cents        Sale.paid_cents (caller)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Wraps a cent count.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// The raw cent count, as stored in `*_cents` columns.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole dollars, truncated toward zero.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Cents past the last whole dollar, 0 to 99.
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, returning `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(400); // $4.00
    /// assert_eq!(unit_price.checked_multiply_quantity(2).unwrap().cents(), 800);
    /// assert!(Money::from_cents(i64::MAX).checked_multiply_quantity(2).is_none());
    /// ```
    ///
    /// ## User Workflow
    /// ```text
    /// Product: Coffee $4.00 (override) × 2
    ///      │
    ///      ▼
    /// checked_multiply_quantity(2) ← THIS FUNCTION
    ///      │
    ///      ▼
    /// Line Total: $8.00
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// `$12.34` / `-$0.50`, for log fields. Clients format cents themselves.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

/// Unchecked; the ledger uses [`Money::checked_multiply_quantity`].
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts() {
        let refund = Money::from_cents(-1205);
        assert_eq!(refund.dollars(), -12);
        assert_eq!(refund.cents_part(), 5);
        assert!(refund.is_negative());
        assert!(Money::default().is_zero());
    }

    #[test]
    fn test_display_for_logs() {
        for (cents, shown) in [(0, "$0.00"), (7, "$0.07"), (2599, "$25.99"), (-50, "-$0.50")] {
            assert_eq!(Money::from_cents(cents).to_string(), shown);
        }
    }

    #[test]
    fn test_operators() {
        let mut till = Money::from_cents(2000);
        till += Money::from_cents(150);
        assert_eq!(till - Money::from_cents(1150), Money::from_cents(1000));
        assert_eq!(Money::from_cents(125) * 4, Money::from_cents(500));
    }

    #[test]
    fn test_checked_multiply_quantity() {
        assert_eq!(
            Money::from_cents(500).checked_multiply_quantity(3),
            Some(Money::from_cents(1500))
        );
        assert_eq!(Money::from_cents(i64::MAX / 2 + 1).checked_multiply_quantity(2), None);
    }

    #[test]
    fn test_checked_add_overflow() {
        assert!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)).is_none());
        assert_eq!(
            Money::from_cents(1).checked_add(Money::from_cents(2)),
            Some(Money::from_cents(3))
        );
    }

    #[test]
    fn test_sum_of_lines() {
        let total: Money = [300, 450, 1250].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 2000);
    }

    /// Cents never drift: 3 lines at $3.33 sum to $9.99, not $10.00.
    #[test]
    fn test_no_rounding_drift() {
        let one_third = Money::from_cents(1000 / 3);
        let total: Money = std::iter::repeat(one_third).take(3).sum();
        assert_eq!(total.cents(), 999);
    }
}
