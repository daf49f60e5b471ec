//! # Money Module
//!
//! Provides the `Money` type for monetary values: prices, totals, stock
//! valuations and profits.
//!
//! ## Integer Minor Units
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every amount is stored as an i64 count of minor units (cents).         │
//! │                                                                         │
//! │    "12.50" (CSV import) ──parse_decimal──► Money(1250)                  │
//! │    Money(1250) × 3 ──────────────────────► Money(3750)                  │
//! │    Money(3750) ─────────Display──────────► "37.50" (CSV export)         │
//! │                                                                         │
//! │  No currency symbol: the pharmacy runs a single local currency.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use pharma_core::money::Money;
//!
//! let price = Money::from_cents(1250);
//! let line = price * 3;
//! assert_eq!(line.to_string(), "37.50");
//!
//! let imported = Money::parse_decimal("12.5").unwrap();
//! assert_eq!(imported, price);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in minor units (cents).
///
/// Signed so that profits and margins can go negative when an item is
/// sold under cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(1099).units(), 10);
    /// assert_eq!(Money::from_cents(-550).units(), -5);
    /// ```
    #[inline]
    pub const fn units(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a quantity, saturating at the `i64` bounds.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(299);
    /// assert_eq!(unit_price.multiply_quantity(3).cents(), 897);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }

    /// Expresses `self` as a percentage of `base`.
    ///
    /// Returns 0 when `base` is not positive, so a product without a cost
    /// price reports a 0% margin instead of dividing by zero.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// let profit = Money::from_cents(500);
    /// let cost = Money::from_cents(1000);
    /// assert_eq!(profit.percent_of(cost), 50.0);
    /// assert_eq!(profit.percent_of(Money::zero()), 0.0);
    /// ```
    pub fn percent_of(&self, base: Money) -> f64 {
        if base.0 <= 0 {
            return 0.0;
        }
        self.0 as f64 / base.0 as f64 * 100.0
    }

    /// Parses a decimal amount such as `"12"`, `"12.5"` or `"12.50"`.
    ///
    /// ## Rules
    /// - Optional leading `-`
    /// - At most two fractional digits (no silent rounding)
    /// - Surrounding whitespace is ignored
    /// - A single comma is accepted as the decimal separator
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("12.50").unwrap().cents(), 1250);
    /// assert_eq!(Money::parse_decimal("0,5").unwrap().cents(), 50);
    /// assert!(Money::parse_decimal("12.345").is_err());
    /// assert!(Money::parse_decimal("abc").is_err());
    /// ```
    pub fn parse_decimal(input: &str) -> Result<Money, ValidationError> {
        let invalid = |reason: &str| ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: format!("'{}' {}", input.trim(), reason),
        };

        let s = input.trim();
        let (negative, digits) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let digits = digits.replacen(',', ".", 1);
        let (whole, frac) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits.as_str(), ""),
        };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("is not a number"));
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("is not a number"));
        }
        if frac.len() > 2 {
            return Err(invalid("has more than two decimal places"));
        }

        let units: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("is too large"))?
        };
        let cents: i64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<i64>().map_err(|_| invalid("is not a number"))? * 10,
            _ => frac.parse().map_err(|_| invalid("is not a number"))?,
        };

        let total = units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(|| invalid("is too large"))?;

        Ok(Money(if negative { -total } else { total }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering, e.g. `12.50` or `-5.50`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.units().abs(), self.cents_part())
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
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

/// Multiplication by a quantity.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
