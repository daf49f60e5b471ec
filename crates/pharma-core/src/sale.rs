//! # Sale Requests
//!
//! Turns a submitted cart into a validated [`SaleDraft`] that the database
//! layer can commit in one transaction.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /sales/api/sales/complete                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRequest { sale_type, customer_name, cart: [CartLine] }             │
//! │       │                                                                 │
//! │       │  validate()  ← THIS MODULE (no I/O)                             │
//! │       ▼                                                                 │
//! │  SaleDraft { total decided once, lines in cart order }                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SaleRepository::complete_sale(draft)  ← guarded stock decrements       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::SaleType;
use crate::validation::{
    validate_cart_size, validate_customer_name, validate_price_cents, validate_quantity,
    validate_uuid, ValidationResult,
};

/// One line of a submitted cart.
///
/// The unit price is whatever the client shows at the counter; it is
/// recorded as-is on the sale item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    #[serde(alias = "id")]
    pub product_id: String,
    #[serde(alias = "price_cents")]
    pub unit_price_cents: i64,
    pub quantity: i64,
}

/// A sale as submitted by the POS client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleRequest {
    pub sale_type: SaleType,
    #[serde(default)]
    pub customer_name: Option<String>,
    pub cart: Vec<CartLine>,
}

/// A validated sale, ready to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleDraft {
    pub sale_type: SaleType,
    /// Present iff `sale_type` is credit.
    pub customer_name: Option<String>,
    pub lines: Vec<CartLine>,
}

impl SaleRequest {
    /// Validates the request.
    ///
    /// ## Rules
    /// - Cart has 1..=100 lines
    /// - Each line: UUID product id, quantity 1..=999, price within
    ///   0..=`MAX_PRICE_CENTS`, so the total always fits in an `i64`
    /// - Credit sales need a non-blank customer name
    /// - Paid sales drop any customer name
    pub fn validate(self) -> ValidationResult<SaleDraft> {
        validate_cart_size(self.cart.len())?;

        for line in &self.cart {
            validate_uuid("product_id", &line.product_id)?;
            validate_quantity(line.quantity)?;
            validate_price_cents("unit_price", line.unit_price_cents)?;
        }

        let customer_name = match self.sale_type {
            SaleType::Credit => {
                let name = self.customer_name.unwrap_or_default().trim().to_string();
                validate_customer_name(&name)?;
                Some(name)
            }
            SaleType::Paid => None,
        };

        Ok(SaleDraft {
            sale_type: self.sale_type,
            customer_name,
            lines: self.cart,
        })
    }
}

impl SaleDraft {
    /// `Σ unit_price × quantity` over all lines.
    pub fn total(&self) -> Money {
        self.lines
            .iter()
            .map(|l| Money::from_cents(l.unit_price_cents).multiply_quantity(l.quantity))
            .sum()
    }
}

/// Formats a receipt number: `V-YYYYMMDD-NNNN`.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use pharma_core::sale::format_receipt_number;
///
/// let day = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
/// assert_eq!(format_receipt_number(day, 7), "V-20240309-0007");
/// ```
pub fn format_receipt_number(day: NaiveDate, sequence: i64) -> String {
    format!("V-{}-{:04}", day.format("%Y%m%d"), sequence)
}

// =============================================================================
// Unit Tests
// =============================================================================
