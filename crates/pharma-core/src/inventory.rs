//! # Stock Receiving & Adjustment Rules
//!
//! Request types and the pure arithmetic behind stock changes that do not
//! come from a sale.
//!
//! ```text
//! receive:  stock' = stock + quantity          movement: receipt (+quantity)
//! adjust:   stock' = max(stock + delta, 0)     movement: kind (stock' - stock)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{non_blank, MovementType};
use crate::validation::{
    validate_adjustment_delta, validate_batch_number, validate_price_cents,
    validate_received_quantity, validate_uuid, ValidationResult,
};

// =============================================================================
// Receiving
// =============================================================================

/// A batch arriving from a supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiveStock {
    pub product_id: String,
    pub batch_number: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    #[serde(default)]
    pub purchase_price_cents: i64,
    #[serde(default)]
    pub supplier_name: Option<String>,
}

impl ReceiveStock {
    pub fn validate(mut self) -> ValidationResult<ReceiveStock> {
        validate_uuid("product_id", &self.product_id)?;
        self.batch_number = self.batch_number.trim().to_string();
        validate_batch_number(&self.batch_number)?;
        validate_received_quantity(self.quantity)?;
        validate_price_cents("purchase_price", self.purchase_price_cents)?;
        self.supplier_name = non_blank(self.supplier_name);
        Ok(self)
    }
}

// =============================================================================
// Adjustment
// =============================================================================

/// The reason category of a manual stock change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum AdjustmentKind {
    /// Inventory count correction, either direction.
    #[default]
    Adjustment,
    /// Customer return; only increases stock.
    Return,
    /// Broken or spoiled units; only decreases stock.
    Damage,
    /// Expired units written off; only decreases stock.
    Expiry,
}

impl AdjustmentKind {
    pub fn movement_type(&self) -> MovementType {
        match self {
            AdjustmentKind::Adjustment => MovementType::Adjustment,
            AdjustmentKind::Return => MovementType::Return,
            AdjustmentKind::Damage => MovementType::Damage,
            AdjustmentKind::Expiry => MovementType::Expiry,
        }
    }
}

/// A manual change to a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAdjustment {
    /// Signed change requested by the operator.
    #[serde(alias = "adjustment")]
    pub delta: i64,
    #[serde(default)]
    pub kind: AdjustmentKind,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StockAdjustment {
    /// Checks the delta is non-zero and its sign fits the kind.
    pub fn validate(mut self) -> ValidationResult<StockAdjustment> {
        validate_adjustment_delta(self.delta)?;

        let sign_ok = match self.kind {
            AdjustmentKind::Adjustment => true,
            AdjustmentKind::Return => self.delta > 0,
            AdjustmentKind::Damage | AdjustmentKind::Expiry => self.delta < 0,
        };
        if !sign_ok {
            return Err(ValidationError::InvalidFormat {
                field: "adjustment".to_string(),
                reason: format!(
                    "{} adjustments must be {}",
                    self.kind.movement_type().code(),
                    if self.kind == AdjustmentKind::Return { "positive" } else { "negative" }
                ),
            });
        }

        self.reason = non_blank(self.reason);
        Ok(self)
    }
}

/// Applies a delta to a stock level, clamping at zero.
///
/// Returns `(new_stock, effective_delta)`; the effective delta is what the
/// movement records, so `previous + effective == new` always holds.
///
/// ## Example
/// ```rust
/// use pharma_core::inventory::apply_adjustment;
///
/// assert_eq!(apply_adjustment(10, -3), (7, -3));
/// assert_eq!(apply_adjustment(2, -5), (0, -2));
/// ```
pub fn apply_adjustment(current_stock: i64, delta: i64) -> (i64, i64) {
    let new_stock = current_stock.saturating_add(delta).max(0);
    (new_stock, new_stock - current_stock)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_apply_adjustment_clamps() {
        assert_eq!(apply_adjustment(0, 15), (15, 15));
        assert_eq!(apply_adjustment(3, -3), (0, -3));
        assert_eq!(apply_adjustment(3, -10), (0, -3));
        assert_eq!(apply_adjustment(0, -1), (0, 0));
        assert_eq!(apply_adjustment(10, i64::MAX), (i64::MAX, i64::MAX - 10));
    }

    #[test]
    fn test_adjustment_and_receipt_bounds() {
        let huge = StockAdjustment {
            delta: i64::MAX,
            kind: AdjustmentKind::Adjustment,
            reason: None,
        };
        assert_eq!(huge.validate().unwrap_err().field(), "adjustment");

        let receipt = ReceiveStock {
            product_id: Uuid::new_v4().to_string(),
            batch_number: "L-1".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            quantity: crate::MAX_STOCK_LEVEL + 1,
            purchase_price_cents: 0,
            supplier_name: None,
        };
        assert_eq!(receipt.validate().unwrap_err().field(), "quantity");
    }

    #[test]
    fn test_adjustment_sign_rules() {
        let adj = |delta, kind| StockAdjustment {
            delta,
            kind,
            reason: None,
        };

        assert!(adj(5, AdjustmentKind::Adjustment).validate().is_ok());
        assert!(adj(-5, AdjustmentKind::Adjustment).validate().is_ok());
        assert!(adj(0, AdjustmentKind::Adjustment).validate().is_err());
        assert!(adj(2, AdjustmentKind::Return).validate().is_ok());
        assert!(adj(-2, AdjustmentKind::Return).validate().is_err());
        assert!(adj(-1, AdjustmentKind::Damage).validate().is_ok());
        assert!(adj(1, AdjustmentKind::Damage).validate().is_err());
        assert!(adj(1, AdjustmentKind::Expiry).validate().is_err());
    }

    #[test]
    fn test_adjustment_accepts_legacy_field() {
        let adj: StockAdjustment =
            serde_json::from_str(r#"{"adjustment": -2, "reason": "casse"}"#).unwrap();
        assert_eq!(adj.delta, -2);
        assert_eq!(adj.kind, AdjustmentKind::Adjustment);
    }

    #[test]
    fn test_receive_validation() {
        let ok = ReceiveStock {
            product_id: Uuid::new_v4().to_string(),
            batch_number: " L-889 ".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2026, 1, 31).unwrap(),
            quantity: 15,
            purchase_price_cents: 320,
            supplier_name: Some("".to_string()),
        }
        .validate()
        .unwrap();
        assert_eq!(ok.batch_number, "L-889");
        assert_eq!(ok.supplier_name, None);

        let zero = ReceiveStock { quantity: 0, ..ok.clone() };
        assert!(zero.validate().is_err());

        let blank = ReceiveStock {
            batch_number: "".to_string(),
            ..ok
        };
        assert!(blank.validate().is_err());
    }
}
