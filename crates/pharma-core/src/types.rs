//! # Domain Types
//!
//! Core domain types used throughout the pharmacy POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │──►│  ProductBatch   │   │  StockMovement  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  batch_number   │   │  movement_type  │       │
//! │  │  name, dci      │   │  expiry_date    │   │  quantity (±)   │       │
//! │  │  current_stock  │   │  quantity       │   │  previous/new   │       │
//! │  │  version        │   └─────────────────┘   └─────────────────┘       │
//! │  └────────┬────────┘                                                    │
//! │           │            ┌─────────────────┐   ┌─────────────────┐       │
//! │           └───────────►│    SaleItem     │◄──│      Sale       │       │
//! │                        │  name_snapshot  │   │  receipt_number │       │
//! │                        │  unit_price     │   │  sale_type      │       │
//! │                        └─────────────────┘   │  total_cents    │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Derived values (stock status, expiry status, margins) are computed from
//! stored fields and never persisted. Anything date-relative takes `today`
//! as an argument so the rules stay pure.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::{
    validate_barcode, validate_price_cents, validate_product_name, validate_stock_level,
    ValidationResult,
};
use crate::{EXPIRY_CRITICAL_DAYS, EXPIRY_WARNING_DAYS};

// =============================================================================
// Therapeutic Class
// =============================================================================

/// Fixed therapeutic classification of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum TherapeuticClass {
    Analgesic,
    Antibiotic,
    Antihypertensive,
    Antidiabetic,
    Antiinflammatory,
    Gastrointestinal,
    Respiratory,
    Dermatological,
    Vitamin,
    #[default]
    Other,
}

impl TherapeuticClass {
    /// Every class, in display order.
    pub const ALL: [TherapeuticClass; 10] = [
        TherapeuticClass::Analgesic,
        TherapeuticClass::Antibiotic,
        TherapeuticClass::Antihypertensive,
        TherapeuticClass::Antidiabetic,
        TherapeuticClass::Antiinflammatory,
        TherapeuticClass::Gastrointestinal,
        TherapeuticClass::Respiratory,
        TherapeuticClass::Dermatological,
        TherapeuticClass::Vitamin,
        TherapeuticClass::Other,
    ];

    /// Stable storage/wire code.
    pub fn code(&self) -> &'static str {
        match self {
            TherapeuticClass::Analgesic => "analgesic",
            TherapeuticClass::Antibiotic => "antibiotic",
            TherapeuticClass::Antihypertensive => "antihypertensive",
            TherapeuticClass::Antidiabetic => "antidiabetic",
            TherapeuticClass::Antiinflammatory => "antiinflammatory",
            TherapeuticClass::Gastrointestinal => "gastrointestinal",
            TherapeuticClass::Respiratory => "respiratory",
            TherapeuticClass::Dermatological => "dermatological",
            TherapeuticClass::Vitamin => "vitamin",
            TherapeuticClass::Other => "other",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            TherapeuticClass::Analgesic => "Analgesic",
            TherapeuticClass::Antibiotic => "Antibiotic",
            TherapeuticClass::Antihypertensive => "Antihypertensive",
            TherapeuticClass::Antidiabetic => "Antidiabetic",
            TherapeuticClass::Antiinflammatory => "Anti-inflammatory",
            TherapeuticClass::Gastrointestinal => "Gastrointestinal",
            TherapeuticClass::Respiratory => "Respiratory",
            TherapeuticClass::Dermatological => "Dermatological",
            TherapeuticClass::Vitamin => "Vitamins & Supplements",
            TherapeuticClass::Other => "Other",
        }
    }
}

impl fmt::Display for TherapeuticClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Accepts either the code or the label, case-insensitively.
impl FromStr for TherapeuticClass {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        TherapeuticClass::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(needle) || c.label().eq_ignore_ascii_case(needle))
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "therapeutic_class".to_string(),
                allowed: TherapeuticClass::ALL.iter().map(|c| c.code().to_string()).collect(),
            })
    }
}

// =============================================================================
// Stock Status
// =============================================================================

/// Three-way partition of a product's stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    OutOfStock,
    LowStock,
    InStock,
}

impl StockStatus {
    /// Sort key for the dashboard table: out of stock first.
    pub fn urgency(&self) -> u8 {
        match self {
            StockStatus::OutOfStock => 0,
            StockStatus::LowStock => 1,
            StockStatus::InStock => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockStatus::OutOfStock => "Out of stock",
            StockStatus::LowStock => "Low stock",
            StockStatus::InStock => "In stock",
        }
    }
}

/// Classifies a stock level against a minimum.
///
/// ```text
/// stock == 0            → OutOfStock
/// 0 < stock <= minimum  → LowStock
/// stock > minimum       → InStock
/// ```
pub fn stock_status_for(current_stock: i64, minimum_stock_level: i64) -> StockStatus {
    if current_stock <= 0 {
        StockStatus::OutOfStock
    } else if current_stock <= minimum_stock_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product in the pharmacy catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Commercial name.
    pub name: String,

    /// International non-proprietary name (active substance).
    pub dci: Option<String>,

    pub therapeutic_class: TherapeuticClass,

    /// Purchase cost in cents (for margins and stock valuation).
    pub cost_price_cents: i64,

    /// Shelf price in cents.
    pub selling_price_cents: i64,

    /// Units on hand. Only changed together with a stock movement.
    pub current_stock: i64,

    /// Threshold at or below which the product is flagged as low stock.
    pub minimum_stock_level: i64,

    /// Inactive products are hidden from the POS and analytics.
    pub is_active: bool,

    /// Unique when present.
    pub barcode: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,

    /// Bumped on every write; used for optimistic concurrency.
    pub version: i64,
}

impl Product {
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }

    #[inline]
    pub fn selling_price(&self) -> Money {
        Money::from_cents(self.selling_price_cents)
    }

    /// `(selling - cost) / cost × 100`, or 0 when there is no cost price.
    pub fn profit_margin(&self) -> f64 {
        (self.selling_price() - self.cost_price()).percent_of(self.cost_price())
    }

    pub fn stock_status(&self) -> StockStatus {
        stock_status_for(self.current_stock, self.minimum_stock_level)
    }

    /// Stock valued at cost.
    pub fn total_value(&self) -> Money {
        self.cost_price().multiply_quantity(self.current_stock)
    }

    /// Stock valued at selling price.
    pub fn potential_revenue(&self) -> Money {
        self.selling_price().multiply_quantity(self.current_stock)
    }

    /// Profit if the whole stock sold at the current prices.
    pub fn projected_profit(&self) -> Money {
        (self.selling_price() - self.cost_price()).multiply_quantity(self.current_stock)
    }
}

/// Fields a client may set when creating or editing a product.
///
/// `current_stock` is only honoured on creation; later stock changes go
/// through receiving and adjustments so that each one is logged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub dci: Option<String>,
    #[serde(default)]
    pub therapeutic_class: TherapeuticClass,
    #[serde(default)]
    pub cost_price_cents: i64,
    #[serde(default)]
    pub selling_price_cents: i64,
    #[serde(default)]
    pub current_stock: i64,
    #[serde(default = "default_minimum_stock_level")]
    pub minimum_stock_level: i64,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub barcode: Option<String>,
}

fn default_minimum_stock_level() -> i64 {
    crate::DEFAULT_MINIMUM_STOCK_LEVEL
}

fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Validates and normalizes the input.
    ///
    /// Trims text fields; blank `dci`/`barcode` become `None`.
    pub fn validate(mut self) -> ValidationResult<ProductInput> {
        self.name = self.name.trim().to_string();
        validate_product_name(&self.name)?;

        self.dci = non_blank(self.dci);
        self.barcode = non_blank(self.barcode);
        if let Some(barcode) = &self.barcode {
            validate_barcode(barcode)?;
        }

        validate_price_cents("cost_price", self.cost_price_cents)?;
        validate_price_cents("selling_price", self.selling_price_cents)?;
        validate_stock_level("current_stock", self.current_stock)?;
        validate_stock_level("minimum_stock_level", self.minimum_stock_level)?;

        Ok(self)
    }

    /// Builds a new product from validated input.
    pub fn into_product(self, id: String, now: DateTime<Utc>) -> Product {
        Product {
            id,
            name: self.name,
            dci: self.dci,
            therapeutic_class: self.therapeutic_class,
            cost_price_cents: self.cost_price_cents,
            selling_price_cents: self.selling_price_cents,
            current_stock: self.current_stock,
            minimum_stock_level: self.minimum_stock_level,
            is_active: self.is_active,
            barcode: self.barcode,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }
}

pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// =============================================================================
// Product Batch
// =============================================================================

/// Expiry classification of a batch relative to a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryStatus {
    Expired,
    Critical,
    Warning,
    Good,
}

/// ```text
/// days < 0        → Expired
/// 0 ..= 30        → Critical
/// 31 ..= 90       → Warning
/// > 90            → Good
/// ```
pub fn expiry_status_for(days_until_expiry: i64) -> ExpiryStatus {
    if days_until_expiry < 0 {
        ExpiryStatus::Expired
    } else if days_until_expiry <= EXPIRY_CRITICAL_DAYS {
        ExpiryStatus::Critical
    } else if days_until_expiry <= EXPIRY_WARNING_DAYS {
        ExpiryStatus::Warning
    } else {
        ExpiryStatus::Good
    }
}

/// A received lot of a product with a shared expiry date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductBatch {
    pub id: String,
    pub product_id: String,
    /// Free text, not unique.
    pub batch_number: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub quantity: i64,
    pub purchase_price_cents: i64,
    #[ts(as = "String")]
    pub received_date: NaiveDate,
    pub supplier_name: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ProductBatch {
    /// Signed day count; negative once expired.
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }

    pub fn expiry_status(&self, today: NaiveDate) -> ExpiryStatus {
        expiry_status_for(self.days_until_expiry(today))
    }
}

/// A batch surfaced by the expiry queries, joined with its product name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ExpiryAlert {
    pub batch_id: String,
    pub product_id: String,
    pub product_name: String,
    pub batch_number: String,
    #[ts(as = "String")]
    pub expiry_date: NaiveDate,
    pub days_until_expiry: i64,
    pub expiry_status: ExpiryStatus,
    pub quantity: i64,
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Why a product's stock changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum MovementType {
    Sale,
    Receipt,
    Adjustment,
    Return,
    Damage,
    Expiry,
}

impl MovementType {
    pub fn code(&self) -> &'static str {
        match self {
            MovementType::Sale => "sale",
            MovementType::Receipt => "receipt",
            MovementType::Adjustment => "adjustment",
            MovementType::Return => "return",
            MovementType::Damage => "damage",
            MovementType::Expiry => "expiry",
        }
    }
}

/// One entry of the append-only stock ledger.
///
/// Invariant: `new_stock == previous_stock + quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Signed delta; negative for sales, damage and expiry write-offs.
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    /// Receipt number, batch number, or other external reference.
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub created_by: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// How a sale is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum SaleType {
    /// Settled at the counter.
    Paid,
    /// Carried on the customer's account until marked paid.
    Credit,
}

impl SaleType {
    pub fn code(&self) -> &'static str {
        match self {
            SaleType::Paid => "paid",
            SaleType::Credit => "credit",
        }
    }
}

/// A completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `V-YYYYMMDD-NNNN`, sequential per day.
    pub receipt_number: String,
    pub sale_type: SaleType,
    /// Frozen at creation; never recomputed from items.
    pub total_cents: i64,
    /// Only stored for credit sales.
    pub customer_name: Option<String>,
    #[ts(as = "String")]
    pub sold_at: DateTime<Utc>,
}

/// A sale line. Name and price are snapshots taken when the sale completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    /// Position in the submitted cart (0-based).
    pub line_no: i64,
}

impl SaleItem {
    /// `unit_price × quantity`, computed on read.
    pub fn total_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }
}

/// A sale with its lines, as returned by history and ledger queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleWithItems {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(stock: i64, minimum: i64, cost: i64, selling: i64) -> Product {
        ProductInput {
            name: "Paracétamol 500mg".to_string(),
            dci: Some("Paracetamol".to_string()),
            therapeutic_class: TherapeuticClass::Analgesic,
            cost_price_cents: cost,
            selling_price_cents: selling,
            current_stock: stock,
            minimum_stock_level: minimum,
            is_active: true,
            barcode: None,
        }
        .into_product("p-1".to_string(), Utc::now())
    }

    fn batch(expiry: NaiveDate) -> ProductBatch {
        ProductBatch {
            id: "b-1".to_string(),
            product_id: "p-1".to_string(),
            batch_number: "L2301".to_string(),
            expiry_date: expiry,
            quantity: 10,
            purchase_price_cents: 100,
            received_date: expiry,
            supplier_name: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_stock_status_partition() {
        assert_eq!(product(0, 5, 0, 0).stock_status(), StockStatus::OutOfStock);
        assert_eq!(product(1, 5, 0, 0).stock_status(), StockStatus::LowStock);
        assert_eq!(product(5, 5, 0, 0).stock_status(), StockStatus::LowStock);
        assert_eq!(product(6, 5, 0, 0).stock_status(), StockStatus::InStock);
        // minimum 0: any positive stock is in stock
        assert_eq!(product(1, 0, 0, 0).stock_status(), StockStatus::InStock);
    }

    #[test]
    fn test_profit_margin() {
        assert_eq!(product(0, 5, 1000, 1500).profit_margin(), 50.0);
        assert_eq!(product(0, 5, 0, 1500).profit_margin(), 0.0);
        assert_eq!(product(0, 5, 1000, 800).profit_margin(), -20.0);
    }

    #[test]
    fn test_valuations() {
        let p = product(4, 5, 250, 400);
        assert_eq!(p.total_value().cents(), 1000);
        assert_eq!(p.potential_revenue().cents(), 1600);
        assert_eq!(p.projected_profit().cents(), 600);
    }

    #[test]
    fn test_expiry_status_boundaries() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let days = |n: i64| batch(today + chrono::Duration::days(n));

        assert_eq!(days(-1).expiry_status(today), ExpiryStatus::Expired);
        assert_eq!(days(0).expiry_status(today), ExpiryStatus::Critical);
        assert_eq!(days(30).expiry_status(today), ExpiryStatus::Critical);
        assert_eq!(days(31).expiry_status(today), ExpiryStatus::Warning);
        assert_eq!(days(90).expiry_status(today), ExpiryStatus::Warning);
        assert_eq!(days(91).expiry_status(today), ExpiryStatus::Good);
        assert_eq!(days(-5).days_until_expiry(today), -5);
    }

    #[test]
    fn test_therapeutic_class_parse() {
        assert_eq!("antibiotic".parse::<TherapeuticClass>().unwrap(), TherapeuticClass::Antibiotic);
        assert_eq!("VITAMIN".parse::<TherapeuticClass>().unwrap(), TherapeuticClass::Vitamin);
        assert_eq!(
            "Anti-inflammatory".parse::<TherapeuticClass>().unwrap(),
            TherapeuticClass::Antiinflammatory
        );
        assert!("homeopathy".parse::<TherapeuticClass>().is_err());
    }

    #[test]
    fn test_product_input_normalizes() {
        let input = ProductInput {
            name: "  Ventoline  ".to_string(),
            dci: Some("   ".to_string()),
            therapeutic_class: TherapeuticClass::Respiratory,
            cost_price_cents: 100,
            selling_price_cents: 150,
            current_stock: 0,
            minimum_stock_level: 5,
            is_active: true,
            barcode: Some(" 3400930000000 ".to_string()),
        }
        .validate()
        .unwrap();

        assert_eq!(input.name, "Ventoline");
        assert_eq!(input.dci, None);
        assert_eq!(input.barcode.as_deref(), Some("3400930000000"));
    }

    #[test]
    fn test_product_input_rejects_negative_price() {
        let mut input: ProductInput = serde_json::from_str(r#"{"name": "Smecta"}"#).unwrap();
        assert_eq!(input.minimum_stock_level, 5);
        assert!(input.is_active);

        input.selling_price_cents = -1;
        assert!(matches!(
            input.clone().validate(),
            Err(ValidationError::Negative { .. })
        ));

        input.selling_price_cents = crate::MAX_PRICE_CENTS + 1;
        assert!(matches!(
            input.validate(),
            Err(ValidationError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_sale_item_total() {
        let item = SaleItem {
            id: "i".to_string(),
            sale_id: "s".to_string(),
            product_id: "p".to_string(),
            name_snapshot: "Smecta".to_string(),
            quantity: 3,
            unit_price_cents: 450,
            line_no: 0,
        };
        assert_eq!(item.total_price().cents(), 1350);
    }
}
