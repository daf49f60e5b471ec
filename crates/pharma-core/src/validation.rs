//! # Validation Module
//!
//! Input validation at the service boundary.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP extraction (axum Json / Query)                          │
//! │  └── Shape and type checks (serde)                                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Business rules: lengths, ranges, required fields                  │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── CHECK constraints (stock >= 0, prices >= 0)                       │
//! │  ├── UNIQUE constraints (barcode, receipt number)                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use uuid::Uuid;

use crate::error::ValidationError;
use crate::{MAX_CART_LINES, MAX_ITEM_QUANTITY, MAX_PRICE_CENTS, MAX_STOCK_LEVEL, MAX_WINDOW_DAYS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

fn required_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

/// Validates a product name (1-200 characters after trimming).
///
/// ## Example
/// ```rust
/// use pharma_core::validation::validate_product_name;
///
/// assert!(validate_product_name("Doliprane 1000mg").is_ok());
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    required_text("name", name, 200)
}

/// Validates a barcode: at most 50 characters, no whitespace inside.
pub fn validate_barcode(barcode: &str) -> ValidationResult<()> {
    required_text("barcode", barcode, 50)?;
    if barcode.trim().chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "barcode".to_string(),
            reason: "must not contain spaces".to_string(),
        });
    }
    Ok(())
}

/// Validates a batch number (1-100 characters).
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    required_text("batch_number", batch_number, 100)
}

/// Validates a customer name on a credit sale (1-200 characters).
pub fn validate_customer_name(name: &str) -> ValidationResult<()> {
    required_text("customer_name", name, 200)
}

/// Validates a search query (max 100 characters, may be empty).
pub fn validate_search_query(query: &str) -> ValidationResult<()> {
    if query.chars().count() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }
    Ok(())
}

/// Validates that a string is a UUID.
pub fn validate_uuid(field: &str, value: &str) -> ValidationResult<()> {
    Uuid::parse_str(value).map(|_| ()).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a UUID".to_string(),
    })
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a sale line quantity (1..=999).
///
/// ## Example
/// ```rust
/// use pharma_core::validation::validate_quantity;
///
/// assert!(validate_quantity(1).is_ok());
/// assert!(validate_quantity(0).is_err());
/// assert!(validate_quantity(1000).is_err());
/// ```
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_ITEM_QUANTITY).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }
    Ok(())
}

/// Validates a received batch quantity (1..=`MAX_STOCK_LEVEL`).
pub fn validate_received_quantity(quantity: i64) -> ValidationResult<()> {
    if !(1..=MAX_STOCK_LEVEL).contains(&quantity) {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_STOCK_LEVEL,
        });
    }
    Ok(())
}

/// Validates a price in cents (0..=`MAX_PRICE_CENTS`).
///
/// ## Example
/// ```rust
/// use pharma_core::validation::validate_price_cents;
/// use pharma_core::MAX_PRICE_CENTS;
///
/// assert!(validate_price_cents("selling_price", 0).is_ok());
/// assert!(validate_price_cents("selling_price", -1).is_err());
/// assert!(validate_price_cents("selling_price", MAX_PRICE_CENTS + 1).is_err());
/// ```
pub fn validate_price_cents(field: &str, cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    if cents > MAX_PRICE_CENTS {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }
    Ok(())
}

/// Validates a stock count or threshold (0..=`MAX_STOCK_LEVEL`).
pub fn validate_stock_level(field: &str, level: i64) -> ValidationResult<()> {
    if level < 0 {
        return Err(ValidationError::Negative {
            field: field.to_string(),
        });
    }
    if level > MAX_STOCK_LEVEL {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_STOCK_LEVEL,
        });
    }
    Ok(())
}

/// Validates the number of lines in a cart (1..=100).
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "cart".to_string(),
        });
    }
    if lines > MAX_CART_LINES {
        return Err(ValidationError::OutOfRange {
            field: "cart".to_string(),
            min: 1,
            max: MAX_CART_LINES as i64,
        });
    }
    Ok(())
}

/// Validates a stock adjustment delta (non-zero, at most `MAX_STOCK_LEVEL`
/// units either way).
pub fn validate_adjustment_delta(delta: i64) -> ValidationResult<()> {
    if delta == 0 {
        return Err(ValidationError::InvalidFormat {
            field: "adjustment".to_string(),
            reason: "must not be zero".to_string(),
        });
    }
    if !(-MAX_STOCK_LEVEL..=MAX_STOCK_LEVEL).contains(&delta) {
        return Err(ValidationError::OutOfRange {
            field: "adjustment".to_string(),
            min: -MAX_STOCK_LEVEL,
            max: MAX_STOCK_LEVEL,
        });
    }
    Ok(())
}

/// Validates an analytics window in days (1..=366).
pub fn validate_window_days(days: i64) -> ValidationResult<()> {
    if !(1..=MAX_WINDOW_DAYS).contains(&days) {
        return Err(ValidationError::OutOfRange {
            field: "days".to_string(),
            min: 1,
            max: MAX_WINDOW_DAYS,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_name() {
        assert!(validate_product_name("Spasfon").is_ok());
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"x".repeat(201)).is_err());
        assert!(validate_product_name(&"é".repeat(200)).is_ok());
    }

    #[test]
    fn test_barcode() {
        assert!(validate_barcode("3400936403114").is_ok());
        assert!(validate_barcode("340 093").is_err());
        assert!(validate_barcode(&"1".repeat(51)).is_err());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-3).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_cart_size() {
        assert!(matches!(
            validate_cart_size(0),
            Err(ValidationError::Required { .. })
        ));
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(MAX_CART_LINES + 1).is_err());
    }

    #[test]
    fn test_prices_and_levels() {
        assert!(validate_price_cents("cost_price", 0).is_ok());
        assert!(validate_price_cents("cost_price", -1).is_err());
        assert!(validate_stock_level("minimum_stock_level", 0).is_ok());
        assert!(validate_stock_level("minimum_stock_level", -2).is_err());
    }

    #[test]
    fn test_upper_bounds() {
        assert!(validate_price_cents("unit_price", MAX_PRICE_CENTS).is_ok());
        assert!(matches!(
            validate_price_cents("unit_price", i64::MAX / 2),
            Err(ValidationError::OutOfRange { max: MAX_PRICE_CENTS, .. })
        ));
        assert!(validate_stock_level("current_stock", MAX_STOCK_LEVEL + 1).is_err());
        assert!(validate_received_quantity(MAX_STOCK_LEVEL).is_ok());
        assert!(validate_received_quantity(i64::MAX).is_err());
        assert!(validate_adjustment_delta(MAX_STOCK_LEVEL).is_ok());
        assert!(validate_adjustment_delta(-MAX_STOCK_LEVEL).is_ok());
        assert!(validate_adjustment_delta(i64::MAX).is_err());
        assert!(validate_adjustment_delta(i64::MIN).is_err());
    }

    #[test]
    fn test_misc() {
        assert!(validate_adjustment_delta(0).is_err());
        assert!(validate_adjustment_delta(-4).is_ok());
        assert!(validate_window_days(30).is_ok());
        assert!(validate_window_days(0).is_err());
        assert!(validate_window_days(400).is_err());
        assert!(validate_uuid("id", "not-a-uuid").is_err());
        assert!(validate_uuid("id", &Uuid::new_v4().to_string()).is_ok());
        assert!(validate_received_quantity(0).is_err());
        assert!(validate_search_query(&"q".repeat(101)).is_err());
    }
}
