//! # Error Types
//!
//! Domain-specific error types for pharma-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  pharma-core errors (this file)                                        │
//! │  ├── CoreError        - Domain rule violations                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  pharma-db errors (separate crate)                                     │
//! │  └── DbError          - Database failures, wraps CoreError             │
//! │                                                                         │
//! │  Server errors (apps/server)                                           │
//! │  └── ApiError         - Stable code + message sent to the client       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → JSON         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Product id doesn't exist, or the product is no longer active.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Sale id doesn't exist (or isn't in the state the operation needs).
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// A sale line asks for more units than are on hand.
    ///
    /// ## User Workflow
    /// ```text
    /// Cart line: Doliprane 500mg × 5
    ///      │
    ///      ▼
    /// Guarded decrement finds current_stock = 3
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole sale rolled back, client shows the product and the shortfall
    /// ```
    #[error("Insufficient stock for {product_name}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        product_name: String,
        available: i64,
        requested: i64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised at the boundary, before any database work starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not one of the allowed choices.
    #[error("{field} must be one of: {}", allowed.join(", "))]
    NotAllowed { field: String, allowed: Vec<String> },
}

impl ValidationError {
    /// Name of the offending field, for structured error details.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Negative { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. } => field,
        }
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_id: "p-1".to_string(),
            product_name: "Amoxicilline 500mg".to_string(),
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for Amoxicilline 500mg: available 3, requested 5"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "name".to_string(),
        };
        assert_eq!(err.to_string(), "name is required");
        assert_eq!(err.field(), "name");

        let err = ValidationError::NotAllowed {
            field: "sale_type".to_string(),
            allowed: vec!["paid".to_string(), "credit".to_string()],
        };
        assert_eq!(err.to_string(), "sale_type must be one of: paid, credit");
    }

    #[test]
    fn test_validation_wraps_into_core_error() {
        let core: CoreError = ValidationError::Negative {
            field: "cost_price".to_string(),
        }
        .into();
        assert_eq!(
            core.to_string(),
            "Validation error: cost_price must not be negative"
        );
    }
}
