//! # pharma-core: Pure Business Logic for Pharma POS
//!
//! Domain model and rules of a single-site pharmacy: catalog, batches with
//! expiry dates, the stock ledger, sales and the reports built on them.
//! Everything here is a pure function over plain data.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pharma POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/server (axum JSON API)                     │   │
//! │  │   POS search ─► complete sale ─► history / credit ledger        │   │
//! │  │   inventory dashboard ─► receive / adjust ─► analytics ─► CSV   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              pharma-db (SQLite repositories)                    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ pharma-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   types      money     validation   sale        inventory       │   │
//! │  │   history    analytics catalog                                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Product, ProductBatch, StockMovement, Sale, SaleItem
//! - [`money`] - Integer minor-unit money
//! - [`error`] - Domain error types
//! - [`validation`] - Boundary validation rules
//! - [`sale`] - Cart submission → validated sale draft
//! - [`inventory`] - Receiving and adjustment requests
//! - [`history`] - History date filters and the credit ledger
//! - [`analytics`] - Dashboard, sales, profitability and inventory reports
//! - [`catalog`] - CSV import/export
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use pharma_core::{expiry_status_for, ExpiryStatus, Money};
//!
//! let price = Money::from_cents(1250);
//! assert_eq!((price * 2).to_string(), "25.00");
//!
//! assert_eq!(expiry_status_for(12), ExpiryStatus::Critical);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod catalog;
pub mod error;
pub mod history;
pub mod inventory;
pub mod money;
pub mod sale;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Constants
// =============================================================================

/// Maximum lines in a single sale.
pub const MAX_CART_LINES: usize = 100;

/// Maximum quantity on a single sale line.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest accepted price, in cents (1,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Highest accepted stock level, received quantity or adjustment size.
pub const MAX_STOCK_LEVEL: i64 = 10_000_000;

/// Minimum stock level given to new products when none is supplied.
pub const DEFAULT_MINIMUM_STOCK_LEVEL: i64 = 5;

/// Batches expiring within this many days are critical.
pub const EXPIRY_CRITICAL_DAYS: i64 = 30;

/// Batches expiring within this many days (and not critical) are a warning.
pub const EXPIRY_WARNING_DAYS: i64 = 90;

/// Cap on alert lists (expiry alerts on dashboard and analytics).
pub const ALERT_LIMIT: i64 = 10;

/// Cap on POS search results.
pub const POS_SEARCH_LIMIT: i64 = 10;

/// Default analytics window.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

/// Largest analytics window accepted.
pub const MAX_WINDOW_DAYS: i64 = 366;

/// Trailing window for sales-based profitability and product movement.
pub const MOVEMENT_WINDOW_DAYS: i64 = 30;

/// Rows kept in the sales-based rankings (profit, movement).
pub const RANKING_LIMIT: i64 = 15;

/// Rows kept in the top-selling list of the sales report.
pub const TOP_PRODUCTS_LIMIT: i64 = 10;
