//! # pharma-db: Database Layer for Pharma POS
//!
//! SQLite storage for the pharmacy, accessed asynchronously through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Pharma POS Data Flow                             │
//! │                                                                         │
//! │  HTTP handler (POST /sales/api/sales/complete)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     pharma-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │    │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │    │   │
//! │  │   │               │    │ ProductRepo   │    │              │    │   │
//! │  │   │ SqlitePool    │◄───│ StockRepo     │    │ 001_initial  │    │   │
//! │  │   │ WAL, FKs on   │    │ SaleRepo      │    │   _schema    │    │   │
//! │  │   │               │    │ BatchRepo     │    │              │    │   │
//! │  │   │               │    │ AnalyticsRepo │    │              │    │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  pharma.db (SQLite file)                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pharma_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./pharma.db")).await?;
//! let hits = db.products().search("doli", 10).await?;
//! let sale = db.sales().complete_sale(draft, "POS").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::analytics::AnalyticsRepository;
pub use repository::batch::{BatchRepository, ExpiryQuery};
pub use repository::product::{ProductRepository, UpsertOutcome};
pub use repository::sale::SaleRepository;
pub use repository::stock::{StockReceipt, StockRepository};
