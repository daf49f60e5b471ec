//! # Database Migrations
//!
//! SQL migrations embedded at compile time from `migrations/sqlite/`.
//!
//! ```text
//! Database::new ──► MIGRATOR.run(pool)
//!                       │
//!                       ├── 001_initial_schema.sql  ✓ applied
//!                       └── 00N_next.sql            ⬜ runs now, recorded
//!                                                      in _sqlx_migrations
//! ```
//!
//! ## Adding New Migrations
//!
//! 1. Add `NNN_description.sql` under `migrations/sqlite/` with the next number
//! 2. Never edit a migration that has shipped; add a new one

use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Runs all pending migrations, in filename order, each in its own transaction.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    info!("Checking for pending migrations");

    MIGRATOR.run(pool).await?;

    info!("All migrations applied successfully");
    Ok(())
}

/// `(embedded, applied)` migration counts, for diagnostics.
pub async fn migration_status(pool: &SqlitePool) -> DbResult<(usize, usize)> {
    let total = MIGRATOR.migrations.len();

    let applied: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
        .fetch_one(pool)
        .await?;

    Ok((total, applied as usize))
}
