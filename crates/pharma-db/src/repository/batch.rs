//! # Batch Repository
//!
//! Expiry alerting over received batches.
//!
//! Only batches that still hold units and belong to an active product count:
//! an empty or delisted batch is never an alert.
//!
//! ```text
//!         expired          critical (≤30d)      warning (≤90d)     good
//!  ──────────────────┼──────────────────────┼──────────────────┼──────────►
//!                  today              today+30            today+90
//!
//!  count_expired ◄───┘
//!                    └── count_expiring(30) ─┘
//! ```

use chrono::{Duration, NaiveDate};
use pharma_core::{expiry_status_for, ExpiryAlert, ALERT_LIMIT, EXPIRY_CRITICAL_DAYS};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// Filter for [`BatchRepository::expiry_alerts`]. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryQuery {
    pub today: NaiveDate,
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
    pub limit: i64,
}

impl ExpiryQuery {
    /// Not yet expired, soonest first (inventory analytics).
    pub fn upcoming(today: NaiveDate) -> Self {
        ExpiryQuery {
            today,
            from: Some(today),
            until: None,
            limit: ALERT_LIMIT,
        }
    }

    /// Expiring within the critical horizon (dashboard).
    pub fn critical(today: NaiveDate) -> Self {
        ExpiryQuery {
            today,
            from: Some(today),
            until: Some(today + Duration::days(EXPIRY_CRITICAL_DAYS)),
            limit: ALERT_LIMIT,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    batch_id: String,
    product_id: String,
    product_name: String,
    batch_number: String,
    expiry_date: NaiveDate,
    quantity: i64,
}

impl AlertRow {
    fn into_alert(self, today: NaiveDate) -> ExpiryAlert {
        let days_until_expiry = (self.expiry_date - today).num_days();
        ExpiryAlert {
            batch_id: self.batch_id,
            product_id: self.product_id,
            product_name: self.product_name,
            batch_number: self.batch_number,
            expiry_date: self.expiry_date,
            days_until_expiry,
            expiry_status: expiry_status_for(days_until_expiry),
            quantity: self.quantity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Non-empty batches of active products within the query's bounds,
    /// soonest expiry first.
    pub async fn expiry_alerts(&self, query: ExpiryQuery) -> DbResult<Vec<ExpiryAlert>> {
        debug!(?query, "Fetching expiry alerts");

        let rows = sqlx::query_as::<_, AlertRow>(
            r#"
            SELECT b.id AS batch_id, b.product_id, p.name AS product_name,
                   b.batch_number, b.expiry_date, b.quantity
            FROM product_batches b
            JOIN products p ON p.id = b.product_id
            WHERE b.quantity > 0
              AND p.is_active = 1
              AND (?1 IS NULL OR b.expiry_date >= ?1)
              AND (?2 IS NULL OR b.expiry_date <= ?2)
            ORDER BY b.expiry_date ASC, p.name ASC
            LIMIT ?3
            "#,
        )
        .bind(query.from)
        .bind(query.until)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into_alert(query.today)).collect())
    }

    /// Batches expiring between today and `today + horizon_days`, inclusive.
    pub async fn count_expiring(&self, today: NaiveDate, horizon_days: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM product_batches b
            JOIN products p ON p.id = b.product_id
            WHERE b.quantity > 0 AND p.is_active = 1
              AND b.expiry_date >= ?1 AND b.expiry_date <= ?2
            "#,
        )
        .bind(today)
        .bind(today + Duration::days(horizon_days))
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Batches already past their expiry date.
    pub async fn count_expired(&self, today: NaiveDate) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM product_batches b
            JOIN products p ON p.id = b.product_id
            WHERE b.quantity > 0 AND p.is_active = 1
              AND b.expiry_date < ?1
            "#,
        )
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
