//! # Stock Repository
//!
//! Stock changes that do not come from a sale, and the movement log.
//!
//! ## One Change, One Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  receive(batch)                     adjust(delta)                       │
//! │       │                                  │                              │
//! │       ▼                                  ▼                              │
//! │  BEGIN                              read stock + version                │
//! │  UPDATE stock = stock + q           clamp: max(stock + delta, 0)        │
//! │  INSERT product_batches             BEGIN                               │
//! │  INSERT stock_movements (receipt)   UPDATE ... WHERE version = v        │
//! │  COMMIT                               │ 0 rows? someone else wrote      │
//! │                                       │ → re-read, up to 3 attempts     │
//! │                                     INSERT stock_movements (kind)       │
//! │                                     COMMIT                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use pharma_core::inventory::{apply_adjustment, ReceiveStock, StockAdjustment};
use pharma_core::{CoreError, MovementType, ProductBatch, StockMovement};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use super::generate_id;
use crate::error::{DbError, DbResult};

/// Attempts made by [`StockRepository::adjust`] before giving up.
const ADJUST_ATTEMPTS: usize = 3;

/// A received batch and the movement that booked it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockReceipt {
    pub batch: ProductBatch,
    pub movement: StockMovement,
}

/// Repository for stock receiving, adjustments and the movement log.
#[derive(Debug, Clone)]
pub struct StockRepository {
    pool: SqlitePool,
}

impl StockRepository {
    pub fn new(pool: SqlitePool) -> Self {
        StockRepository { pool }
    }

    /// Books a received batch: new batch row, stock increment, `receipt` movement.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(ProductNotFound))` - unknown or inactive product
    pub async fn receive(&self, request: ReceiveStock, actor: &str) -> DbResult<StockReceipt> {
        let request = request.validate().map_err(CoreError::from)?;
        debug!(
            product_id = %request.product_id,
            batch_number = %request.batch_number,
            quantity = request.quantity,
            "Receiving stock"
        );

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let new_stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET current_stock = current_stock + ?1,
                version = version + 1,
                updated_at = ?2
            WHERE id = ?3 AND is_active = 1
            RETURNING current_stock
            "#,
        )
        .bind(request.quantity)
        .bind(now)
        .bind(&request.product_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_stock =
            new_stock.ok_or_else(|| CoreError::ProductNotFound(request.product_id.clone()))?;

        let batch = ProductBatch {
            id: generate_id(),
            product_id: request.product_id.clone(),
            batch_number: request.batch_number,
            expiry_date: request.expiry_date,
            quantity: request.quantity,
            purchase_price_cents: request.purchase_price_cents,
            received_date: now.date_naive(),
            supplier_name: request.supplier_name,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO product_batches (
                id, product_id, batch_number, expiry_date, quantity,
                purchase_price_cents, received_date, supplier_name, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&batch.id)
        .bind(&batch.product_id)
        .bind(&batch.batch_number)
        .bind(batch.expiry_date)
        .bind(batch.quantity)
        .bind(batch.purchase_price_cents)
        .bind(batch.received_date)
        .bind(&batch.supplier_name)
        .bind(batch.created_at)
        .execute(&mut *tx)
        .await?;

        let movement = StockMovement {
            id: generate_id(),
            product_id: batch.product_id.clone(),
            movement_type: MovementType::Receipt,
            quantity: batch.quantity,
            previous_stock: new_stock - batch.quantity,
            new_stock,
            reference: Some(batch.batch_number.clone()),
            reason: None,
            created_by: actor.to_string(),
            created_at: now,
        };
        insert_movement(&mut *tx, &movement).await?;

        tx.commit().await?;

        info!(
            product_id = %batch.product_id,
            batch_number = %batch.batch_number,
            new_stock,
            "Stock received"
        );
        Ok(StockReceipt { batch, movement })
    }

    /// Applies a manual stock change, clamped at zero.
    ///
    /// The movement records the effective delta, so a request of -10 against
    /// a stock of 3 is logged as -3.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(ProductNotFound))` - unknown or inactive product
    /// * `Err(DbError::Conflict)` - the product kept changing underneath us
    pub async fn adjust(
        &self,
        product_id: &str,
        adjustment: StockAdjustment,
        actor: &str,
    ) -> DbResult<StockMovement> {
        let adjustment = adjustment.validate().map_err(CoreError::from)?;
        debug!(product_id = %product_id, delta = adjustment.delta, kind = ?adjustment.kind, "Adjusting stock");

        for attempt in 1..=ADJUST_ATTEMPTS {
            let current: Option<(i64, i64)> = sqlx::query_as(
                "SELECT current_stock, version FROM products WHERE id = ?1 AND is_active = 1",
            )
            .bind(product_id)
            .fetch_optional(&self.pool)
            .await?;
            let (current_stock, version) =
                current.ok_or_else(|| CoreError::ProductNotFound(product_id.to_string()))?;

            let (new_stock, effective) = apply_adjustment(current_stock, adjustment.delta);
            let now = Utc::now();
            let mut tx = self.pool.begin().await?;

            let updated = sqlx::query(
                r#"
                UPDATE products
                SET current_stock = ?1, version = version + 1, updated_at = ?2
                WHERE id = ?3 AND version = ?4
                "#,
            )
            .bind(new_stock)
            .bind(now)
            .bind(product_id)
            .bind(version)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                warn!(product_id = %product_id, attempt, "Stock changed during adjustment, retrying");
                continue;
            }

            let movement = StockMovement {
                id: generate_id(),
                product_id: product_id.to_string(),
                movement_type: adjustment.kind.movement_type(),
                quantity: effective,
                previous_stock: current_stock,
                new_stock,
                reference: None,
                reason: adjustment.reason.clone(),
                created_by: actor.to_string(),
                created_at: now,
            };
            insert_movement(&mut *tx, &movement).await?;
            tx.commit().await?;

            info!(
                product_id = %product_id,
                requested = adjustment.delta,
                effective,
                new_stock,
                "Stock adjusted"
            );
            return Ok(movement);
        }

        Err(DbError::conflict("Product", product_id))
    }

    /// Movement log of a product, newest first.
    pub async fn movements(&self, product_id: &str, limit: i64) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, quantity, previous_stock, new_stock,
                   reference, reason, created_by, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Batches of a product, soonest expiry first.
    pub async fn batches(&self, product_id: &str) -> DbResult<Vec<ProductBatch>> {
        let batches = sqlx::query_as::<_, ProductBatch>(
            r#"
            SELECT id, product_id, batch_number, expiry_date, quantity,
                   purchase_price_cents, received_date, supplier_name, created_at
            FROM product_batches
            WHERE product_id = ?1
            ORDER BY expiry_date ASC, created_at ASC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }
}

/// Appends a movement on an open connection (usually a transaction).
pub(crate) async fn insert_movement(
    conn: &mut SqliteConnection,
    movement: &StockMovement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO stock_movements (
            id, product_id, movement_type, quantity, previous_stock, new_stock,
            reference, reason, created_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
    )
    .bind(&movement.id)
    .bind(&movement.product_id)
    .bind(movement.movement_type)
    .bind(movement.quantity)
    .bind(movement.previous_stock)
    .bind(movement.new_stock)
    .bind(&movement.reference)
    .bind(&movement.reason)
    .bind(&movement.created_by)
    .bind(movement.created_at)
    .execute(conn)
    .await?;

    Ok(())
}

/// Builds the movement written when stock is set outside receiving and sales
/// (initial stock, catalog import).
pub(crate) fn correction(
    product_id: &str,
    previous_stock: i64,
    new_stock: i64,
    reason: &str,
    actor: &str,
    now: DateTime<Utc>,
) -> StockMovement {
    StockMovement {
        id: generate_id(),
        product_id: product_id.to_string(),
        movement_type: MovementType::Adjustment,
        quantity: new_stock - previous_stock,
        previous_stock,
        new_stock,
        reference: None,
        reason: Some(reason.to_string()),
        created_by: actor.to_string(),
        created_at: now,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{day, db, product, ACTOR};
    use crate::{Database, DbConfig};
    use pharma_core::inventory::AdjustmentKind;

    fn receive(product_id: &str, quantity: i64) -> ReceiveStock {
        ReceiveStock {
            product_id: product_id.to_string(),
            batch_number: "L-2024-01".to_string(),
            expiry_date: day(2030, 1, 31),
            quantity,
            purchase_price_cents: 180,
            supplier_name: Some("Laborex".to_string()),
        }
    }

    fn adjustment(delta: i64, kind: AdjustmentKind) -> StockAdjustment {
        StockAdjustment {
            delta,
            kind,
            reason: Some("inventaire".to_string()),
        }
    }

    #[tokio::test]
    async fn test_receive_creates_batch_and_stock() {
        let db = db().await;
        let p = product(&db, "Amoxicilline 500mg", 0).await;

        let receipt = db.stock().receive(receive(&p.id, 15), ACTOR).await.unwrap();

        assert_eq!(receipt.batch.quantity, 15);
        assert_eq!(receipt.movement.movement_type, MovementType::Receipt);
        assert_eq!(receipt.movement.previous_stock, 0);
        assert_eq!(receipt.movement.new_stock, 15);
        assert_eq!(receipt.movement.reference.as_deref(), Some("L-2024-01"));

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 15);

        let batches = db.stock().batches(&p.id).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].supplier_name.as_deref(), Some("Laborex"));
    }

    #[tokio::test]
    async fn test_receive_unknown_product_is_not_found() {
        let db = db().await;
        let err = db
            .stock()
            .receive(receive(&generate_id(), 5), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_receive_rejects_zero_quantity() {
        let db = db().await;
        let p = product(&db, "Smecta", 0).await;
        let err = db.stock().receive(receive(&p.id, 0), ACTOR).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert!(db.stock().batches(&p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_clamps_and_records_effective_delta() {
        let db = db().await;
        let p = product(&db, "Ibuprofène 400mg", 3).await;

        let movement = db
            .stock()
            .adjust(&p.id, adjustment(-10, AdjustmentKind::Damage), ACTOR)
            .await
            .unwrap();

        assert_eq!(movement.movement_type, MovementType::Damage);
        assert_eq!(movement.quantity, -3);
        assert_eq!(movement.previous_stock, 3);
        assert_eq!(movement.new_stock, 0);

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 0);
    }

    #[tokio::test]
    async fn test_adjust_sign_rules() {
        let db = db().await;
        let p = product(&db, "Doliprane", 10).await;

        let err = db
            .stock()
            .adjust(&p.id, adjustment(4, AdjustmentKind::Expiry), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let movement = db
            .stock()
            .adjust(&p.id, adjustment(2, AdjustmentKind::Return), ACTOR)
            .await
            .unwrap();
        assert_eq!(movement.new_stock, 12);
    }

    #[tokio::test]
    async fn test_adjust_rejects_oversized_delta() {
        let db = db().await;
        let p = product(&db, "Efferalgan", 10).await;

        let err = db
            .stock()
            .adjust(&p.id, adjustment(i64::MAX, AdjustmentKind::Adjustment), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 10);
        assert_eq!(db.stock().movements(&p.id, 50).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_receive_rejects_oversized_quantity() {
        let db = db().await;
        let p = product(&db, "Spasfon", 4).await;

        let err = db
            .stock()
            .receive(receive(&p.id, i64::MAX), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
        assert!(db.stock().batches(&p.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_adjust_gives_up_after_repeated_version_misses() {
        let db = db().await;
        let p = product(&db, "Dafalgan", 7).await;

        // Every stock write is skipped, so the version check never matches
        sqlx::query(
            "CREATE TRIGGER hold_stock BEFORE UPDATE OF current_stock ON products \
             BEGIN SELECT RAISE(IGNORE); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = db
            .stock()
            .adjust(&p.id, adjustment(1, AdjustmentKind::Adjustment), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Conflict { .. }));

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 7);
        assert_eq!(stored.version, p.version);
        let log = db.stock().movements(&p.id, 50).await.unwrap();
        assert!(log.iter().all(|m| m.reason.as_deref() != Some("inventaire")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adjustments_lose_no_update() {
        const WORKERS: usize = 16;

        let dir = tempfile::tempdir().unwrap();
        let config = DbConfig::new(dir.path().join("stock.db")).max_connections(8);
        let db = Database::new(config).await.unwrap();
        let p = product(&db, "Doliprane 1000mg", 0).await;

        let handles: Vec<_> = (0..WORKERS)
            .map(|_| {
                let db = db.clone();
                let id = p.id.clone();
                tokio::spawn(async move {
                    db.stock()
                        .adjust(&id, adjustment(1, AdjustmentKind::Adjustment), ACTOR)
                        .await
                })
            })
            .collect();

        let mut applied = 0usize;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(movement) => {
                    assert_eq!(movement.quantity, 1);
                    applied += 1;
                }
                Err(DbError::Conflict { .. }) => {}
                Err(e) => panic!("unexpected adjustment error: {e}"),
            }
        }
        assert!(applied > 0);

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, applied as i64);

        // One movement per applied adjustment, each starting where the last ended
        let mut log = db.stock().movements(&p.id, 100).await.unwrap();
        log.sort_by_key(|m| m.new_stock);
        assert_eq!(log.len(), applied);
        for (i, m) in log.iter().enumerate() {
            assert_eq!(m.previous_stock, i as i64);
            assert_eq!(m.new_stock, i as i64 + 1);
        }

        db.close().await;
    }

    #[tokio::test]
    async fn test_movements_newest_first() {
        let db = db().await;
        let p = product(&db, "Ventoline", 0).await;
        db.stock().receive(receive(&p.id, 10), ACTOR).await.unwrap();
        db.stock()
            .adjust(&p.id, adjustment(-4, AdjustmentKind::Adjustment), ACTOR)
            .await
            .unwrap();

        let log = db.stock().movements(&p.id, 50).await.unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].movement_type, MovementType::Adjustment);
        assert_eq!(log[0].new_stock, 6);
        assert_eq!(log[1].movement_type, MovementType::Receipt);
        for m in &log {
            assert_eq!(m.new_stock, m.previous_stock + m.quantity);
            assert_eq!(m.created_by, ACTOR);
        }
    }
}
