//! # Sale Repository
//!
//! Sale completion, sales history and the credit ledger.
//!
//! ## Completing a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    complete_sale (one transaction)                      │
//! │                                                                         │
//! │  BEGIN                                                                  │
//! │   ├── receipt_counters[today] += 1          → V-YYYYMMDD-NNNN           │
//! │   ├── INSERT sales (total decided up front)                             │
//! │   └── for each cart line, in order:                                     │
//! │        UPDATE products SET current_stock = current_stock - q            │
//! │        WHERE id = ? AND is_active = 1 AND current_stock >= q            │
//! │        RETURNING current_stock                                          │
//! │          │                                                              │
//! │          ├── no row ──► NotFound / InsufficientStock                    │
//! │          │              return Err → tx dropped → ROLLBACK everything   │
//! │          │                                                              │
//! │          └── row ─────► INSERT sale_items (name + price snapshot)       │
//! │                         INSERT stock_movements (sale, -q)               │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The guarded `UPDATE` is the only stock check. Two registers selling the
//! last unit at the same time cannot both succeed, and the movement records
//! the value that same statement wrote.

use chrono::Utc;
use pharma_core::history::{CreditLedger, DateRange};
use pharma_core::sale::{format_receipt_number, SaleDraft};
use pharma_core::{CoreError, MovementType, Sale, SaleItem, SaleType, SaleWithItems, StockMovement};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::generate_id;
use super::stock::insert_movement;
use crate::error::DbResult;

/// Sale ids per `IN (...)` lookup when loading items.
const ITEM_LOOKUP_CHUNK: usize = 500;

const SALE_COLUMNS: &str = "id, receipt_number, sale_type, total_cents, customer_name, sold_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Commits a validated sale atomically.
    ///
    /// ## Returns
    /// * `Ok(Sale)` - the persisted sale with its receipt number
    /// * `Err(DbError::Domain(InsufficientStock))` - a line asked for more
    ///   than is on hand; nothing was written
    /// * `Err(DbError::Domain(ProductNotFound))` - unknown or inactive
    ///   product; nothing was written
    pub async fn complete_sale(&self, draft: SaleDraft, actor: &str) -> DbResult<Sale> {
        let now = Utc::now();
        let total = draft.total();

        debug!(
            lines = draft.lines.len(),
            sale_type = draft.sale_type.code(),
            total_cents = total.cents(),
            "Completing sale"
        );

        let mut tx = self.pool.begin().await?;

        let today = now.date_naive();
        let sequence: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO receipt_counters (day, last_seq) VALUES (?1, 1)
            ON CONFLICT (day) DO UPDATE SET last_seq = last_seq + 1
            RETURNING last_seq
            "#,
        )
        .bind(today)
        .fetch_one(&mut *tx)
        .await?;

        let sale = Sale {
            id: generate_id(),
            receipt_number: format_receipt_number(today, sequence),
            sale_type: draft.sale_type,
            total_cents: total.cents(),
            customer_name: draft.customer_name.clone(),
            sold_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO sales (id, receipt_number, sale_type, total_cents, customer_name, sold_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.receipt_number)
        .bind(sale.sale_type)
        .bind(sale.total_cents)
        .bind(&sale.customer_name)
        .bind(sale.sold_at)
        .execute(&mut *tx)
        .await?;

        for (line_no, line) in draft.lines.iter().enumerate() {
            let decremented: Option<(i64, String)> = sqlx::query_as(
                r#"
                UPDATE products
                SET current_stock = current_stock - ?1,
                    version = version + 1,
                    updated_at = ?2
                WHERE id = ?3 AND is_active = 1 AND current_stock >= ?1
                RETURNING current_stock, name
                "#,
            )
            .bind(line.quantity)
            .bind(now)
            .bind(&line.product_id)
            .fetch_optional(&mut *tx)
            .await?;

            let Some((new_stock, name)) = decremented else {
                let product: Option<(String, i64, bool)> = sqlx::query_as(
                    "SELECT name, current_stock, is_active FROM products WHERE id = ?1",
                )
                .bind(&line.product_id)
                .fetch_optional(&mut *tx)
                .await?;

                let err = match product {
                    Some((name, available, true)) => CoreError::InsufficientStock {
                        product_id: line.product_id.clone(),
                        product_name: name,
                        available,
                        requested: line.quantity,
                    },
                    _ => CoreError::ProductNotFound(line.product_id.clone()),
                };
                warn!(receipt_number = %sale.receipt_number, line_no, error = %err, "Sale rejected");
                return Err(err.into());
            };

            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, name_snapshot, quantity, unit_price_cents, line_no
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(generate_id())
            .bind(&sale.id)
            .bind(&line.product_id)
            .bind(&name)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line_no as i64)
            .execute(&mut *tx)
            .await?;

            let movement = StockMovement {
                id: generate_id(),
                product_id: line.product_id.clone(),
                movement_type: MovementType::Sale,
                quantity: -line.quantity,
                previous_stock: new_stock + line.quantity,
                new_stock,
                reference: Some(sale.receipt_number.clone()),
                reason: None,
                created_by: actor.to_string(),
                created_at: now,
            };
            insert_movement(&mut *tx, &movement).await?;
        }

        tx.commit().await?;

        info!(
            sale_id = %sale.id,
            receipt_number = %sale.receipt_number,
            total_cents = sale.total_cents,
            "Sale completed"
        );
        Ok(sale)
    }

    /// A sale and its lines.
    pub async fn get_with_items(&self, id: &str) -> DbResult<Option<SaleWithItems>> {
        let sale = sqlx::query_as::<_, Sale>(&format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match sale {
            Some(sale) => Ok(self.attach_items(vec![sale]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Sales within `range`, newest first, with their lines.
    pub async fn history(&self, range: DateRange) -> DbResult<Vec<SaleWithItems>> {
        let (start, end) = range.utc_bounds();
        debug!(?start, ?end, "Loading sales history");

        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE (?1 IS NULL OR sold_at >= ?1)
              AND (?2 IS NULL OR sold_at < ?2)
            ORDER BY sold_at DESC, receipt_number DESC
            "#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        self.attach_items(sales).await
    }

    /// Outstanding credit grouped by customer.
    pub async fn credit_ledger(&self) -> DbResult<CreditLedger> {
        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"
            SELECT {SALE_COLUMNS}
            FROM sales
            WHERE sale_type = 'credit'
              AND customer_name IS NOT NULL
              AND TRIM(customer_name) <> ''
            ORDER BY sold_at DESC, receipt_number DESC
            "#
        ))
        .fetch_all(&self.pool)
        .await?;

        let sales = self.attach_items(sales).await?;
        Ok(CreditLedger::build(sales))
    }

    /// Settles a credit sale. The customer name is kept on the sale.
    ///
    /// ## Returns
    /// * `Err(DbError::Domain(SaleNotFound))` - no such sale, or it is not
    ///   an outstanding credit sale
    pub async fn mark_credit_paid(&self, sale_id: &str) -> DbResult<Sale> {
        let sale = sqlx::query_as::<_, Sale>(&format!(
            r#"
            UPDATE sales SET sale_type = ?1
            WHERE id = ?2 AND sale_type = ?3
            RETURNING {SALE_COLUMNS}
            "#
        ))
        .bind(SaleType::Paid)
        .bind(sale_id)
        .bind(SaleType::Credit)
        .fetch_optional(&self.pool)
        .await?;

        let sale = sale.ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;
        info!(sale_id = %sale.id, receipt_number = %sale.receipt_number, "Credit sale settled");
        Ok(sale)
    }

    /// Loads the lines of `sales`, keeping the order of `sales`.
    async fn attach_items(&self, sales: Vec<Sale>) -> DbResult<Vec<SaleWithItems>> {
        let mut items_by_sale: HashMap<String, Vec<SaleItem>> = HashMap::new();

        for chunk in sales.chunks(ITEM_LOOKUP_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "SELECT id, sale_id, product_id, name_snapshot, quantity, unit_price_cents, line_no \
                 FROM sale_items WHERE sale_id IN (",
            );
            let mut ids = builder.separated(", ");
            for sale in chunk {
                ids.push_bind(&sale.id);
            }
            ids.push_unseparated(") ORDER BY sale_id, line_no");

            let items: Vec<SaleItem> = builder.build_query_as().fetch_all(&self.pool).await?;
            for item in items {
                items_by_sale.entry(item.sale_id.clone()).or_default().push(item);
            }
        }

        Ok(sales
            .into_iter()
            .map(|sale| {
                let items = items_by_sale.remove(&sale.id).unwrap_or_default();
                SaleWithItems { sale, items }
            })
            .collect())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, product, ACTOR};
    use crate::{Database, DbError};
    use pharma_core::history::HistoryFilter;
    use pharma_core::sale::{CartLine, SaleRequest};

    fn line(product_id: &str, quantity: i64, price: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            unit_price_cents: price,
            quantity,
        }
    }

    fn paid(cart: Vec<CartLine>) -> SaleDraft {
        SaleRequest {
            sale_type: SaleType::Paid,
            customer_name: None,
            cart,
        }
        .validate()
        .unwrap()
    }

    fn credit(customer: &str, cart: Vec<CartLine>) -> SaleDraft {
        SaleRequest {
            sale_type: SaleType::Credit,
            customer_name: Some(customer.to_string()),
            cart,
        }
        .validate()
        .unwrap()
    }

    async fn sales_count(db: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_sale_decrements_stock_and_logs_movement() {
        let db = db().await;
        let p = product(&db, "Doliprane 500mg", 15).await;

        let sale = db.sales().complete_sale(paid(vec![line(&p.id, 15, 250)]), ACTOR).await.unwrap();
        assert_eq!(sale.total_cents, 3750);
        assert!(sale.receipt_number.ends_with("-0001"));

        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 0);

        let log = db.stock().movements(&p.id, 10).await.unwrap();
        let sales: Vec<_> = log.iter().filter(|m| m.movement_type == MovementType::Sale).collect();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].quantity, -15);
        assert_eq!(sales[0].previous_stock, 15);
        assert_eq!(sales[0].new_stock, 0);
        assert_eq!(sales[0].reference.as_deref(), Some(sale.receipt_number.as_str()));
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back_everything() {
        let db = db().await;
        let plenty = product(&db, "Spasfon", 50).await;
        let scarce = product(&db, "Augmentin", 3).await;

        let cart = vec![line(&plenty.id, 2, 400), line(&scarce.id, 5, 900)];
        let err = db.sales().complete_sale(paid(cart), ACTOR).await.unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientStock { product_name, available, requested, .. }) => {
                assert_eq!(product_name, "Augmentin");
                assert_eq!(available, 3);
                assert_eq!(requested, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // the first line's decrement was rolled back too
        assert_eq!(db.products().get_by_id(&plenty.id).await.unwrap().unwrap().current_stock, 50);
        assert_eq!(db.products().get_by_id(&scarce.id).await.unwrap().unwrap().current_stock, 3);
        assert_eq!(sales_count(&db).await, 0);
        assert_eq!(db.stock().movements(&plenty.id, 10).await.unwrap().len(), 1);

        // and the receipt counter did not advance
        let next = db
            .sales()
            .complete_sale(paid(vec![line(&plenty.id, 1, 400)]), ACTOR)
            .await
            .unwrap();
        assert!(next.receipt_number.ends_with("-0001"));
    }

    #[tokio::test]
    async fn test_inactive_product_is_not_found() {
        let db = db().await;
        let p = product(&db, "Retiré", 10).await;
        db.products().soft_delete(&p.id).await.unwrap();

        let err = db
            .sales()
            .complete_sale(paid(vec![line(&p.id, 1, 100)]), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));

        let unknown = generate_id();
        let err = db
            .sales()
            .complete_sale(paid(vec![line(&unknown, 1, 100)]), ACTOR)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_receipt_numbers_are_sequential() {
        let db = db().await;
        let p = product(&db, "Efferalgan", 10).await;

        let mut numbers = Vec::new();
        for _ in 0..3 {
            let sale = db.sales().complete_sale(paid(vec![line(&p.id, 1, 100)]), ACTOR).await.unwrap();
            numbers.push(sale.receipt_number);
        }
        let today = Utc::now().date_naive();
        assert_eq!(numbers[0], format_receipt_number(today, 1));
        assert_eq!(numbers[2], format_receipt_number(today, 3));
    }

    #[tokio::test]
    async fn test_concurrent_sales_never_oversell() {
        let db = db().await;
        let p = product(&db, "Dernier flacon", 5).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let db = db.clone();
            let id = p.id.clone();
            handles.push(tokio::spawn(async move {
                db.sales().complete_sale(paid(vec![line(&id, 2, 100)]), ACTOR).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => {}
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(ok, 2);
        let stored = db.products().get_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.current_stock, 1);
    }

    #[tokio::test]
    async fn test_history_has_items_and_totals() {
        let db = db().await;
        let a = product(&db, "Gaviscon", 10).await;
        let b = product(&db, "Smecta", 10).await;

        let first = db
            .sales()
            .complete_sale(paid(vec![line(&a.id, 1, 500), line(&b.id, 2, 300)]), ACTOR)
            .await
            .unwrap();
        let second = db.sales().complete_sale(paid(vec![line(&b.id, 1, 300)]), ACTOR).await.unwrap();

        let today = Utc::now().date_naive();
        let sales = db.sales().history(HistoryFilter::Today.date_range(today)).await.unwrap();
        assert_eq!(sales.len(), 2);
        assert_eq!(sales[0].sale.id, second.id);
        assert_eq!(sales[1].sale.id, first.id);
        assert_eq!(sales[1].items.len(), 2);
        assert_eq!(sales[1].items[0].name_snapshot, "Gaviscon");
        assert_eq!(sales[1].items[1].line_no, 1);
        assert_eq!(sales[1].items[1].total_price().cents(), 600);

        let all = db.sales().history(DateRange::unbounded()).await.unwrap();
        assert_eq!(all.len(), 2);

        let tomorrow = HistoryFilter::Today.date_range(today + chrono::Duration::days(1));
        assert!(db.sales().history(tomorrow).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_snapshot_survives_rename() {
        let db = db().await;
        let p = product(&db, "Nom d'origine", 10).await;
        let sale = db.sales().complete_sale(paid(vec![line(&p.id, 1, 100)]), ACTOR).await.unwrap();

        let mut renamed = crate::repository::test_support::input("Nouveau nom", 0);
        renamed.cost_price_cents = p.cost_price_cents;
        db.products().update(&p.id, renamed, None).await.unwrap();

        let stored = db.sales().get_with_items(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.items[0].name_snapshot, "Nom d'origine");
    }

    #[tokio::test]
    async fn test_credit_ledger_and_settlement() {
        let db = db().await;
        let p = product(&db, "Amlor 5mg", 20).await;

        let s1 = db.sales().complete_sale(credit("Awa", vec![line(&p.id, 1, 1000)]), ACTOR).await.unwrap();
        db.sales().complete_sale(credit("Moussa", vec![line(&p.id, 3, 1000)]), ACTOR).await.unwrap();
        db.sales().complete_sale(credit("Awa", vec![line(&p.id, 1, 500)]), ACTOR).await.unwrap();
        db.sales().complete_sale(paid(vec![line(&p.id, 1, 700)]), ACTOR).await.unwrap();

        let ledger = db.sales().credit_ledger().await.unwrap();
        assert_eq!(ledger.total_customers, 2);
        assert_eq!(ledger.total_outstanding_cents, 4500);
        assert_eq!(ledger.customers[0].name, "Moussa");
        assert_eq!(ledger.customers[1].sales_count, 2);
        assert_eq!(ledger.customers[1].sales[0].items.len(), 1);

        let settled = db.sales().mark_credit_paid(&s1.id).await.unwrap();
        assert_eq!(settled.sale_type, SaleType::Paid);
        assert_eq!(settled.customer_name.as_deref(), Some("Awa"));

        let ledger = db.sales().credit_ledger().await.unwrap();
        assert_eq!(ledger.total_outstanding_cents, 3500);

        let again = db.sales().mark_credit_paid(&s1.id).await.unwrap_err();
        assert!(matches!(again, DbError::Domain(CoreError::SaleNotFound(_))));
    }
}
