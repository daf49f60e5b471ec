//! # Analytics Repository
//!
//! Read-only fact queries. The arithmetic lives in
//! `pharma_core::analytics`; this module only fetches rows, and every query
//! is bounded by a date window or a `LIMIT`.
//!
//! ```text
//! sale_facts ─────────┐
//! top_products ───────┴──► SalesReport::build
//! sales_profits ──────────► ProfitabilityReport::build
//! product_movement ───────► InventoryReport::build
//! ```

use chrono::{DateTime, Utc};
use pharma_core::analytics::{ProductMovement, ProductSalesProfit, SaleFact, TopProduct};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

#[derive(Debug, Clone)]
pub struct AnalyticsRepository {
    pool: SqlitePool,
}

impl AnalyticsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AnalyticsRepository { pool }
    }

    /// Sales in `[since, until)`, oldest first.
    pub async fn sale_facts(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> DbResult<Vec<SaleFact>> {
        debug!(%since, %until, "Loading sale facts");

        let facts = sqlx::query_as::<_, SaleFact>(
            r#"
            SELECT sold_at, sale_type, total_cents
            FROM sales
            WHERE sold_at >= ?1 AND sold_at < ?2
            ORDER BY sold_at
            "#,
        )
        .bind(since)
        .bind(until)
        .fetch_all(&self.pool)
        .await?;

        Ok(facts)
    }

    /// Best sellers by units in `[since, until)`.
    pub async fn top_products(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<TopProduct>> {
        let rows = sqlx::query_as::<_, TopProduct>(
            r#"
            SELECT i.product_id,
                   p.name,
                   SUM(i.quantity) AS quantity_sold,
                   SUM(i.quantity * i.unit_price_cents) AS revenue_cents
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            JOIN products p ON p.id = i.product_id
            WHERE s.sold_at >= ?1 AND s.sold_at < ?2
            GROUP BY i.product_id, p.name
            ORDER BY quantity_sold DESC, p.name ASC
            LIMIT ?3
            "#,
        )
        .bind(since)
        .bind(until)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Realised profit per product since `since`, using today's cost price.
    pub async fn sales_profits(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductSalesProfit>> {
        let rows = sqlx::query_as::<_, ProductSalesProfit>(
            r#"
            SELECT i.product_id,
                   p.name,
                   SUM(i.quantity) AS total_quantity,
                   SUM(i.quantity * i.unit_price_cents) AS total_revenue_cents,
                   SUM(i.quantity * (i.unit_price_cents - p.cost_price_cents)) AS total_profit_cents
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            JOIN products p ON p.id = i.product_id
            WHERE s.sold_at >= ?1
            GROUP BY i.product_id, p.name
            ORDER BY total_profit_cents DESC, p.name ASC
            LIMIT ?2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Units sold per product since `since`, next to the stock left.
    pub async fn product_movement(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> DbResult<Vec<ProductMovement>> {
        let rows = sqlx::query_as::<_, ProductMovement>(
            r#"
            SELECT i.product_id,
                   p.name,
                   p.current_stock,
                   SUM(i.quantity) AS units_sold
            FROM sale_items i
            JOIN sales s ON s.id = i.sale_id
            JOIN products p ON p.id = i.product_id
            WHERE s.sold_at >= ?1
            GROUP BY i.product_id, p.name, p.current_stock
            ORDER BY units_sold DESC, p.name ASC
            LIMIT ?2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::repository::test_support::{db, product, ACTOR};
    use chrono::{Duration, Utc};
    use pharma_core::analytics::{AnalyticsWindow, SalesReport};
    use pharma_core::sale::{CartLine, SaleRequest};
    use pharma_core::SaleType;

    fn sale(sale_type: SaleType, lines: &[(&str, i64, i64)]) -> pharma_core::sale::SaleDraft {
        SaleRequest {
            sale_type,
            customer_name: (sale_type == SaleType::Credit).then(|| "Fatou".to_string()),
            cart: lines
                .iter()
                .map(|(id, qty, price)| CartLine {
                    product_id: id.to_string(),
                    unit_price_cents: *price,
                    quantity: *qty,
                })
                .collect(),
        }
        .validate()
        .unwrap()
    }

    #[tokio::test]
    async fn test_fact_queries() {
        let db = db().await;
        let a = product(&db, "Paracétamol", 100).await; // cost 200
        let b = product(&db, "Ibuprofène", 100).await;

        db.sales()
            .complete_sale(sale(SaleType::Paid, &[(&a.id, 3, 300), (&b.id, 1, 500)]), ACTOR)
            .await
            .unwrap();
        db.sales()
            .complete_sale(sale(SaleType::Credit, &[(&a.id, 2, 300)]), ACTOR)
            .await
            .unwrap();

        let now = Utc::now();
        let since = now - Duration::days(1);
        let until = now + Duration::days(1);

        let facts = db.analytics().sale_facts(since, until).await.unwrap();
        assert_eq!(facts.len(), 2);

        let top = db.analytics().top_products(since, until, 10).await.unwrap();
        assert_eq!(top[0].name, "Paracétamol");
        assert_eq!(top[0].quantity_sold, 5);
        assert_eq!(top[0].revenue_cents, 1500);
        assert_eq!(db.analytics().top_products(since, until, 1).await.unwrap().len(), 1);

        let profits = db.analytics().sales_profits(since, 15).await.unwrap();
        // Ibuprofène: 500 - 200 = 300; Paracétamol: 5 × (300 - 200) = 500
        assert_eq!(profits[0].name, "Paracétamol");
        assert_eq!(profits[0].total_profit_cents, 500);
        assert_eq!(profits[1].total_profit_cents, 300);

        let movement = db.analytics().product_movement(since, 15).await.unwrap();
        assert_eq!(movement[0].units_sold, 5);
        assert_eq!(movement[0].current_stock, 95);

        // nothing in a window that ended before the sales
        assert!(db.analytics().sale_facts(since - Duration::days(5), since).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sales_report_from_facts() {
        let db = db().await;
        let a = product(&db, "Vogalène", 50).await;
        db.sales()
            .complete_sale(sale(SaleType::Paid, &[(&a.id, 2, 450)]), ACTOR)
            .await
            .unwrap();

        let window = AnalyticsWindow::trailing(Utc::now().date_naive(), 30);
        let range = window.date_range();
        let (since, until) = range.utc_bounds();
        let (since, until) = (since.unwrap(), until.unwrap());

        let facts = db.analytics().sale_facts(since, until).await.unwrap();
        let top = db.analytics().top_products(since, until, 10).await.unwrap();
        let report = SalesReport::build(window, &facts, top);

        assert_eq!(report.metrics.total_sales, 1);
        assert_eq!(report.metrics.total_revenue_cents, 900);
        assert_eq!(report.sales_by_day.len(), 1);
        assert_eq!(report.top_products[0].quantity_sold, 2);
    }
}
