//! # Analytics Reports
//!
//! Pure builders for the dashboard and the three analytics endpoints.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  pharma-db (AnalyticsRepository)          pharma-core (THIS MODULE)     │
//! │  ───────────────────────────────          ──────────────────────────    │
//! │  sale_facts(window)        ──────┐                                      │
//! │  top_products(window, 10)  ──────┼──►  SalesReport::build               │
//! │                                  │                                      │
//! │  active products           ──────┼──►  ProfitabilityReport::build       │
//! │  sales_profits(30d, 15)    ──────┤                                      │
//! │                                  │                                      │
//! │  product_movement(30d, 15) ──────┼──►  InventoryReport::build           │
//! │  expiry_alerts(limit 10)   ──────┤                                      │
//! │                                  │                                      │
//! │  expiry counts             ──────┴──►  DashboardReport::build           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The database does the bounded fetching and grouping; everything that is
//! arithmetic, sorting or bucketing lives here and is unit tested.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

use crate::history::{start_of_day, DateRange};
use crate::money::Money;
use crate::types::{ExpiryAlert, Product, SaleType, StockStatus, TherapeuticClass};

/// How many products the profitability ranking keeps.
pub const TOP_MARGIN_PRODUCTS: usize = 10;

// =============================================================================
// Fact Rows (fetched by pharma-db)
// =============================================================================

/// One sale, reduced to what the sales report needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleFact {
    pub sold_at: DateTime<Utc>,
    pub sale_type: SaleType,
    pub total_cents: i64,
}

/// Units and revenue per product over a window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct TopProduct {
    pub product_id: String,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue_cents: i64,
}

/// Realised profit per product, using the product's current cost price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductSalesProfit {
    pub product_id: String,
    pub name: String,
    pub total_quantity: i64,
    pub total_revenue_cents: i64,
    pub total_profit_cents: i64,
}

/// Units sold recently, next to what is left on the shelf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductMovement {
    pub product_id: String,
    pub name: String,
    pub current_stock: i64,
    pub units_sold: i64,
}

// =============================================================================
// Analytics Window
// =============================================================================

/// `days` back from `end_date`, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AnalyticsWindow {
    #[ts(as = "String")]
    pub start_date: NaiveDate,
    #[ts(as = "String")]
    pub end_date: NaiveDate,
    pub days: i64,
}

impl AnalyticsWindow {
    /// Window of `days` ending today.
    pub fn trailing(today: NaiveDate, days: i64) -> Self {
        AnalyticsWindow {
            start_date: today - Duration::days(days),
            end_date: today,
            days,
        }
    }

    /// As a half-open day range (end exclusive).
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date + Duration::days(1))
    }

    /// Start instant, for "since" queries.
    pub fn since(&self) -> DateTime<Utc> {
        start_of_day(self.start_date)
    }
}

fn rounded_div(numerator: i64, denominator: i64) -> i64 {
    if denominator == 0 {
        return 0;
    }
    (numerator as f64 / denominator as f64).round() as i64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

// =============================================================================
// Sales Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesMetrics {
    pub total_sales: i64,
    pub total_revenue_cents: i64,
    pub average_sale_cents: i64,
    /// Rounded to one decimal place.
    pub sales_per_day: f64,
    pub revenue_per_day_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DailySales {
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub sales: i64,
    pub revenue_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleTypeBreakdown {
    pub sale_type: SaleType,
    pub count: i64,
    pub revenue_cents: i64,
}

/// Sales volume and revenue over a trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SalesReport {
    pub period: AnalyticsWindow,
    pub metrics: SalesMetrics,
    /// Days with at least one sale, ascending.
    pub sales_by_day: Vec<DailySales>,
    /// One entry per sale type, paid first.
    pub payment_distribution: Vec<SaleTypeBreakdown>,
    pub top_products: Vec<TopProduct>,
}

impl SalesReport {
    /// Builds the report. `facts` outside the window are ignored.
    pub fn build(period: AnalyticsWindow, facts: &[SaleFact], top_products: Vec<TopProduct>) -> Self {
        let range = period.date_range();
        let in_window: Vec<&SaleFact> = facts
            .iter()
            .filter(|f| range.contains(f.sold_at.date_naive()))
            .collect();

        let total_sales = in_window.len() as i64;
        let total_revenue: Money = in_window.iter().map(|f| Money::from_cents(f.total_cents)).sum();

        let mut by_day: BTreeMap<NaiveDate, (i64, i64)> = BTreeMap::new();
        for f in &in_window {
            let slot = by_day.entry(f.sold_at.date_naive()).or_insert((0, 0));
            slot.0 += 1;
            slot.1 += f.total_cents;
        }

        let payment_distribution = [SaleType::Paid, SaleType::Credit]
            .into_iter()
            .map(|sale_type| {
                let of_type = in_window.iter().filter(|f| f.sale_type == sale_type);
                let (count, revenue_cents) = of_type.fold((0, 0), |(c, r), f| (c + 1, r + f.total_cents));
                SaleTypeBreakdown {
                    sale_type,
                    count,
                    revenue_cents,
                }
            })
            .collect();

        SalesReport {
            period,
            metrics: SalesMetrics {
                total_sales,
                total_revenue_cents: total_revenue.cents(),
                average_sale_cents: rounded_div(total_revenue.cents(), total_sales),
                sales_per_day: if period.days > 0 {
                    round1(total_sales as f64 / period.days as f64)
                } else {
                    0.0
                },
                revenue_per_day_cents: rounded_div(total_revenue.cents(), period.days),
            },
            sales_by_day: by_day
                .into_iter()
                .map(|(day, (sales, revenue_cents))| DailySales {
                    day,
                    sales,
                    revenue_cents,
                })
                .collect(),
            payment_distribution,
            top_products,
        }
    }
}

// =============================================================================
// Profitability Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitabilityMetrics {
    pub total_inventory_value_cents: i64,
    pub total_potential_revenue_cents: i64,
    pub total_potential_profit_cents: i64,
    pub overall_margin_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductProfitability {
    pub product_id: String,
    pub name: String,
    pub profit_margin_percent: f64,
    /// `(selling - cost) × current_stock`
    pub projected_profit_cents: i64,
    pub selling_price_cents: i64,
    pub cost_price_cents: i64,
    pub current_stock: i64,
}

/// Margins on current stock plus realised profit on recent sales.
///
/// The two rankings use different methods (projected on stock vs realised
/// on sales) and are reported side by side, not reconciled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProfitabilityReport {
    pub profitability_metrics: ProfitabilityMetrics,
    pub most_profitable_products: Vec<ProductProfitability>,
    pub sales_based_profits: Vec<ProductSalesProfit>,
}

impl ProfitabilityReport {
    /// `products` may include inactive ones; they are filtered out here.
    pub fn build(products: &[Product], sales_based_profits: Vec<ProductSalesProfit>) -> Self {
        let active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();

        let inventory_value: Money = active.iter().map(|p| p.total_value()).sum();
        let potential_revenue: Money = active.iter().map(|p| p.potential_revenue()).sum();
        let potential_profit = potential_revenue - inventory_value;

        let mut ranked: Vec<ProductProfitability> = active
            .iter()
            .filter(|p| p.cost_price_cents > 0)
            .map(|p| ProductProfitability {
                product_id: p.id.clone(),
                name: p.name.clone(),
                profit_margin_percent: p.profit_margin(),
                projected_profit_cents: p.projected_profit().cents(),
                selling_price_cents: p.selling_price_cents,
                cost_price_cents: p.cost_price_cents,
                current_stock: p.current_stock,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.profit_margin_percent
                .total_cmp(&a.profit_margin_percent)
                .then_with(|| a.name.cmp(&b.name))
        });
        ranked.truncate(TOP_MARGIN_PRODUCTS);

        ProfitabilityReport {
            profitability_metrics: ProfitabilityMetrics {
                total_inventory_value_cents: inventory_value.cents(),
                total_potential_revenue_cents: potential_revenue.cents(),
                total_potential_profit_cents: potential_profit.cents(),
                overall_margin_percent: potential_profit.percent_of(inventory_value),
            },
            most_profitable_products: ranked,
            sales_based_profits,
        }
    }
}

// =============================================================================
// Inventory Report
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockStatusCounts {
    pub out_of_stock: i64,
    pub low_stock: i64,
    pub in_stock: i64,
}

impl StockStatusCounts {
    fn tally<'a>(products: impl IntoIterator<Item = &'a Product>) -> Self {
        let mut counts = StockStatusCounts::default();
        for p in products {
            match p.stock_status() {
                StockStatus::OutOfStock => counts.out_of_stock += 1,
                StockStatus::LowStock => counts.low_stock += 1,
                StockStatus::InStock => counts.in_stock += 1,
            }
        }
        counts
    }
}

/// Stock health of the active catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryReport {
    pub stock_status: StockStatusCounts,
    pub inventory_value_cents: i64,
    pub total_products: i64,
    pub product_movement: Vec<ProductMovement>,
    pub expiry_alerts: Vec<ExpiryAlert>,
    pub average_stock_level: f64,
}

impl InventoryReport {
    pub fn build(
        products: &[Product],
        product_movement: Vec<ProductMovement>,
        expiry_alerts: Vec<ExpiryAlert>,
    ) -> Self {
        let active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();
        let total_products = active.len() as i64;
        let total_stock: i64 = active.iter().map(|p| p.current_stock).sum();
        let inventory_value: Money = active.iter().map(|p| p.total_value()).sum();

        InventoryReport {
            stock_status: StockStatusCounts::tally(active.iter().copied()),
            inventory_value_cents: inventory_value.cents(),
            total_products,
            product_movement,
            expiry_alerts,
            average_stock_level: if total_products > 0 {
                total_stock as f64 / total_products as f64
            } else {
                0.0
            },
        }
    }
}

// =============================================================================
// Dashboard
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardMetrics {
    pub total_products: i64,
    pub total_stock_value_cents: i64,
    pub low_stock_count: i64,
    pub out_of_stock_count: i64,
    /// Batches expiring within 30 days (not yet expired).
    pub critical_expiry_count: i64,
    pub expired_count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockAlert {
    pub product_id: String,
    pub name: String,
    pub current_stock: i64,
    pub minimum_stock_level: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardAlerts {
    pub low_stock: Vec<StockAlert>,
    pub out_of_stock: Vec<StockAlert>,
    pub critical_expiry: Vec<ExpiryAlert>,
}

/// A row of the dashboard product table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardProduct {
    pub id: String,
    pub name: String,
    pub dci: Option<String>,
    pub therapeutic_class: TherapeuticClass,
    pub therapeutic_class_label: String,
    pub current_stock: i64,
    pub minimum_stock_level: i64,
    pub stock_status: StockStatus,
    pub stock_status_label: String,
    pub selling_price_cents: i64,
    pub cost_price_cents: i64,
    pub total_value_cents: i64,
}

impl From<&Product> for DashboardProduct {
    fn from(p: &Product) -> Self {
        let status = p.stock_status();
        DashboardProduct {
            id: p.id.clone(),
            name: p.name.clone(),
            dci: p.dci.clone(),
            therapeutic_class: p.therapeutic_class,
            therapeutic_class_label: p.therapeutic_class.label().to_string(),
            current_stock: p.current_stock,
            minimum_stock_level: p.minimum_stock_level,
            stock_status: status,
            stock_status_label: status.label().to_string(),
            selling_price_cents: p.selling_price_cents,
            cost_price_cents: p.cost_price_cents,
            total_value_cents: p.total_value().cents(),
        }
    }
}

/// Inventory overview: metrics, alert lists and the product table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DashboardReport {
    pub metrics: DashboardMetrics,
    pub alerts: DashboardAlerts,
    /// Out of stock first, then low stock, then in stock.
    pub products: Vec<DashboardProduct>,
}

impl DashboardReport {
    pub fn build(
        products: &[Product],
        critical_expiry_count: i64,
        expired_count: i64,
        critical_expiry: Vec<ExpiryAlert>,
    ) -> Self {
        let active: Vec<&Product> = products.iter().filter(|p| p.is_active).collect();

        let alert = |p: &&Product| StockAlert {
            product_id: p.id.clone(),
            name: p.name.clone(),
            current_stock: p.current_stock,
            minimum_stock_level: p.minimum_stock_level,
        };
        let low_stock: Vec<StockAlert> = active
            .iter()
            .filter(|p| p.stock_status() == StockStatus::LowStock)
            .map(alert)
            .collect();
        let out_of_stock: Vec<StockAlert> = active
            .iter()
            .filter(|p| p.stock_status() == StockStatus::OutOfStock)
            .map(alert)
            .collect();

        let mut table: Vec<DashboardProduct> = active.iter().map(|p| DashboardProduct::from(*p)).collect();
        // stable: keeps the incoming (name) order inside each group
        table.sort_by_key(|row| row.stock_status.urgency());

        DashboardReport {
            metrics: DashboardMetrics {
                total_products: active.len() as i64,
                total_stock_value_cents: active.iter().map(|p| p.total_value()).sum::<Money>().cents(),
                low_stock_count: low_stock.len() as i64,
                out_of_stock_count: out_of_stock.len() as i64,
                critical_expiry_count,
                expired_count,
            },
            alerts: DashboardAlerts {
                low_stock,
                out_of_stock,
                critical_expiry,
            },
            products: table,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
