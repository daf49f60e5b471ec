//! # Dashboard & Analytics Routes
//!
//! Each handler runs its independent fact queries concurrently, then hands
//! the rows to a pure report builder in `pharma_core::analytics`.
//!
//! ```text
//! GET /inventory/api/dashboard
//!     list_active ─────────────┐
//!     count_expiring(30) ──────┤
//!     count_expired ───────────┼──► DashboardReport::build
//!     expiry_alerts(critical) ─┘
//! ```
//!
//! Figures are "as of read time"; nothing is cached.

use axum::extract::State;
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::debug;

use pharma_core::analytics::{
    AnalyticsWindow, DashboardReport, InventoryReport, ProfitabilityReport, SalesReport,
};
use pharma_core::history::start_of_day;
use pharma_core::validation::validate_window_days;
use pharma_core::{
    DEFAULT_WINDOW_DAYS, EXPIRY_CRITICAL_DAYS, MOVEMENT_WINDOW_DAYS, RANKING_LIMIT,
    TOP_PRODUCTS_LIMIT,
};
use pharma_db::ExpiryQuery;

use super::{ok, ApiQuery, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WindowParams {
    #[serde(default)]
    pub days: Option<i64>,
}

pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardReport> {
    let today = Utc::now().date_naive();
    let products = state.db.products();
    let batches = state.db.batches();

    let (active, critical_count, expired_count, critical) = tokio::try_join!(
        products.list_active(),
        batches.count_expiring(today, EXPIRY_CRITICAL_DAYS),
        batches.count_expired(today),
        batches.expiry_alerts(ExpiryQuery::critical(today)),
    )?;

    Ok(ok(DashboardReport::build(
        &active,
        critical_count,
        expired_count,
        critical,
    )))
}

pub async fn sales(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<WindowParams>,
) -> ApiResult<SalesReport> {
    let days = params.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    validate_window_days(days)?;

    let window = AnalyticsWindow::trailing(Utc::now().date_naive(), days);
    let since = window.since();
    let until = start_of_day(window.end_date + Duration::days(1));
    debug!(days, %since, %until, "Sales analytics");

    let analytics = state.db.analytics();
    let (facts, top) = tokio::try_join!(
        analytics.sale_facts(since, until),
        analytics.top_products(since, until, TOP_PRODUCTS_LIMIT),
    )?;

    Ok(ok(SalesReport::build(window, &facts, top)))
}

pub async fn profitability(State(state): State<AppState>) -> ApiResult<ProfitabilityReport> {
    let since = AnalyticsWindow::trailing(Utc::now().date_naive(), MOVEMENT_WINDOW_DAYS).since();

    let products = state.db.products();
    let analytics = state.db.analytics();
    let (active, profits) = tokio::try_join!(
        products.list_active(),
        analytics.sales_profits(since, RANKING_LIMIT),
    )?;

    Ok(ok(ProfitabilityReport::build(&active, profits)))
}

pub async fn inventory(State(state): State<AppState>) -> ApiResult<InventoryReport> {
    let today = Utc::now().date_naive();
    let since = AnalyticsWindow::trailing(today, MOVEMENT_WINDOW_DAYS).since();

    let products = state.db.products();
    let analytics = state.db.analytics();
    let batches = state.db.batches();
    let (active, movement, upcoming) = tokio::try_join!(
        products.list_active(),
        analytics.product_movement(since, RANKING_LIMIT),
        batches.expiry_alerts(ExpiryQuery::upcoming(today)),
    )?;

    Ok(ok(InventoryReport::build(&active, movement, upcoming)))
}
