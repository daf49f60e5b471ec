//! # HTTP Routes
//!
//! ```text
//! /health                                    GET     liveness + DB check
//!
//! /inventory/api/dashboard                   GET     metrics, alerts, table
//! /inventory/api/analytics/sales?days=N      GET     sales report
//! /inventory/api/analytics/profitability     GET     margins, realised profit
//! /inventory/api/analytics/inventory         GET     stock status, movement
//! /inventory/api/products                    GET     active products
//!                                            POST    create
//! /inventory/api/products/{id}               GET PUT DELETE
//! /inventory/api/products/{id}/batches       GET
//! /inventory/api/products/{id}/movements     GET
//! /inventory/api/products/{id}/adjust-stock  POST
//! /inventory/api/stock/receive               POST
//! /inventory/products/export                 GET     CSV
//! /inventory/products/template               GET     CSV
//! /inventory/products/import                 POST    multipart `file`
//!
//! /sales/api/products/search?q=              GET     POS search
//! /sales/api/products/barcode-search?barcode= GET
//! /sales/api/sales/complete                  POST
//! /sales/api/sales/history?filter=           GET     today|week|month|all
//! /sales/api/credit/ledger                   GET
//! /sales/api/credit/{id}/mark-paid           POST
//! ```

pub mod analytics;
pub mod catalog;
pub mod health;
pub mod inventory;
pub mod sales;

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;

// =============================================================================
// Extractors
// =============================================================================

/// `Json` whose rejection renders as a `VALIDATION_ERROR`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `Query` whose rejection renders as a `VALIDATION_ERROR`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `Path` whose rejection renders as a `VALIDATION_ERROR`.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// =============================================================================
// Success Envelope
// =============================================================================

/// `{"success": true, ...body}`.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

pub fn ok<T: Serialize>(body: T) -> Json<Success<T>> {
    Json(Success {
        success: true,
        body,
    })
}

pub type ApiResult<T> = Result<Json<Success<T>>, ApiError>;

// =============================================================================
// Router
// =============================================================================

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        // inventory: dashboard and analytics
        .route("/inventory/api/dashboard", get(analytics::dashboard))
        .route("/inventory/api/analytics/sales", get(analytics::sales))
        .route("/inventory/api/analytics/profitability", get(analytics::profitability))
        .route("/inventory/api/analytics/inventory", get(analytics::inventory))
        // inventory: products and stock
        .route(
            "/inventory/api/products",
            get(inventory::list_products).post(inventory::create_product),
        )
        .route(
            "/inventory/api/products/{id}",
            get(inventory::get_product)
                .put(inventory::update_product)
                .delete(inventory::delete_product),
        )
        .route("/inventory/api/products/{id}/batches", get(inventory::product_batches))
        .route("/inventory/api/products/{id}/movements", get(inventory::product_movements))
        .route("/inventory/api/products/{id}/adjust-stock", post(inventory::adjust_stock))
        .route("/inventory/api/stock/receive", post(inventory::receive_stock))
        // inventory: CSV catalog
        .route("/inventory/products/export", get(catalog::export))
        .route("/inventory/products/template", get(catalog::template))
        .route("/inventory/products/import", post(catalog::import))
        // point of sale
        .route("/sales/api/products/search", get(sales::search_products))
        .route("/sales/api/products/barcode-search", get(sales::barcode_search))
        .route("/sales/api/sales/complete", post(sales::complete_sale))
        .route("/sales/api/sales/history", get(sales::history))
        .route("/sales/api/credit/ledger", get(sales::credit_ledger))
        .route("/sales/api/credit/{id}/mark-paid", post(sales::mark_credit_paid))
}

pub async fn not_found() -> ApiError {
    ApiError::new(ErrorCode::NotFound, "No such endpoint")
}

pub async fn method_not_allowed() -> ApiError {
    ApiError::method_not_allowed()
}
