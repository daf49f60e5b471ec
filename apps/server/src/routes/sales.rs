//! # Point-of-Sale Routes
//!
//! Product lookup for the counter, sale completion, history and the credit
//! ledger.
//!
//! ## Sale Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Counter                                                                │
//! │                                                                         │
//! │  GET  /sales/api/products/search?q=doli     ──► ≤ 10 active products    │
//! │  GET  /sales/api/products/barcode-search    ──► exact barcode match     │
//! │       │                                                                 │
//! │       ▼  (cart built client-side)                                       │
//! │  POST /sales/api/sales/complete                                         │
//! │       │   SaleRequest::validate()        400 VALIDATION_ERROR           │
//! │       │   SaleRepository::complete_sale  409 INSUFFICIENT_STOCK         │
//! │       ▼                                  404 NOT_FOUND                  │
//! │  { success, sale_id, receipt_number, total_cents, sale }                │
//! │                                                                         │
//! │  Credit sales appear in /sales/api/credit/ledger until                  │
//! │  POST /sales/api/credit/{id}/mark-paid                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::State;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use pharma_core::history::{CreditLedger, HistoryFilter, SalesHistory};
use pharma_core::sale::SaleRequest;
use pharma_core::validation::validate_uuid;
use pharma_core::{Product, Sale, ValidationError, POS_SEARCH_LIMIT};

use super::{ok, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::error::ApiError;
use crate::state::AppState;

// =============================================================================
// DTOs
// =============================================================================

/// What the counter needs to put a product in the cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosProduct {
    pub id: String,
    pub name: String,
    pub dci: Option<String>,
    pub price_cents: i64,
    pub current_stock: i64,
    pub minimum_stock_level: i64,
    pub barcode: Option<String>,
}

impl From<Product> for PosProduct {
    fn from(p: Product) -> Self {
        PosProduct {
            id: p.id,
            name: p.name,
            dci: p.dci,
            price_cents: p.selling_price_cents,
            current_stock: p.current_stock,
            minimum_stock_level: p.minimum_stock_level,
            barcode: p.barcode,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub products: Vec<PosProduct>,
}

#[derive(Debug, Deserialize)]
pub struct BarcodeParams {
    #[serde(default)]
    pub barcode: String,
}

#[derive(Debug, Serialize)]
pub struct BarcodeMatch {
    pub product: PosProduct,
}

#[derive(Debug, Serialize)]
pub struct CompletedSale {
    pub sale_id: String,
    pub receipt_number: String,
    pub total_cents: i64,
    pub message: String,
    pub sale: Sale,
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub filter: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SettledCredit {
    pub message: String,
    pub sale: Sale,
}

// =============================================================================
// Handlers
// =============================================================================

/// Active products whose name or barcode contains `q`. A blank query
/// returns an empty list.
pub async fn search_products(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SearchParams>,
) -> ApiResult<SearchResults> {
    let start = Instant::now();
    let products = state
        .db
        .products()
        .search(&params.q, POS_SEARCH_LIMIT)
        .await?;

    debug!(
        query = %params.q,
        count = products.len(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "POS search"
    );

    Ok(ok(SearchResults {
        products: products.into_iter().map(PosProduct::from).collect(),
    }))
}

pub async fn barcode_search(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<BarcodeParams>,
) -> ApiResult<BarcodeMatch> {
    let barcode = params.barcode.trim();
    if barcode.is_empty() {
        return Err(ValidationError::Required {
            field: "barcode".to_string(),
        }
        .into());
    }

    let product = state
        .db
        .products()
        .get_by_barcode(barcode)
        .await?
        .ok_or_else(|| ApiError::not_found("Product with barcode", barcode))?;

    Ok(ok(BarcodeMatch {
        product: product.into(),
    }))
}

/// Commits a sale atomically: either every line is recorded and its stock
/// decremented, or nothing changes.
pub async fn complete_sale(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SaleRequest>,
) -> ApiResult<CompletedSale> {
    let draft = request.validate()?;
    let sale = state.db.sales().complete_sale(draft, &state.actor).await?;

    Ok(ok(CompletedSale {
        sale_id: sale.id.clone(),
        receipt_number: sale.receipt_number.clone(),
        total_cents: sale.total_cents,
        message: format!("Sale {} recorded", sale.receipt_number),
        sale,
    }))
}

pub async fn history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryParams>,
) -> ApiResult<SalesHistory> {
    let filter = HistoryFilter::from_param(params.filter.as_deref());
    let range = filter.date_range(Utc::now().date_naive());

    let sales = state.db.sales().history(range).await?;
    Ok(ok(SalesHistory::build(filter, range, sales)))
}

pub async fn credit_ledger(State(state): State<AppState>) -> ApiResult<CreditLedger> {
    let ledger = state.db.sales().credit_ledger().await?;
    Ok(ok(ledger))
}

pub async fn mark_credit_paid(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<SettledCredit> {
    validate_uuid("id", &id)?;
    let sale = state.db.sales().mark_credit_paid(&id).await?;

    Ok(ok(SettledCredit {
        message: format!("Credit sale {} marked as paid", sale.receipt_number),
        sale,
    }))
}
