//! # Inventory Routes
//!
//! Product CRUD, receiving and adjustments.
//!
//! ## Stock Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /inventory/api/stock/receive                                      │
//! │     batch + stock increment + `receipt` movement   (one transaction)    │
//! │                                                                         │
//! │  POST /inventory/api/products/{id}/adjust-stock                         │
//! │     version-checked update + `adjustment|return|damage|expiry` movement │
//! │                                                                         │
//! │  PUT /inventory/api/products/{id}                                       │
//! │     catalog fields only; `current_stock` in the body is ignored         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use pharma_core::inventory::{ReceiveStock, StockAdjustment};
use pharma_core::validation::validate_uuid;
use pharma_core::{Product, ProductBatch, ProductInput, StockMovement};
use pharma_db::StockReceipt;

use super::{ok, ApiJson, ApiPath, ApiQuery, ApiResult};
use crate::error::ApiError;
use crate::state::AppState;

/// Default and maximum page of the movement log.
const DEFAULT_MOVEMENT_LIMIT: i64 = 50;
const MAX_MOVEMENT_LIMIT: i64 = 500;

// =============================================================================
// Bodies
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ProductBody {
    pub product: Product,
}

/// Product edit. `version`, when sent, must match the stored row.
#[derive(Debug, Deserialize)]
pub struct UpdateProduct {
    #[serde(flatten)]
    pub input: ProductInput,
    #[serde(default)]
    pub version: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BatchList {
    pub product_id: String,
    pub batches: Vec<ProductBatch>,
}

#[derive(Debug, Deserialize)]
pub struct MovementParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MovementList {
    pub product_id: String,
    pub movements: Vec<StockMovement>,
}

#[derive(Debug, Serialize)]
pub struct Adjusted {
    pub movement: StockMovement,
    pub new_stock: i64,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Received {
    #[serde(flatten)]
    pub receipt: StockReceipt,
    pub message: String,
}

// =============================================================================
// Handlers
// =============================================================================

fn checked_id(id: &str) -> Result<(), ApiError> {
    validate_uuid("id", id).map_err(ApiError::from)
}

/// Valid id of an existing product (active or not).
async fn existing_product(state: &AppState, id: &str) -> Result<Product, ApiError> {
    checked_id(id)?;
    state
        .db
        .products()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", id))
}

pub async fn list_products(State(state): State<AppState>) -> ApiResult<ProductList> {
    let products = state.db.products().list_active().await?;
    Ok(ok(ProductList {
        total: products.len(),
        products,
    }))
}

pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> ApiResult<ProductBody> {
    let product = state.db.products().insert(input, &state.actor).await?;
    Ok(ok(ProductBody { product }))
}

pub async fn get_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<ProductBody> {
    let product = existing_product(&state, &id).await?;
    Ok(ok(ProductBody { product }))
}

pub async fn update_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateProduct>,
) -> ApiResult<ProductBody> {
    checked_id(&id)?;
    let product = state.db.products().update(&id, body.input, body.version).await?;
    info!(id = %product.id, version = product.version, "Product updated");
    Ok(ok(ProductBody { product }))
}

pub async fn delete_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Deleted> {
    checked_id(&id)?;
    state.db.products().soft_delete(&id).await?;
    Ok(ok(Deleted {
        message: format!("Product {} deactivated", id),
        id,
    }))
}

pub async fn product_batches(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<BatchList> {
    existing_product(&state, &id).await?;
    let batches = state.db.stock().batches(&id).await?;
    Ok(ok(BatchList {
        product_id: id,
        batches,
    }))
}

pub async fn product_movements(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiQuery(params): ApiQuery<MovementParams>,
) -> ApiResult<MovementList> {
    existing_product(&state, &id).await?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_MOVEMENT_LIMIT)
        .clamp(1, MAX_MOVEMENT_LIMIT);
    debug!(id = %id, limit, "Listing movements");

    let movements = state.db.stock().movements(&id, limit).await?;
    Ok(ok(MovementList {
        product_id: id,
        movements,
    }))
}

pub async fn adjust_stock(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(adjustment): ApiJson<StockAdjustment>,
) -> ApiResult<Adjusted> {
    checked_id(&id)?;
    let movement = state.db.stock().adjust(&id, adjustment, &state.actor).await?;

    Ok(ok(Adjusted {
        new_stock: movement.new_stock,
        message: format!(
            "Stock adjusted from {} to {}",
            movement.previous_stock, movement.new_stock
        ),
        movement,
    }))
}

pub async fn receive_stock(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReceiveStock>,
) -> ApiResult<Received> {
    let receipt = state.db.stock().receive(request, &state.actor).await?;

    Ok(ok(Received {
        message: format!(
            "Batch {} received: {} units",
            receipt.batch.batch_number, receipt.batch.quantity
        ),
        receipt,
    }))
}
