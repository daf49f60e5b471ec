//! Liveness check.

use axum::extract::State;
use serde::Serialize;
use tracing::warn;

use super::{ok, ApiResult};
use crate::error::{ApiError, ErrorCode};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub database: &'static str,
    pub version: &'static str,
}

/// `200` when the database answers, `500 DATABASE_ERROR` otherwise.
pub async fn health(State(state): State<AppState>) -> ApiResult<HealthStatus> {
    if !state.db.health_check().await {
        warn!("Health check failed: database unreachable");
        return Err(ApiError::new(ErrorCode::DatabaseError, "Database unreachable"));
    }

    Ok(ok(HealthStatus {
        status: "ok",
        database: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}
