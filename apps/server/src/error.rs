//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Pharma POS                             │
//! │                                                                         │
//! │  POST /sales/api/sales/complete                                         │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │  Handler                                                         │  │
//! │  │  Result<Json<T>, ApiError>                                       │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Bad body? ───── JsonRejection ─────────────────────┐            │  │
//! │  │         │                                           │            │  │
//! │  │         ▼                                           ▼            │  │
//! │  │  Validation? ─── ValidationError ─────────────── ApiError ──────►│  │
//! │  │         │                                           ▲            │  │
//! │  │         ▼                                           │            │  │
//! │  │  Repository ──── DbError / CoreError ───────────────┘            │  │
//! │  │         │                                                        │  │
//! │  │         ▼                                                        │  │
//! │  │  Success ──────────────────────────────────────────────────────►│  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! │                                                                         │
//! │  HTTP 409                                                               │
//! │  {                                                                      │
//! │    "success": false,                                                    │
//! │    "code": "INSUFFICIENT_STOCK",                                        │
//! │    "message": "Insufficient stock for Doliprane: available 3, ...",     │
//! │    "details": { "product_id": "...", "available": 3, "requested": 5 }   │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Database and internal failures are logged in full and replaced by a
//! generic message before they reach the client.

use axum::extract::multipart::MultipartError;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pharma_core::catalog::CatalogError;
use pharma_core::{CoreError, ValidationError};
use pharma_db::DbError;
use serde::Serialize;
use serde_json::{json, Value};

/// API error returned from handlers.
///
/// ## Serialization
/// ```json
/// {
///   "success": false,
///   "code": "NOT_FOUND",
///   "message": "Product not found: 8f14e45f-..."
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Structured context (offending field, stock figures)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Stable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Known path, wrong verb (405)
    MethodNotAllowed,

    /// Unique key already taken (409)
    DuplicateKey,

    /// Sale asks for more than is on hand (409)
    InsufficientStock,

    /// Lost an optimistic concurrency race (409)
    Conflict,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ErrorCode::DuplicateKey | ErrorCode::InsufficientStock | ErrorCode::Conflict => {
                StatusCode::CONFLICT
            }
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
            .with_details(json!({ "resource": resource, "id": id }))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn method_not_allowed() -> Self {
        ApiError::new(ErrorCode::MethodNotAllowed, "Method not allowed")
    }

    fn database(log: &str, err: impl std::fmt::Display, message: &str) -> Self {
        tracing::error!(error = %err, "{}", log);
        ApiError::new(ErrorCode::DatabaseError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Body {
            success: bool,
            #[serde(flatten)]
            error: ApiError,
        }

        let status = self.code.status();
        (
            status,
            Json(Body {
                success: false,
                error: self,
            }),
        )
            .into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// =============================================================================
// Conversions
// =============================================================================

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let field = err.field().to_string();
        ApiError::validation(err.to_string()).with_details(json!({ "field": field }))
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::SaleNotFound(id) => ApiError::not_found("Sale", &id),
            CoreError::InsufficientStock {
                ref product_id,
                ref product_name,
                available,
                requested,
            } => {
                let details = json!({
                    "product_id": product_id,
                    "product_name": product_name,
                    "available": available,
                    "requested": requested,
                });
                ApiError::new(ErrorCode::InsufficientStock, err.to_string()).with_details(details)
            }
            CoreError::Validation(e) => e.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::DuplicateKey,
                format!("{} '{}' already exists", field, value),
            )
            .with_details(json!({ "field": field, "value": value })),
            DbError::Conflict { entity, id } => ApiError::new(
                ErrorCode::Conflict,
                format!("{} {} was modified by someone else, reload and retry", entity, id),
            ),
            DbError::Domain(e) => e.into(),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::validation("Invalid reference")
            }
            DbError::ConnectionFailed(e) => {
                ApiError::database("Database connection failed", e, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                ApiError::database("Database migration failed", e, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                ApiError::database("Database query failed", e, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                ApiError::database("Transaction failed", e, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                ApiError::database("Pool exhausted", "no connection", "Database pool exhausted")
            }
            DbError::Internal(e) => {
                ApiError::database("Internal database error", e, "Database operation failed")
            }
        }
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::MissingColumn(column) => {
                ApiError::validation(format!("Missing required column: {}", column))
                    .with_details(json!({ "field": column }))
            }
            CatalogError::Csv(e) => ApiError::validation(format!("Unreadable CSV file: {}", e)),
            CatalogError::Io(e) => {
                tracing::error!(error = %e, "Catalog I/O failed");
                ApiError::internal("Could not process the catalog file")
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::validation(err.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorCode::ValidationError.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::InsufficientStock.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorCode::DatabaseError.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_insufficient_stock_details() {
        let err: ApiError = DbError::Domain(CoreError::InsufficientStock {
            product_id: "p1".into(),
            product_name: "Doliprane".into(),
            available: 3,
            requested: 5,
        })
        .into();

        assert_eq!(err.code, ErrorCode::InsufficientStock);
        let details = err.details.unwrap();
        assert_eq!(details["available"], 3);
        assert_eq!(details["requested"], 5);
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err: ApiError = DbError::QueryFailed("no such table: products".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.message.contains("products"));
    }

    #[test]
    fn test_serialized_code() {
        let err = ApiError::validation("quantity must be between 1 and 999");
        let value = serde_json::to_value(&err).unwrap();
        assert_eq!(value["code"], "VALIDATION_ERROR");
        assert!(value.get("details").is_none());
    }
}
