//! # Catalog CSV Routes
//!
//! ```text
//! GET  /inventory/products/export     all products (active or not), CSV
//! GET  /inventory/products/template   header + one example row
//! POST /inventory/products/import     multipart, field `file`
//!
//!   upload ──► parse_catalog ──► rows ──► upsert_record (per row)
//!                   │                         │
//!                   ▼                         ▼
//!              row errors ◄──────────── rejected rows
//!                   │
//!                   ▼
//!   { success, imported, created, updated, errors: ["Row 3: ...", ...] }
//! ```
//!
//! A bad row never stops the import; a file without a `Name` column is
//! rejected as a whole.

use axum::extract::{Multipart, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use pharma_core::catalog::{self, ImportSummary, RowError};
use pharma_db::{DbError, UpsertOutcome};

use super::{ok, ApiResult};
use crate::error::ApiError;
use crate::state::AppState;

/// Multipart field holding the uploaded file.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
    pub created: usize,
    pub updated: usize,
    pub error_count: usize,
    /// At most ten row messages, then "...and K more errors".
    pub errors: Vec<String>,
}

impl From<ImportSummary> for ImportResponse {
    fn from(summary: ImportSummary) -> Self {
        ImportResponse {
            imported: summary.imported,
            created: summary.created,
            updated: summary.updated,
            error_count: summary.errors.len(),
            errors: summary.messages(),
        }
    }
}

fn csv_attachment(body: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

pub async fn export(State(state): State<AppState>) -> Result<Response, ApiError> {
    let products = state.db.products().list_all().await?;
    let body = catalog::write_catalog(&products)?;
    info!(count = products.len(), "Catalog exported");

    let filename = format!("products_export_{}.csv", Utc::now().format("%Y%m%d"));
    Ok(csv_attachment(body, &filename))
}

pub async fn template() -> Result<Response, ApiError> {
    Ok(csv_attachment(catalog::template()?, "products_template.csv"))
}

pub async fn import(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<ImportResponse> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(FILE_FIELD) {
            upload = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = upload.ok_or_else(|| {
        ApiError::validation("No file uploaded; send the CSV in the `file` field")
    })?;

    let parsed = catalog::parse_catalog(&bytes)?;
    let mut summary = ImportSummary {
        errors: parsed.errors,
        ..Default::default()
    };

    let products = state.db.products();
    for (row, record) in parsed.rows {
        match products.upsert_record(record, &state.actor).await {
            Ok(UpsertOutcome::Created) => summary.created += 1,
            Ok(UpsertOutcome::Updated) => summary.updated += 1,
            Err(DbError::Domain(e)) => {
                summary.errors.push(RowError { row, errors: vec![e.to_string()] });
                continue;
            }
            Err(DbError::UniqueViolation { field, value }) => {
                summary.errors.push(RowError {
                    row,
                    errors: vec![format!("{} '{}' already exists", field, value)],
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        }
        summary.imported += 1;
    }
    summary.errors.sort_by_key(|e| e.row);

    if summary.errors.is_empty() {
        info!(
            imported = summary.imported,
            created = summary.created,
            updated = summary.updated,
            "Catalog imported"
        );
    } else {
        warn!(
            imported = summary.imported,
            rejected = summary.errors.len(),
            "Catalog imported with row errors"
        );
    }

    Ok(ok(ImportResponse::from(summary)))
}
