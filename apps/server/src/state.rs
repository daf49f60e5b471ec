//! Shared application state.

use pharma_db::Database;
use std::sync::Arc;

/// Handed to every handler by axum's `State` extractor; cloned per request.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    /// Label written to `created_by` on stock movements.
    pub actor: Arc<str>,
}

impl AppState {
    pub fn new(db: Database, actor: impl Into<Arc<str>>) -> Self {
        AppState {
            db,
            actor: actor.into(),
        }
    }
}
