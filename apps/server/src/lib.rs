//! # pharma-server: HTTP JSON API for Pharma POS
//!
//! ## Request Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Request Lifecycle                                │
//! │                                                                         │
//! │  TCP ──► TraceLayer (span: method, uri, status, latency)                │
//! │              │                                                          │
//! │              ▼                                                          │
//! │          Router ── unknown path ─────► 404 NOT_FOUND                    │
//! │              │  ── wrong verb ───────► 405 METHOD_NOT_ALLOWED           │
//! │              ▼                                                          │
//! │          Extractors (ApiJson / ApiQuery / ApiPath)                      │
//! │              │  ── bad input ────────► 400 VALIDATION_ERROR             │
//! │              ▼                                                          │
//! │          Handler ──► pharma-db repository ──► SQLite                    │
//! │              │                                                          │
//! │              ▼                                                          │
//! │          { "success": true, ... }  or  ApiError                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::{Request, Response};
use axum::Router;
use std::time::Duration;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

pub use config::{ConfigError, LogFormat, ServerConfig};
pub use error::{ApiError, ErrorCode};
pub use state::AppState;

/// Full application router with tracing and JSON fallbacks.
pub fn build_router(state: AppState) -> Router {
    routes::router()
        .method_not_allowed_fallback(routes::method_not_allowed)
        .fallback(routes::not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(|response: &Response<_>, latency: Duration, span: &Span| {
                    span.record("status", response.status().as_u16());
                    span.record("latency_ms", latency.as_millis() as u64);
                    DefaultOnResponse::default().on_response(response, latency, span);
                }),
        )
        .with_state(state)
}
