//! HTTP exposition endpoint.
//!
//! Serves a point-in-time snapshot of the registry in the Prometheus text
//! format on every request.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use exporter_runtime::{text_content_type, MetricRegistry};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<MetricRegistry>,
}

/// Create the router: `/` and `/metrics` serve metrics, `/health` answers `ok`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(metrics))
        .route("/metrics", get(metrics))
        .route("/health", get(health))
        .with_state(state)
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.registry.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, text_content_type())], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}
