pub mod error;
pub mod health;
pub mod metrics;

use axum::{Router, routing::get};

use crate::AppState;

/// Versioned API routes, mounted under `/api`.
pub fn api_routes() -> Router<AppState> {
    Router::new().route("/v1/metrics", get(metrics::list_metrics))
}
