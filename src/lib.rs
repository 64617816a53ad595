//! Retention sweeper for an on-disk mail store.
//!
//! A single background task periodically purges messages older than the
//! configured window. Progress is published through [`retention::ScanStats`]
//! and served over HTTP by [`build_app`].

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod observability;
pub mod retention;
pub mod routes;
pub mod store;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::AppConfig>,
    pub stats: Arc<retention::ScanStats>,
}

/// Build the HTTP router for the stats and status endpoints.
pub fn build_app(config: &config::AppConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health/live", get(routes::health::liveness))
        .route("/debug/vars", get(routes::stats::debug_vars))
        .route("/status", get(routes::status::status));

    if config.observability.metrics.enabled {
        app = app.route("/metrics", get(routes::health::metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
