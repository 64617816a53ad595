//! Human-facing service status.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{AppState, retention::ScannerState};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub version: &'static str,
    /// Configured retention window in minutes, as written in the config.
    pub retention_minutes: i64,
    pub retention_enabled: bool,
    pub scanner_state: ScannerState,
    /// `None` until the first pass completes.
    pub last_scan_completed: Option<DateTime<Utc>>,
    pub deletes_total: u64,
}

#[tracing::instrument(name = "status.get", skip(state))]
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let datastore = &state.config.datastore;
    let stats = &state.stats;

    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        retention_minutes: datastore.retention_minutes,
        retention_enabled: datastore.retention_enabled(),
        scanner_state: stats.state(),
        last_scan_completed: stats.has_completed().then(|| stats.completion_time()),
        deletes_total: stats.deletes_total(),
    })
}
