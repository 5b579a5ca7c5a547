//! `/api/system`: node status and manual sync.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use healthguard_core::{round_to, SyncStatus};
use healthguard_sync::SyncReport;

use super::AppState;
use crate::auth::CurrentUser;
use crate::error::ApiResult;

pub fn system_routes() -> Router<AppState> {
    Router::new()
        .route("/api/system/status", get(system_status))
        .route("/api/system/sync", post(trigger_sync))
}

/// Snapshot of the node for the dashboard header.
#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub device_id: String,
    pub uptime_seconds: f64,
    pub database_size_mb: f64,
    pub total_readings: i64,
    pub unsynced_readings: i64,
    pub last_sync: Option<DateTime<Utc>>,
    pub last_sync_status: Option<SyncStatus>,
    /// `active` while the collection loop runs with a working sensor.
    pub sensor_status: &'static str,
    pub mock_mode: bool,
}

async fn system_status(
    State(node): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<SystemStatus>> {
    let db = node.db();
    let last = db.sync_log().latest().await?;
    let size_bytes = db.size_bytes().await?;

    let collector = node.collector();
    let sensor_status = if collector.is_running() && collector.sensor_available() {
        "active"
    } else {
        "inactive"
    };

    Ok(Json(SystemStatus {
        device_id: node.config().device.id.clone(),
        uptime_seconds: round_to(node.uptime().as_secs_f64(), 1),
        database_size_mb: round_to(size_bytes as f64 / (1024.0 * 1024.0), 2),
        total_readings: db.vitals().count().await?,
        unsynced_readings: db.vitals().count_unsynced().await?,
        last_sync: last.as_ref().map(|a| a.timestamp),
        last_sync_status: last.map(|a| a.status),
        sensor_status,
        mock_mode: node.config().sensor.mock_mode,
    }))
}

async fn trigger_sync(
    State(node): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Json<SyncReport> {
    info!(by = %user.username, "Manual sync requested");
    Json(node.sync_engine().sync_cycle().await)
}
