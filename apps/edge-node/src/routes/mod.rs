//! # HTTP API
//!
//! ```text
//! /api/auth/*     login, register (admin), me
//! /api/vitals/*   listing, latest, stats, SSE stream
//! /api/patient    profile read / partial update
//! /api/system/*   status, manual sync
//! /health         liveness
//! /*              dashboard (SPA) or JSON banner
//! ```

pub mod auth;
pub mod patient;
pub mod system;
pub mod vitals;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::node::EdgeNode;

/// Shared handler state.
pub type AppState = Arc<EdgeNode>;

/// Builds the full application router.
pub fn router(node: AppState) -> Router {
    let static_dir = node.config().server.static_dir.clone();

    let app = Router::new()
        .merge(auth::auth_routes())
        .merge(vitals::vitals_routes())
        .merge(patient::patient_routes())
        .merge(system::system_routes())
        .route("/health", get(health));

    let app = with_dashboard(app, &static_dir);

    app.with_state(node)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Serves the API until `signal` resolves, then drains connections.
///
/// Live streams are closed as soon as the signal fires; otherwise a
/// connected dashboard would hold the drain open forever.
pub async fn serve<F>(listener: TcpListener, node: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(node.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            signal.await;
            node.begin_shutdown();
        })
        .await
}

/// Serves the built dashboard with SPA fallback, or a JSON banner at `/`.
fn with_dashboard(app: Router<AppState>, static_dir: &Path) -> Router<AppState> {
    let index = static_dir.join("index.html");
    if index.is_file() {
        info!(dir = %static_dir.display(), "Serving dashboard");
        let files = ServeDir::new(static_dir).fallback(ServeFile::new(index));
        app.fallback_service(files)
    } else {
        app.route("/", get(banner))
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn banner() -> Json<Value> {
    Json(json!({
        "service": "HealthGuard Edge Node",
        "status": "running",
        "note": "Dashboard not built. Place the frontend build in the static directory.",
    }))
}
