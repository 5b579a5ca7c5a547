//! # Edge Node Lifecycle
//!
//! `EdgeNode` owns everything the HTTP layer shares: the store, the
//! collection loop, the sync engine and its scheduler.
//!
//! ## Startup / Shutdown Order
//! ```text
//! start():    open store + migrate ──► seed admin ──► start collector
//!                                                         │
//!             serve HTTP ◄── start scheduler ◄── build SyncEngine
//!
//! signal:     begin_shutdown() ends live SSE streams ──► HTTP drains
//!
//! shutdown(): stop scheduler (in-flight upload finishes, backoff is cut
//!             short) ──► stop collector (sensor released) ──► close pool
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use healthguard_db::{Database, DbConfig, DbError};
use healthguard_sensor::{create_sensor, CollectorHandle, Sensor, SensorError, SensorKind};
use healthguard_sync::{
    BatchUploader, HttpUploader, RetryPolicy, SchedulerHandle, SyncEngine, SyncError,
};

use crate::auth::{seed_admin, JwtManager};
use crate::config::EdgeConfig;
use crate::error::ApiError;

/// Startup failures. Each one aborts the process.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("Database startup failed: {0}")]
    Database(#[from] DbError),

    #[error("Sensor startup failed: {0}")]
    Sensor(#[from] SensorError),

    #[error("Sync startup failed: {0}")]
    Sync(#[from] SyncError),

    #[error("Admin account setup failed: {0}")]
    Admin(#[from] ApiError),
}

/// Running edge node.
#[derive(Debug)]
pub struct EdgeNode {
    config: EdgeConfig,
    db: Database,
    collector: CollectorHandle,
    sync: Arc<SyncEngine>,
    scheduler: SchedulerHandle,
    jwt: JwtManager,
    /// Cancelled when shutdown begins; long-lived responses end on it.
    closing: CancellationToken,
    started: Instant,
}

impl EdgeNode {
    /// Starts the node with the configured sensor and the HTTP uploader.
    pub async fn start(config: EdgeConfig) -> Result<Self, NodeError> {
        let sensor = create_sensor(SensorKind::from_mock_mode(config.sensor.mock_mode));
        let policy = RetryPolicy::default();
        let uploader = HttpUploader::new(&config.device.id, &config.sync, &policy)?;
        info!(url = %uploader.url(), "Sync uploader configured");

        Self::start_with(config, sensor, Arc::new(uploader), policy).await
    }

    /// Starts the node around explicit components.
    pub async fn start_with(
        config: EdgeConfig,
        sensor: Box<dyn Sensor>,
        uploader: Arc<dyn BatchUploader>,
        policy: RetryPolicy,
    ) -> Result<Self, NodeError> {
        let db_config = if config.database.path == ":memory:" {
            DbConfig::in_memory()
        } else {
            DbConfig::new(&config.database.path)
        };
        let db = Database::new(db_config).await?;
        info!(path = %config.database.path, "Database ready");

        seed_admin(&db, &config.auth.default_admin_password).await?;

        let collector = CollectorHandle::start(sensor, db.clone(), config.sensor.interval()).await?;

        let sync = match SyncEngine::new(
            db.clone(),
            &config.device.id,
            &config.sync,
            policy,
            uploader,
        ) {
            Ok(engine) => Arc::new(engine),
            Err(e) => {
                let _ = collector.stop().await;
                return Err(e.into());
            }
        };
        let scheduler = SchedulerHandle::start(sync.clone(), config.sync.interval());

        let jwt = JwtManager::new(
            config.auth.secret_key.clone(),
            config.auth.access_token_expire_minutes,
        );

        info!(
            device_id = %config.device.id,
            mock_mode = config.sensor.mock_mode,
            "HealthGuard edge node started"
        );

        Ok(EdgeNode {
            config,
            db,
            collector,
            sync,
            scheduler,
            jwt,
            closing: CancellationToken::new(),
            started: Instant::now(),
        })
    }

    /// Ends live streams so the HTTP server can finish draining.
    pub fn begin_shutdown(&self) {
        if !self.closing.is_cancelled() {
            info!("Closing live streams");
            self.closing.cancel();
        }
    }

    /// Fires once [`begin_shutdown`](Self::begin_shutdown) has been called.
    pub fn closing(&self) -> &CancellationToken {
        &self.closing
    }

    /// Stops background work and closes the store.
    pub async fn shutdown(&self) {
        info!("Shutting down edge node");
        self.begin_shutdown();

        if let Err(e) = self.scheduler.stop().await {
            warn!(error = %e, "Sync scheduler did not stop cleanly");
        }
        if let Err(e) = self.collector.stop().await {
            warn!(error = %e, "Collector did not stop cleanly");
        }
        self.db.close().await;

        info!("Edge node stopped");
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn collector(&self) -> &CollectorHandle {
        &self.collector
    }

    pub fn sync_engine(&self) -> &SyncEngine {
        &self.sync
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }

    pub fn jwt(&self) -> &JwtManager {
        &self.jwt
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let node = test_node().await;

        assert!(node.collector().is_running());
        assert!(node.scheduler().is_running());
        assert_eq!(node.db().users().count().await.unwrap(), 1);
        assert!(node.db().patients().get().await.unwrap().is_some());
        assert_eq!(node.sync_engine().device_id(), "edge-test");

        node.shutdown().await;
        assert!(!node.collector().is_running());
        assert!(!node.scheduler().is_running());
    }

    #[tokio::test]
    async fn test_manual_cycle_through_node() {
        let node = test_node().await;

        let report = node.sync_engine().sync_cycle().await;
        assert!(report.is_success());
        assert_eq!(node.db().sync_log().count().await.unwrap(), 1);

        node.shutdown().await;
    }
}
