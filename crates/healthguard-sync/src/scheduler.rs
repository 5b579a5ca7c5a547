//! # Periodic Sync
//!
//! Runs a sync cycle every interval, first after one interval.
//! Cancellation interrupts the wait between cycles and any backoff wait
//! inside one. An upload already in flight finishes, and the cycle writes
//! its audit row before the task exits.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::SyncEngine;
use crate::error::{SyncError, SyncResult};

/// Handle of the periodic sync task.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
    cycles: Arc<AtomicU64>,
    interval: Duration,
}

impl SchedulerHandle {
    /// Spawns the periodic task.
    pub fn start(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let cycles = Arc::new(AtomicU64::new(0));

        info!(interval_secs = interval.as_secs_f64(), "Sync scheduler started");

        let task = tokio::spawn(run(engine, interval, cancel.clone(), cycles.clone()));

        SchedulerHandle {
            cancel,
            task: Mutex::new(Some(task)),
            cycles,
            interval,
        }
    }

    /// Cancels the wait and awaits the task. Later calls are no-ops.
    pub async fn stop(&self) -> SyncResult<()> {
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };

        self.cancel.cancel();
        task.await.map_err(|e| SyncError::TaskFailed(e.to_string()))?;

        info!(cycles = self.cycles_completed(), "Sync scheduler stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Periodic cycles finished so far.
    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

async fn run(
    engine: Arc<SyncEngine>,
    period: Duration,
    cancel: CancellationToken,
    cycles: Arc<AtomicU64>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let report = engine.sync_cycle_until(&cancel).await;
                if !report.is_success() {
                    warn!(
                        error = report.error.as_deref().unwrap_or("unknown"),
                        "Periodic sync failed; will retry next interval"
                    );
                }
                cycles.fetch_add(1, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use healthguard_db::{Database, DbConfig};

    use super::*;
    use crate::config::{RetryPolicy, SyncSettings};
    use crate::payload::SignedBatch;
    use crate::uploader::{BatchUploader, DeliveryOutcome};
    use healthguard_core::{SyncStatus, VitalSample};

    struct AcceptAll;

    #[async_trait]
    impl BatchUploader for AcceptAll {
        async fn upload(&self, _batch: &SignedBatch) -> DeliveryOutcome {
            DeliveryOutcome::Accepted { status: 200 }
        }
    }

    /// Central server that is always down.
    struct Unavailable;

    #[async_trait]
    impl BatchUploader for Unavailable {
        async fn upload(&self, _batch: &SignedBatch) -> DeliveryOutcome {
            DeliveryOutcome::from_status(503, "maintenance")
        }
    }

    async fn engine() -> (Database, Arc<SyncEngine>) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let engine = SyncEngine::new(
            db.clone(),
            "edge-test",
            &SyncSettings::default(),
            RetryPolicy::default(),
            Arc::new(AcceptAll),
        )
        .unwrap();
        (db, Arc::new(engine))
    }

    #[tokio::test]
    async fn test_runs_periodically() {
        let (db, engine) = engine().await;
        let scheduler = SchedulerHandle::start(engine, Duration::from_millis(20));

        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await.unwrap();

        let cycles = scheduler.cycles_completed();
        assert!(cycles >= 2, "cycles {cycles}");
        assert_eq!(db.sync_log().count().await.unwrap(), cycles as i64);
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_first_cycle_waits_one_interval() {
        let (db, engine) = engine().await;
        let scheduler = SchedulerHandle::start(engine, Duration::from_secs(3600));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(db.sync_log().count().await.unwrap(), 0);

        // Stop interrupts the long wait promptly.
        tokio::time::timeout(Duration::from_secs(1), scheduler.stop())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(scheduler.cycles_completed(), 0);

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stop_interrupts_backoff() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let patient = db.patients().ensure_default().await.unwrap();
        db.vitals()
            .insert(patient.id, &VitalSample::empty(chrono::Utc::now()))
            .await
            .unwrap();

        // Default policy: the first retry waits 2 s.
        let engine = SyncEngine::new(
            db.clone(),
            "edge-test",
            &SyncSettings::default(),
            RetryPolicy::default(),
            Arc::new(Unavailable),
        )
        .unwrap();
        let scheduler = SchedulerHandle::start(Arc::new(engine), Duration::from_millis(20));

        // Let the first cycle fail its first attempt and start backing off.
        tokio::time::sleep(Duration::from_millis(200)).await;

        tokio::time::timeout(Duration::from_secs(1), scheduler.stop())
            .await
            .expect("stop should not wait out the backoff")
            .unwrap();

        assert_eq!(scheduler.cycles_completed(), 1);
        let audit = db.sync_log().latest().await.unwrap().unwrap();
        assert_eq!(audit.status, SyncStatus::Failed);
        assert_eq!(audit.error_message.as_deref(), Some("cancelled while waiting to retry"));
        assert_eq!(db.vitals().count_unsynced().await.unwrap(), 1);
    }
}
