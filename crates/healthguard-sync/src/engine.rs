//! # Sync Engine
//!
//! Runs one sync cycle: select, sign, deliver with retries, commit, audit.
//!
//! ## Cycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock (single-flight)                                                   │
//! │    │                                                                    │
//! │    ├─► fetch_unsynced(batch_size) ── empty ──────────────┐              │
//! │    │                                                     │              │
//! │    ├─► SyncPayload::sign(api_key)                        │              │
//! │    │                                                     │              │
//! │    ├─► upload ─fail─► sleep base^1 ─► upload ─fail─► …   │              │
//! │    │      │                                      │       │              │
//! │    │   accepted                              exhausted   │              │
//! │    │      │                                      │       │              │
//! │    ├─► mark_synced(selected ids)                 │       │              │
//! │    │      │                                      │       │              │
//! │    └─► sync_log.record(...)  ◄───────────────────┴───────┘              │
//! │          exactly one row per cycle                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A non-retryable failure ends delivery at once and its own error is what
//! gets audited. Cancelling the token passed to `sync_cycle_until` cuts a
//! backoff wait short; the cycle still writes its audit row.
//!
//! Delivery is at-least-once: a crash between the server's acknowledgement
//! and the commit resends the batch next cycle, and the server de-duplicates
//! by reading UUID.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use healthguard_core::{NewSyncAttempt, SyncStatus};
use healthguard_db::Database;

use crate::config::{RetryPolicy, SyncSettings};
use crate::error::{SyncError, SyncResult};
use crate::payload::{SignedBatch, SyncPayload};
use crate::uploader::{BatchUploader, DeliveryOutcome};

/// One delivery attempt within a cycle.
#[derive(Debug)]
pub struct DeliveryAttempt {
    /// 1-based attempt number.
    pub attempt: u32,
    pub outcome: DeliveryOutcome,
    /// Sleep taken after this attempt, if another followed.
    pub backoff: Option<Duration>,
}

/// What a cycle did. Serializes as the manual-sync API response.
#[derive(Debug, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    pub records_sent: i64,
    pub duration_ms: i64,
    pub error: Option<String>,
    #[serde(skip)]
    pub attempts: Vec<DeliveryAttempt>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.status == SyncStatus::Success
    }
}

/// Progress of the cycle in flight, kept even when it ends in an error.
#[derive(Default)]
struct CycleState {
    records_sent: i64,
    attempts: Vec<DeliveryAttempt>,
}

// =============================================================================
// Engine
// =============================================================================

/// Pushes unsynced readings to the central server.
///
/// Cycles are single-flight: a manual trigger while the periodic cycle
/// runs waits for it, then runs its own.
pub struct SyncEngine {
    db: Database,
    device_id: String,
    api_key: String,
    batch_size: u32,
    policy: RetryPolicy,
    uploader: Arc<dyn BatchUploader>,
    cycle_lock: Mutex<()>,
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("device_id", &self.device_id)
            .field("batch_size", &self.batch_size)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl SyncEngine {
    /// Creates an engine around any uploader.
    ///
    /// ## Errors
    /// - `SyncError::MissingDeviceId` for a blank device id
    /// - configuration errors from `settings` or `policy`
    pub fn new(
        db: Database,
        device_id: &str,
        settings: &SyncSettings,
        policy: RetryPolicy,
        uploader: Arc<dyn BatchUploader>,
    ) -> SyncResult<Self> {
        if device_id.trim().is_empty() {
            return Err(SyncError::MissingDeviceId);
        }
        settings.validate()?;
        policy.validate()?;

        Ok(SyncEngine {
            db,
            device_id: device_id.to_string(),
            api_key: settings.api_key.clone(),
            batch_size: settings.batch_size,
            policy,
            uploader,
            cycle_lock: Mutex::new(()),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Runs one cycle and records its audit row.
    ///
    /// Never fails: every error ends up in the report and in `sync_log`.
    pub async fn sync_cycle(&self) -> SyncReport {
        self.sync_cycle_until(&CancellationToken::new()).await
    }

    /// Like [`sync_cycle`](Self::sync_cycle), but a backoff wait ends early
    /// once `cancel` fires. An attempt already sent is never interrupted.
    pub async fn sync_cycle_until(&self, cancel: &CancellationToken) -> SyncReport {
        let _flight = self.cycle_lock.lock().await;
        let started = Instant::now();

        let mut state = CycleState::default();
        let result = self.run_cycle(&mut state, cancel).await;

        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let (status, error) = match result {
            Ok(()) => (SyncStatus::Success, None),
            Err(e) => {
                error!(error = %e, attempts = state.attempts.len(), "Sync cycle failed");
                (SyncStatus::Failed, Some(e.to_string()))
            }
        };

        let audit = NewSyncAttempt {
            records_sent: state.records_sent,
            status,
            error_message: error.clone(),
            duration_ms,
        };
        if let Err(e) = self.db.sync_log().record(&audit).await {
            error!(error = %e, "Failed to write sync audit row");
        }

        SyncReport {
            status,
            records_sent: state.records_sent,
            duration_ms,
            error,
            attempts: state.attempts,
        }
    }

    async fn run_cycle(&self, state: &mut CycleState, cancel: &CancellationToken) -> SyncResult<()> {
        let records = self.db.vitals().fetch_unsynced(self.batch_size).await?;
        if records.is_empty() {
            debug!("No unsynced readings");
            return Ok(());
        }

        let batch = SyncPayload::new(&self.device_id, &records).sign(self.api_key.as_bytes())?;
        self.deliver(&batch, &mut state.attempts, cancel).await?;

        // Confirmed by the server from here on, even if the commit fails.
        state.records_sent = i64::try_from(records.len()).unwrap_or(i64::MAX);

        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        let marked = self.db.vitals().mark_synced(&ids, Utc::now()).await?;
        if marked as usize != ids.len() {
            warn!(
                selected = ids.len(),
                marked,
                "Some readings were already marked synced"
            );
        }

        info!(records = ids.len(), "Synced readings to central server");
        Ok(())
    }

    /// Attempts delivery up to `max_retries` times.
    ///
    /// ## Errors
    /// - the attempt's own error when it is not worth retrying
    /// - `SyncError::Cancelled` when `cancel` fires during a backoff wait
    /// - `SyncError::RetriesExhausted` when every attempt failed
    async fn deliver(
        &self,
        batch: &SignedBatch,
        attempts: &mut Vec<DeliveryAttempt>,
        cancel: &CancellationToken,
    ) -> SyncResult<()> {
        let max = self.policy.max_retries;

        for attempt in 1..=max {
            let outcome = self.uploader.upload(batch).await;

            let fatal = match &outcome {
                DeliveryOutcome::Accepted { status } => {
                    debug!(attempt, status, "Batch accepted");
                    attempts.push(DeliveryAttempt {
                        attempt,
                        outcome,
                        backoff: None,
                    });
                    return Ok(());
                }
                DeliveryOutcome::Failed(err) => {
                    warn!(attempt, max, error = %err, "Sync attempt failed");
                    (!err.is_retryable()).then(|| err.clone())
                }
            };

            let backoff = (fatal.is_none() && self.policy.has_next(attempt))
                .then(|| self.policy.backoff(attempt));
            attempts.push(DeliveryAttempt {
                attempt,
                outcome,
                backoff,
            });

            if let Some(err) = fatal {
                return Err(err);
            }
            let Some(delay) = backoff else {
                break;
            };

            info!(delay_ms = delay.as_millis() as u64, "Retrying sync");
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(attempt, "Sync retry cancelled");
                    return Err(SyncError::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }

        Err(SyncError::RetriesExhausted)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
