//! # Collection Loop
//!
//! One long-lived task that reads the sensor and persists each sample as an
//! unsynced reading, then sleeps for the configured interval.
//!
//! ## Cancellation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  tick:  read() ─► insert() ─► broadcast ─► select! {                   │
//! │                                              sleep(interval)  → next   │
//! │                                              cancelled()      → exit   │
//! │                                            }                           │
//! │                                                                         │
//! │  stop(): cancel ─► await task (returns the sensor) ─► shutdown() once  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Only the sleep is a cancellation point, so a read/persist in progress
//! always completes before the sensor is released.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use healthguard_core::VitalRecord;
use healthguard_db::Database;

use crate::error::{SensorError, SensorResult};
use crate::sensor::Sensor;

/// Default sampling interval.
pub const DEFAULT_SENSOR_INTERVAL: Duration = Duration::from_secs(5);

/// Capacity of the live-reading channel. Slow subscribers skip ahead.
const EVENT_CAPACITY: usize = 64;

// =============================================================================
// Handle
// =============================================================================

/// Owner-side handle of a running collection loop.
///
/// Replaces process-wide "active reader" state: status and the live stream
/// are read through the handle.
pub struct CollectorHandle {
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<Box<dyn Sensor>>>>,
    running: Arc<AtomicBool>,
    sensor_available: Arc<AtomicBool>,
    events: broadcast::Sender<VitalRecord>,
    sensor_name: &'static str,
    patient_id: i64,
}

impl std::fmt::Debug for CollectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectorHandle")
            .field("sensor", &self.sensor_name)
            .field("running", &self.is_running())
            .field("sensor_available", &self.sensor_available())
            .field("patient_id", &self.patient_id)
            .finish()
    }
}

impl CollectorHandle {
    /// Initializes `sensor`, ensures the default patient exists and spawns
    /// the loop.
    ///
    /// ## Errors
    /// - `SensorError::Unavailable` from `initialize()`; nothing is spawned
    /// - `SensorError::Database` if the patient profile can't be created
    pub async fn start(
        mut sensor: Box<dyn Sensor>,
        db: Database,
        interval: Duration,
    ) -> SensorResult<Self> {
        sensor.initialize().await?;

        let patient = match db.patients().ensure_default().await {
            Ok(patient) => patient,
            Err(e) => {
                sensor.shutdown().await;
                return Err(e.into());
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let cancel = CancellationToken::new();
        let running = Arc::new(AtomicBool::new(true));
        let sensor_available = Arc::new(AtomicBool::new(sensor.is_available()));
        let sensor_name = sensor.name();

        info!(
            sensor = sensor_name,
            interval_secs = interval.as_secs_f64(),
            patient_id = patient.id,
            "Sensor collection started"
        );

        let task = tokio::spawn(collection_loop(LoopContext {
            sensor,
            db,
            patient_id: patient.id,
            interval,
            cancel: cancel.clone(),
            events: events.clone(),
            sensor_available: sensor_available.clone(),
        }));

        Ok(CollectorHandle {
            cancel,
            task: Mutex::new(Some(task)),
            running,
            sensor_available,
            events,
            sensor_name,
            patient_id: patient.id,
        })
    }

    /// Stops the loop and releases the sensor. Later calls are no-ops.
    pub async fn stop(&self) -> SensorResult<()> {
        let Some(task) = self.task.lock().await.take() else {
            return Ok(());
        };

        self.cancel.cancel();
        let result = task.await;

        self.running.store(false, Ordering::SeqCst);
        self.sensor_available.store(false, Ordering::SeqCst);

        let mut sensor = result.map_err(|e| SensorError::TaskFailed(e.to_string()))?;
        sensor.shutdown().await;

        info!(sensor = self.sensor_name, "Sensor collection stopped");
        Ok(())
    }

    /// True between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Last observed `Sensor::is_available`.
    pub fn sensor_available(&self) -> bool {
        self.sensor_available.load(Ordering::SeqCst)
    }

    /// Subscribes to readings persisted from now on (without waveform).
    pub fn subscribe(&self) -> broadcast::Receiver<VitalRecord> {
        self.events.subscribe()
    }

    /// Name of the sensor variant in use.
    pub fn sensor_name(&self) -> &'static str {
        self.sensor_name
    }

    /// Patient the readings are attributed to.
    pub fn patient_id(&self) -> i64 {
        self.patient_id
    }
}

// =============================================================================
// Loop
// =============================================================================

struct LoopContext {
    sensor: Box<dyn Sensor>,
    db: Database,
    patient_id: i64,
    interval: Duration,
    cancel: CancellationToken,
    events: broadcast::Sender<VitalRecord>,
    sensor_available: Arc<AtomicBool>,
}

/// Runs until cancelled, then hands the sensor back for shutdown.
async fn collection_loop(mut ctx: LoopContext) -> Box<dyn Sensor> {
    loop {
        match collect_once(ctx.sensor.as_mut(), &ctx.db, ctx.patient_id).await {
            Ok(record) => {
                debug!(
                    id = record.id,
                    heart_rate = ?record.heart_rate,
                    spo2 = ?record.spo2,
                    temperature = ?record.temperature,
                    bp_sys = ?record.blood_pressure_sys,
                    bp_dia = ?record.blood_pressure_dia,
                    "Vitals recorded"
                );
                // No subscribers is fine.
                let _ = ctx.events.send(record.without_waveform());
            }
            Err(SensorError::Read(e)) => warn!(error = %e, "Sensor read failed"),
            Err(e) => error!(error = %e, "Failed to persist reading"),
        }

        ctx.sensor_available
            .store(ctx.sensor.is_available(), Ordering::SeqCst);

        tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            _ = tokio::time::sleep(ctx.interval) => {}
        }
    }

    debug!("Collection loop exited");
    ctx.sensor
}

async fn collect_once(
    sensor: &mut dyn Sensor,
    db: &Database,
    patient_id: i64,
) -> SensorResult<VitalRecord> {
    let sample = sensor.read().await?;
    let record = db.vitals().insert(patient_id, &sample).await?;
    Ok(record)
}

// =============================================================================
// Unit Tests
// =============================================================================
