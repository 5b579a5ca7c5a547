//! # Sensor Error Types

use healthguard_db::DbError;
use thiserror::Error;

/// Errors raised by sensors and the collection loop.
#[derive(Debug, Error)]
pub enum SensorError {
    /// The sensor could not be brought up. Fatal at startup.
    #[error("Sensor unavailable: {0}")]
    Unavailable(String),

    /// A single read failed. The loop logs it and tries again next tick.
    #[error("Sensor read failed: {0}")]
    Read(String),

    /// Persisting a reading (or the default patient) failed.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// The collection loop is already running.
    #[error("Collection already running")]
    AlreadyRunning,

    /// The collection task panicked or was aborted.
    #[error("Collection task failed: {0}")]
    TaskFailed(String),
}

/// Result type for sensor operations.
pub type SensorResult<T> = Result<T, SensorError>;
