//! # Sensor Trait
//!
//! The capability every vital-sign source provides, plus the factory that
//! picks a variant from configuration.

use async_trait::async_trait;
use tracing::info;

use healthguard_core::VitalSample;

use crate::error::SensorResult;
use crate::hardware::Max30102Sensor;
use crate::mock::MockSensor;

/// A source of normalized vital-sign samples.
///
/// ## Lifecycle
/// ```text
/// new ──► initialize() ──► read() × N ──► shutdown()
///              │                              │
///              └── SensorError::Unavailable   └── idempotent
/// ```
///
/// Clamping and rounding are the implementor's job; the collection loop
/// persists samples as-is.
#[async_trait]
pub trait Sensor: Send + Sync {
    /// Brings the device up. Not retried by callers.
    async fn initialize(&mut self) -> SensorResult<()>;

    /// Takes one sample.
    async fn read(&mut self) -> SensorResult<VitalSample>;

    /// Releases the device. Safe to call more than once.
    async fn shutdown(&mut self);

    /// Point-in-time check: initialized and not shut down.
    fn is_available(&self) -> bool;

    /// Short name for logs and status reporting.
    fn name(&self) -> &'static str;
}

/// Which sensor variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    /// Simulated vitals.
    Mock,
    /// MAX30102 over I2C.
    Hardware,
}

impl SensorKind {
    /// Maps the `mock_mode` configuration flag to a kind.
    pub fn from_mock_mode(mock_mode: bool) -> Self {
        if mock_mode {
            SensorKind::Mock
        } else {
            SensorKind::Hardware
        }
    }
}

/// Builds the sensor for `kind`. The returned sensor is not initialized.
pub fn create_sensor(kind: SensorKind) -> Box<dyn Sensor> {
    match kind {
        SensorKind::Mock => {
            info!("Using simulated sensor (disable mock mode for real hardware)");
            Box::new(MockSensor::new())
        }
        SensorKind::Hardware => {
            info!("Using MAX30102 sensor via I2C");
            Box::new(Max30102Sensor::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_mock_mode() {
        assert_eq!(SensorKind::from_mock_mode(true), SensorKind::Mock);
        assert_eq!(SensorKind::from_mock_mode(false), SensorKind::Hardware);
    }

    #[test]
    fn test_factory_builds_uninitialized_sensors() {
        let mock = create_sensor(SensorKind::Mock);
        assert_eq!(mock.name(), "mock");
        assert!(!mock.is_available());

        let hw = create_sensor(SensorKind::Hardware);
        assert_eq!(hw.name(), "max30102");
        assert!(!hw.is_available());
    }
}
