//! # MAX30102 Sensor (stub)
//!
//! Opens the I2C bus device the MAX30102 pulse oximeter sits on. Register
//! access and the red/IR processing pipeline are not implemented: `read`
//! simulates the sampling window and returns a sample with no vitals.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs::{File, OpenOptions};
use tracing::{info, warn};

use healthguard_core::VitalSample;

use crate::error::{SensorError, SensorResult};
use crate::sensor::Sensor;

/// Raspberry Pi I2C bus.
pub const I2C_BUS: u8 = 1;

/// Default MAX30102 slave address.
pub const I2C_ADDRESS: u8 = 0x57;

/// Part-ID register.
pub const PART_ID_REGISTER: u8 = 0xFF;

const SAMPLE_WINDOW: Duration = Duration::from_millis(500);

/// MAX30102 driver stub.
#[derive(Debug)]
pub struct Max30102Sensor {
    device_path: PathBuf,
    sample_window: Duration,
    bus: Option<File>,
}

impl Max30102Sensor {
    /// Sensor on `/dev/i2c-1`.
    pub fn new() -> Self {
        Max30102Sensor {
            device_path: PathBuf::from(format!("/dev/i2c-{I2C_BUS}")),
            sample_window: SAMPLE_WINDOW,
            bus: None,
        }
    }

    /// Uses a different bus device node.
    pub fn with_device_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.device_path = path.into();
        self
    }

    /// Overrides the simulated sampling time.
    pub fn with_sample_window(mut self, window: Duration) -> Self {
        self.sample_window = window;
        self
    }
}

impl Default for Max30102Sensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sensor for Max30102Sensor {
    async fn initialize(&mut self) -> SensorResult<()> {
        let bus = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.device_path)
            .await
            .map_err(|e| {
                SensorError::Unavailable(format!(
                    "I2C bus {} not available ({}): {e}",
                    I2C_BUS,
                    self.device_path.display()
                ))
            })?;

        info!(
            bus = I2C_BUS,
            address = %format!("0x{I2C_ADDRESS:02X}"),
            register = %format!("0x{PART_ID_REGISTER:02X}"),
            "I2C bus opened for MAX30102"
        );
        self.bus = Some(bus);
        Ok(())
    }

    async fn read(&mut self) -> SensorResult<VitalSample> {
        if self.bus.is_none() {
            return Err(SensorError::Read("sensor not initialized".to_string()));
        }

        tokio::time::sleep(self.sample_window).await;

        warn!("MAX30102 driver is a stub; returning a sample with no vitals");
        Ok(VitalSample::empty(Utc::now()))
    }

    async fn shutdown(&mut self) {
        if self.bus.take().is_some() {
            info!("I2C bus closed");
        }
    }

    fn is_available(&self) -> bool {
        self.bus.is_some()
    }

    fn name(&self) -> &'static str {
        "max30102"
    }
}
