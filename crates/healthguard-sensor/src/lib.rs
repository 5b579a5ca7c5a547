//! # healthguard-sensor: Sensors and the Collection Loop
//!
//! Produces normalized [`VitalSample`](healthguard_core::VitalSample)s and
//! persists them on a fixed cadence.
//!
//! ## Collection Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Collection Loop                                   │
//! │                                                                         │
//! │   create_sensor(kind) ──► initialize() ──► ensure default patient      │
//! │                              │ (error: start fails)                    │
//! │                              ▼                                          │
//! │   ┌──────────────────────────────────────────────────────────────┐     │
//! │   │  loop                                                        │     │
//! │   │    read()  ──► vitals().insert(..)  ──► broadcast record     │     │
//! │   │      │ error: log, keep going                                │     │
//! │   │    select! { sleep(interval), cancelled → break }            │     │
//! │   └──────────────────────────────────────────────────────────────┘     │
//! │                              │                                          │
//! │   CollectorHandle::stop() ───┘ cancel → join → shutdown() once          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`sensor`] - The [`Sensor`] trait and factory
//! - [`mock`] - Simulated vitals generator
//! - [`hardware`] - MAX30102 driver stub
//! - [`collector`] - Background loop and its handle
//! - [`error`] - Sensor error types

pub mod collector;
pub mod error;
pub mod hardware;
pub mod mock;
pub mod sensor;

pub use collector::{CollectorHandle, DEFAULT_SENSOR_INTERVAL};
pub use error::{SensorError, SensorResult};
pub use hardware::Max30102Sensor;
pub use mock::MockSensor;
pub use sensor::{create_sensor, Sensor, SensorKind};
