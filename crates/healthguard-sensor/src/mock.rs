//! # Simulated Sensor
//!
//! Generates plausible, drifting vital signs without hardware.
//!
//! ## Signal Model
//! ```text
//! value = baseline
//!       + wave_amp · sin(2π · tick / period)     slow physiological drift
//!       + N(0, noise_amp)                        measurement noise
//!       + anomaly_offset   (shared 5 % coin)     simulated episode
//!
//! then clamp(min, max) and round to 1 decimal
//! ```
//!
//! The anomaly coin is flipped once per tick and applies to every vital,
//! so an episode shows up as a correlated excursion (tachycardia with a
//! SpO2 dip and a blood-pressure spike).

use std::f64::consts::PI;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use tracing::debug;

use healthguard_core::{round_to, VitalSample, PPG_SEGMENT_SAMPLES};

use crate::error::{SensorError, SensorResult};
use crate::sensor::Sensor;

/// Probability that a tick is an anomaly.
pub const DEFAULT_ANOMALY_CHANCE: f64 = 0.05;

const INIT_DELAY: Duration = Duration::from_millis(100);

/// Generation parameters for one vital.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VitalProfile {
    pub baseline: f64,
    pub noise_amp: f64,
    pub wave_amp: f64,
    /// Drift period in ticks.
    pub period: f64,
    pub anomaly_offset: f64,
    pub min: f64,
    pub max: f64,
}

impl VitalProfile {
    const fn new(
        baseline: f64,
        noise_amp: f64,
        wave_amp: f64,
        period: f64,
        anomaly_offset: f64,
        min: f64,
        max: f64,
    ) -> Self {
        VitalProfile {
            baseline,
            noise_amp,
            wave_amp,
            period,
            anomaly_offset,
            min,
            max,
        }
    }
}

/// Heart rate. The anomaly offset is replaced per episode by −20 or +30.
pub const HEART_RATE: VitalProfile = VitalProfile::new(72.0, 3.0, 5.0, 60.0, 30.0, 40.0, 180.0);
pub const SPO2: VitalProfile = VitalProfile::new(97.5, 0.3, 0.8, 90.0, -5.0, 85.0, 100.0);
pub const TEMPERATURE: VitalProfile = VitalProfile::new(36.6, 0.05, 0.2, 120.0, 1.5, 35.0, 42.0);
pub const SYSTOLIC: VitalProfile = VitalProfile::new(120.0, 2.0, 4.0, 80.0, 25.0, 80.0, 200.0);
pub const DIASTOLIC: VitalProfile = VitalProfile::new(78.0, 1.5, 3.0, 80.0, 15.0, 50.0, 130.0);
pub const RESPIRATORY: VitalProfile = VitalProfile::new(16.0, 1.0, 2.0, 100.0, 8.0, 8.0, 35.0);

const HEART_RATE_ANOMALY_OFFSETS: [f64; 2] = [-20.0, 30.0];

// =============================================================================
// Mock Sensor
// =============================================================================

/// Simulated multi-vital sensor.
#[derive(Debug)]
pub struct MockSensor {
    rng: StdRng,
    tick: u64,
    anomaly_chance: f64,
    available: bool,
}

impl MockSensor {
    /// A sensor seeded from OS entropy.
    pub fn new() -> Self {
        MockSensor {
            rng: StdRng::from_entropy(),
            tick: 0,
            anomaly_chance: DEFAULT_ANOMALY_CHANCE,
            available: false,
        }
    }

    /// A deterministic sensor for reproducible scenarios.
    pub fn seeded(seed: u64) -> Self {
        MockSensor {
            rng: StdRng::seed_from_u64(seed),
            ..MockSensor::new()
        }
    }

    /// Overrides the per-tick anomaly probability (clamped to `[0, 1]`).
    pub fn with_anomaly_chance(mut self, chance: f64) -> Self {
        self.anomaly_chance = chance.clamp(0.0, 1.0);
        self
    }

    /// Number of samples produced so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn gauss(&mut self, std_dev: f64) -> f64 {
        match Normal::new(0.0, std_dev) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => 0.0,
        }
    }

    fn vital(&mut self, profile: &VitalProfile, anomaly: Option<f64>) -> f64 {
        let t = self.tick as f64;
        let mut value = profile.baseline;
        value += profile.wave_amp * (2.0 * PI * t / profile.period).sin();
        value += self.gauss(profile.noise_amp);
        if let Some(offset) = anomaly {
            value += offset;
        }
        round_to(value.clamp(profile.min, profile.max), 1)
    }

    /// Synthetic PPG segment: systolic pulse plus dicrotic notch per beat.
    fn ppg_waveform(&mut self, heart_rate: f64) -> Vec<f64> {
        let freq = heart_rate / 60.0;
        let beat = 1.0 / freq;

        (0..PPG_SEGMENT_SAMPLES)
            .map(|i| {
                let t = i as f64 / PPG_SEGMENT_SAMPLES as f64;
                let phase = (t % beat) * freq;
                let pulse = (-(phase - 0.3).powi(2) / 0.01).exp();
                let notch = 0.3 * (-(phase - 0.55).powi(2) / 0.005).exp();
                round_to(pulse + notch + self.gauss(0.02), 4)
            })
            .collect()
    }
}

impl Default for MockSensor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sensor for MockSensor {
    async fn initialize(&mut self) -> SensorResult<()> {
        tokio::time::sleep(INIT_DELAY).await;
        self.available = true;
        debug!("Simulated sensor initialized");
        Ok(())
    }

    async fn read(&mut self) -> SensorResult<VitalSample> {
        if !self.available {
            return Err(SensorError::Read("sensor not initialized".to_string()));
        }

        self.tick += 1;
        let anomaly = self.rng.gen::<f64>() < self.anomaly_chance;
        let hr_offset = HEART_RATE_ANOMALY_OFFSETS[usize::from(self.rng.gen_bool(0.5))];

        let offset = |profile: &VitalProfile| anomaly.then_some(profile.anomaly_offset);

        let heart_rate = self.vital(&HEART_RATE, anomaly.then_some(hr_offset));
        let spo2 = self.vital(&SPO2, offset(&SPO2));
        let temperature = self.vital(&TEMPERATURE, offset(&TEMPERATURE));
        let systolic = self.vital(&SYSTOLIC, offset(&SYSTOLIC));
        let diastolic = self.vital(&DIASTOLIC, offset(&DIASTOLIC));
        let respiratory = self.vital(&RESPIRATORY, offset(&RESPIRATORY));
        let ppg_raw = self.ppg_waveform(heart_rate);

        if anomaly {
            debug!(tick = self.tick, heart_rate, spo2, "Simulated anomaly");
        }

        Ok(VitalSample {
            timestamp: Utc::now(),
            heart_rate: Some(heart_rate),
            spo2: Some(spo2),
            temperature: Some(temperature),
            blood_pressure_sys: Some(systolic),
            blood_pressure_dia: Some(diastolic),
            respiratory_rate: Some(respiratory),
            ppg_raw: Some(ppg_raw),
        })
    }

    async fn shutdown(&mut self) {
        self.available = false;
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
