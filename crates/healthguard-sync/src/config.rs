//! # Sync Configuration
//!
//! Settings for the uplink to the central server, and the retry policy
//! applied within one cycle.
//!
//! ## Configuration File Format
//! The `[sync]` section of the edge node's `edge.toml`:
//! ```toml
//! [sync]
//! central_server_url = "https://central.healthguard.example.com/api"
//! api_key = "change-me"
//! interval_secs = 300
//! batch_size = 100
//! ```
//!
//! ## Retry Schedule
//! ```text
//! attempt 1 ──fail──► sleep unit·base¹ ──► attempt 2 ──fail──► sleep unit·base²
//!           ──► attempt 3 ──fail──► give up (no sleep after the last attempt)
//!
//! defaults: base = 2, unit = 1 s  →  2 s, 4 s
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Path appended to `central_server_url` for batch uploads.
pub const UPLOAD_PATH: &str = "/sync/upload";

// =============================================================================
// Sync Settings
// =============================================================================

/// Central server connection and batching settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Base URL of the central server API.
    #[serde(default = "default_central_server_url")]
    pub central_server_url: String,

    /// Shared secret: bearer token and HMAC key.
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Seconds between periodic cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Maximum readings per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_central_server_url() -> String {
    "https://central.healthguard.example.com/api".to_string()
}

fn default_api_key() -> String {
    "change-me".to_string()
}

fn default_interval() -> u64 {
    300
}

fn default_batch_size() -> u32 {
    100
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            central_server_url: default_central_server_url(),
            api_key: default_api_key(),
            interval_secs: default_interval(),
            batch_size: default_batch_size(),
        }
    }
}

impl SyncSettings {
    /// Full upload endpoint.
    pub fn upload_url(&self) -> String {
        format!(
            "{}{}",
            self.central_server_url.trim_end_matches('/'),
            UPLOAD_PATH
        )
    }

    /// Periodic sync interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validates the settings.
    pub fn validate(&self) -> SyncResult<()> {
        let url = self.central_server_url.trim();
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SyncError::InvalidUrl(format!(
                "Central server URL must start with http:// or https://, got: {}",
                self.central_server_url
            )));
        }

        if self.batch_size == 0 {
            return Err(SyncError::InvalidConfig(
                "batch_size must be greater than 0".into(),
            ));
        }

        if self.interval_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "interval_secs must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Retry Policy
// =============================================================================

/// Delivery attempts and backoff within one sync cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per cycle, including the first.
    pub max_retries: u32,

    /// Exponent base of the backoff.
    pub backoff_base: u32,

    /// Time unit the backoff is expressed in.
    pub backoff_unit: Duration,

    /// Per-request timeout, independent of the backoff.
    pub request_timeout: Duration,
}

/// Total delivery attempts per cycle.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Backoff exponent base.
pub const DEFAULT_BACKOFF_BASE: u32 = 2;

/// Upload request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            backoff_unit: Duration::from_secs(1),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl RetryPolicy {
    /// Same schedule with a different time unit.
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Sleep after failed attempt `attempt` (1-based): `unit · base^attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit
            .saturating_mul(self.backoff_base.saturating_pow(attempt))
    }

    /// Whether another attempt follows `attempt`.
    pub fn has_next(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Validates the policy.
    pub fn validate(&self) -> SyncResult<()> {
        if self.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "max_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = SyncSettings::default();
        assert_eq!(settings.batch_size, 100);
        assert_eq!(settings.interval(), Duration::from_secs(300));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_upload_url() {
        let mut settings = SyncSettings::default();
        settings.central_server_url = "http://10.0.0.5:9000/api/".into();
        assert_eq!(settings.upload_url(), "http://10.0.0.5:9000/api/sync/upload");
    }

    #[test]
    fn test_validation() {
        let mut settings = SyncSettings::default();
        settings.central_server_url = "ftp://central".into();
        assert!(matches!(settings.validate(), Err(SyncError::InvalidUrl(_))));

        let mut settings = SyncSettings::default();
        settings.batch_size = 0;
        assert!(matches!(settings.validate(), Err(SyncError::InvalidConfig(_))));

        let mut settings = SyncSettings::default();
        settings.interval_secs = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let settings: SyncSettings = serde_json::from_str(r#"{"batch_size": 25}"#).unwrap();
        assert_eq!(settings.batch_size, 25);
        assert_eq!(settings.api_key, "change-me");
        assert_eq!(settings.interval_secs, 300);
    }

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert!(policy.has_next(2));
        assert!(!policy.has_next(3));

        let fast = policy.with_backoff_unit(Duration::from_millis(5));
        assert_eq!(fast.backoff(2), Duration::from_millis(20));
        assert_eq!(fast.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        assert!(policy.validate().is_err());
    }
}
