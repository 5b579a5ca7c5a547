//! # Edge Node Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     DEVICE_ID=edge-node-042                                            │
//! │     CENTRAL_SERVER_URL=https://central.example.com/api                 │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     $HEALTHGUARD_CONFIG, or                                            │
//! │     ~/.config/healthguard-edge/edge.toml (Linux)                       │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [device]
//! id = "edge-node-001"
//!
//! [database]
//! path = "./healthguard.db"
//!
//! [sensor]
//! mock_mode = true
//! interval_secs = 5
//!
//! [sync]
//! central_server_url = "https://central.healthguard.example.com/api"
//! api_key = "change-me"
//! interval_secs = 300
//! batch_size = 100
//!
//! [auth]
//! secret_key = "change-this-to-a-random-secret-key"
//! access_token_expire_minutes = 480
//! default_admin_password = "admin"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! static_dir = "./static"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use healthguard_sync::{SyncError, SyncSettings};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "HEALTHGUARD_CONFIG";

/// Config file name inside the platform config directory.
pub const CONFIG_FILE_NAME: &str = "edge.toml";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Sent with every batch as `device_id` and `X-Device-ID`.
    #[serde(default = "default_device_id")]
    pub id: String,
}

fn default_device_id() -> String {
    "edge-node-001".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            id: default_device_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "./healthguard.db".to_string()
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorSettings {
    /// Use the simulator instead of the MAX30102.
    #[serde(default = "default_mock_mode")]
    pub mock_mode: bool,

    /// Seconds between samples.
    #[serde(default = "default_sensor_interval")]
    pub interval_secs: u64,
}

fn default_mock_mode() -> bool {
    true
}

fn default_sensor_interval() -> u64 {
    5
}

impl Default for SensorSettings {
    fn default() -> Self {
        SensorSettings {
            mock_mode: default_mock_mode(),
            interval_secs: default_sensor_interval(),
        }
    }
}

impl SensorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSettings {
    /// HMAC secret for dashboard JWTs.
    #[serde(default = "default_secret_key")]
    pub secret_key: String,

    #[serde(default = "default_token_expiry")]
    pub access_token_expire_minutes: i64,

    /// Password of the `admin` account created on first start.
    #[serde(default = "default_admin_password")]
    pub default_admin_password: String,
}

fn default_secret_key() -> String {
    "change-this-to-a-random-secret-key".to_string()
}

fn default_token_expiry() -> i64 {
    480
}

fn default_admin_password() -> String {
    "admin".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            secret_key: default_secret_key(),
            access_token_expire_minutes: default_token_expiry(),
            default_admin_password: default_admin_password(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Built dashboard; served with SPA fallback when present.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("./static")
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

impl ServerSettings {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Edge Config
// =============================================================================

/// Complete edge node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeConfig {
    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub sensor: SensorSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub auth: AuthSettings,

    #[serde(default)]
    pub server: ServerSettings,
}

impl EdgeConfig {
    /// Loads configuration: defaults, then the TOML file (if any), then
    /// environment overrides, then validation.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading edge config from file");
                config = Self::from_file(&path)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML file without overrides or validation.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// `edge.toml` in the platform config directory.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "healthguard", "healthguard-edge")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.id.trim().is_empty() {
            return Err(ConfigError::MissingRequired("device.id".into()));
        }
        if self.sensor.interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "sensor.interval_secs must be greater than 0".into(),
            ));
        }
        if self.auth.secret_key.is_empty() {
            return Err(ConfigError::MissingRequired("auth.secret_key".into()));
        }
        if self.auth.access_token_expire_minutes <= 0 {
            return Err(ConfigError::InvalidValue(
                "auth.access_token_expire_minutes must be positive".into(),
            ));
        }
        self.sync.validate()?;
        Ok(())
    }

    /// Applies process environment overrides.
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (env-style keys).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(id) = lookup("DEVICE_ID") {
            debug!(device_id = %id, "Overriding device ID from environment");
            self.device.id = id;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.path = strip_sqlite_scheme(&url).to_string();
        }
        if let Some(mock) = lookup("MOCK_MODE") {
            self.sensor.mock_mode = parse_bool("MOCK_MODE", &mock)?;
        }
        if let Some(secs) = lookup("SENSOR_INTERVAL_SECONDS") {
            self.sensor.interval_secs = parse_number("SENSOR_INTERVAL_SECONDS", &secs)?;
        }
        if let Some(url) = lookup("CENTRAL_SERVER_URL") {
            debug!(url = %url, "Overriding central server URL from environment");
            self.sync.central_server_url = url;
        }
        if let Some(key) = lookup("CENTRAL_API_KEY") {
            self.sync.api_key = key;
        }
        if let Some(secs) = lookup("SYNC_INTERVAL_SECONDS") {
            self.sync.interval_secs = parse_number("SYNC_INTERVAL_SECONDS", &secs)?;
        }
        if let Some(size) = lookup("SYNC_BATCH_SIZE") {
            self.sync.batch_size = parse_number("SYNC_BATCH_SIZE", &size)?;
        }
        if let Some(secret) = lookup("SECRET_KEY") {
            self.auth.secret_key = secret;
        }
        if let Some(minutes) = lookup("ACCESS_TOKEN_EXPIRE_MINUTES") {
            self.auth.access_token_expire_minutes =
                parse_number("ACCESS_TOKEN_EXPIRE_MINUTES", &minutes)?;
        }
        if let Some(password) = lookup("DEFAULT_ADMIN_PASSWORD") {
            self.auth.default_admin_password = password;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_number("PORT", &port)?;
        }
        if let Some(dir) = lookup("STATIC_DIR") {
            self.server.static_dir = PathBuf::from(dir);
        }
        Ok(())
    }
}

/// Accepts SQLAlchemy/sqlx style URLs as well as bare paths.
fn strip_sqlite_scheme(url: &str) -> &str {
    ["sqlite+aiosqlite:///", "sqlite:///", "sqlite://", "sqlite:"]
        .iter()
        .find_map(|prefix| url.strip_prefix(prefix))
        .unwrap_or(url)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key.to_string()))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EdgeConfig::default();
        assert_eq!(config.device.id, "edge-node-001");
        assert_eq!(config.database.path, "./healthguard.db");
        assert!(config.sensor.mock_mode);
        assert_eq!(config.sensor.interval(), Duration::from_secs(5));
        assert_eq!(config.sync.interval_secs, 300);
        assert_eq!(config.auth.access_token_expire_minutes, 480);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EdgeConfig::default();
        config
            .apply_overrides(env(&[
                ("DEVICE_ID", "edge-node-042"),
                ("DATABASE_URL", "sqlite+aiosqlite:///./data/hg.db"),
                ("MOCK_MODE", "false"),
                ("SYNC_BATCH_SIZE", "25"),
                ("PORT", "9000"),
            ]))
            .unwrap();

        assert_eq!(config.device.id, "edge-node-042");
        assert_eq!(config.database.path, "./data/hg.db");
        assert!(!config.sensor.mock_mode);
        assert_eq!(config.sync.batch_size, 25);
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_bad_env_value_rejected() {
        let mut config = EdgeConfig::default();
        let err = config
            .apply_overrides(env(&[("SYNC_INTERVAL_SECONDS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue(key) if key == "SYNC_INTERVAL_SECONDS"));
    }

    #[test]
    fn test_partial_toml() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [device]
            id = "ward-3"

            [sync]
            batch_size = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.device.id, "ward-3");
        assert_eq!(config.sync.batch_size, 10);
        assert_eq!(config.sync.api_key, "change-me");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_validation() {
        let mut config = EdgeConfig::default();
        config.device.id = " ".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRequired(_))
        ));

        let mut config = EdgeConfig::default();
        config.sync.central_server_url = "central.local".into();
        assert!(matches!(config.validate(), Err(ConfigError::Sync(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("healthguard-edge-{}.toml", std::process::id()));
        std::fs::write(&path, "[sensor]\ninterval_secs = 2\n").unwrap();

        let config = EdgeConfig::from_file(&path).unwrap();
        assert_eq!(config.sensor.interval_secs, 2);

        let _ = std::fs::remove_file(&path);
        assert!(matches!(
            EdgeConfig::from_file(&path),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_sqlite_scheme_stripped() {
        assert_eq!(strip_sqlite_scheme("sqlite:///var/hg.db"), "var/hg.db");
        assert_eq!(strip_sqlite_scheme("sqlite::memory:"), ":memory:");
        assert_eq!(strip_sqlite_scheme("/var/hg.db"), "/var/hg.db");
    }
}
