//! # Domain Types
//!
//! Core domain types used throughout the HealthGuard edge node.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │  VitalSample    │──►│  VitalRecord    │   │  SyncAttempt    │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  (sensor out)   │   │  id (seq)       │   │  id (seq)       │       │
//! │  │  timestamp      │   │  uuid (v4)      │   │  timestamp      │       │
//! │  │  6 × Option<f64>│   │  sample fields  │   │  records_sent   │       │
//! │  │  ppg_raw        │   │  synced         │   │  status         │       │
//! │  └─────────────────┘   │  synced_at      │   │  duration_ms    │       │
//! │                        └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Patient      │   │      User       │   │   VitalStats    │       │
//! │  │  (one per node) │   │  admin | viewer │   │  avg/min/max    │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Persisted entities carry both:
//! - `id`: store-assigned sequence number, monotonic, local only
//! - `uuid`: UUID v4 assigned at creation, the identity the central server sees

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Vital Sample
// =============================================================================

/// One normalized reading as produced by a sensor.
///
/// Every vital is optional: the hardware driver may only deliver a subset,
/// and the simulator fills all six.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalSample {
    /// Capture time (UTC).
    pub timestamp: DateTime<Utc>,

    /// Heart rate in beats per minute.
    pub heart_rate: Option<f64>,

    /// Oxygen saturation in percent.
    pub spo2: Option<f64>,

    /// Body temperature in °C.
    pub temperature: Option<f64>,

    /// Systolic blood pressure in mmHg.
    pub blood_pressure_sys: Option<f64>,

    /// Diastolic blood pressure in mmHg.
    pub blood_pressure_dia: Option<f64>,

    /// Respiratory rate in breaths per minute.
    pub respiratory_rate: Option<f64>,

    /// Raw PPG waveform segment, oldest sample first.
    pub ppg_raw: Option<Vec<f64>>,
}

impl VitalSample {
    /// A sample with no vitals, stamped `timestamp`.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        VitalSample {
            timestamp,
            heart_rate: None,
            spo2: None,
            temperature: None,
            blood_pressure_sys: None,
            blood_pressure_dia: None,
            respiratory_rate: None,
            ppg_raw: None,
        }
    }

    /// Returns true if no vital was captured.
    pub fn is_empty(&self) -> bool {
        self.heart_rate.is_none()
            && self.spo2.is_none()
            && self.temperature.is_none()
            && self.blood_pressure_sys.is_none()
            && self.blood_pressure_dia.is_none()
            && self.respiratory_rate.is_none()
    }
}

// =============================================================================
// Vital Record
// =============================================================================

/// A persisted vital-sign reading.
///
/// ## Sync State
/// `synced` and `synced_at` are written together, once, by the sync engine.
/// A record never goes back to unsynced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalRecord {
    /// Store-assigned sequence number.
    pub id: i64,

    /// External identifier used by the central server for de-duplication.
    pub uuid: String,

    /// Patient this reading belongs to.
    pub patient_id: i64,

    pub timestamp: DateTime<Utc>,
    pub heart_rate: Option<f64>,
    pub spo2: Option<f64>,
    pub temperature: Option<f64>,
    pub blood_pressure_sys: Option<f64>,
    pub blood_pressure_dia: Option<f64>,
    pub respiratory_rate: Option<f64>,

    /// Raw waveform; not part of API listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ppg_raw: Option<Vec<f64>>,

    /// Whether the central server has acknowledged this reading.
    pub synced: bool,

    /// When the acknowledgement was committed.
    pub synced_at: Option<DateTime<Utc>>,
}

impl VitalRecord {
    /// Checks the `synced_at` ⇔ `synced` invariant.
    pub fn sync_state_consistent(&self) -> bool {
        self.synced == self.synced_at.is_some()
    }

    /// Returns this record without its waveform (for listings and streams).
    pub fn without_waveform(mut self) -> Self {
        self.ppg_raw = None;
        self
    }
}

// =============================================================================
// Sync Audit Trail
// =============================================================================

/// Outcome tag of one sync cycle.
///
/// A cycle with nothing to send is a `Success` with zero records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An append-only audit row written once per sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAttempt {
    pub id: i64,

    /// When the cycle finished.
    pub timestamp: DateTime<Utc>,

    /// Records confirmed delivered by this cycle.
    pub records_sent: i64,

    pub status: SyncStatus,

    pub error_message: Option<String>,

    /// Wall-clock duration of the whole cycle.
    pub duration_ms: i64,
}

/// The fields of a [`SyncAttempt`] known before it is persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncAttempt {
    pub records_sent: i64,
    pub status: SyncStatus,
    pub error_message: Option<String>,
    pub duration_ms: i64,
}

// =============================================================================
// Patient
// =============================================================================

/// The single patient profile stored on this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub uuid: String,
    pub first_name: String,
    pub last_name: String,
    /// ISO date, `YYYY-MM-DD`.
    pub date_of_birth: Option<String>,
    pub medical_id: Option<String>,
    /// ABO/Rh group, e.g. `O+`.
    pub blood_type: Option<String>,
    pub emergency_contact: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPatient {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<String>,
    pub medical_id: Option<String>,
    pub blood_type: Option<String>,
    pub emergency_contact: Option<String>,
    pub notes: Option<String>,
}

impl NewPatient {
    /// The profile created when a node starts collecting with an empty store.
    pub fn default_profile() -> Self {
        NewPatient {
            first_name: "Default".to_string(),
            last_name: "Patient".to_string(),
            date_of_birth: Some("1990-01-01".to_string()),
            medical_id: Some("MED-000001".to_string()),
            blood_type: Some("O+".to_string()),
            emergency_contact: Some("+1-555-0100".to_string()),
            notes: Some("Auto-created by HealthGuard edge node.".to_string()),
        }
    }
}

/// Partial update of the patient profile. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub medical_id: Option<String>,
    pub blood_type: Option<String>,
    pub emergency_contact: Option<String>,
    pub notes: Option<String>,
}

impl PatientUpdate {
    /// Returns true if the update would not change anything.
    pub fn is_empty(&self) -> bool {
        *self == PatientUpdate::default()
    }
}

// =============================================================================
// Users
// =============================================================================

/// Access level of a dashboard user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Can manage users.
    Admin,
    /// Read access plus patient edits and manual sync.
    #[default]
    Viewer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Viewer => "viewer",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "viewer" => Ok(UserRole::Viewer),
            _ => Err(crate::error::ValidationError::NotAllowed {
                field: "role".to_string(),
                allowed: vec!["admin".to_string(), "viewer".to_string()],
            }),
        }
    }
}

/// A local dashboard user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub uuid: String,
    pub username: String,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

// =============================================================================
// Queries & Aggregates
// =============================================================================

/// Aggregated statistics over a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalStats {
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub total_readings: i64,
    pub heart_rate_avg: Option<f64>,
    pub heart_rate_min: Option<f64>,
    pub heart_rate_max: Option<f64>,
    pub spo2_avg: Option<f64>,
    pub spo2_min: Option<f64>,
    pub spo2_max: Option<f64>,
    pub temperature_avg: Option<f64>,
    pub blood_pressure_sys_avg: Option<f64>,
    pub blood_pressure_dia_avg: Option<f64>,
    pub respiratory_rate_avg: Option<f64>,
}

/// Optional inclusive time range filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    /// Never less than 1, even for an empty listing.
    pub pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: u32, page_size: u32) -> Self {
        Page {
            items,
            total,
            page,
            page_size,
            pages: page_count(total, page_size),
        }
    }
}

/// Number of pages needed for `total` items, at least 1.
pub fn page_count(total: i64, page_size: u32) -> u32 {
    if page_size == 0 || total <= 0 {
        return 1;
    }
    let size = i64::from(page_size);
    let pages = (total + size - 1) / size;
    u32::try_from(pages).unwrap_or(u32::MAX).max(1)
}

/// Row offset of `page` (1-based).
pub fn page_offset(page: u32, page_size: u32) -> i64 {
    i64::from(page.saturating_sub(1)) * i64::from(page_size)
}

// =============================================================================
// Unit Tests
// =============================================================================
