//! # healthguard-core: Pure Domain Model for the HealthGuard Edge Node
//!
//! This crate holds the types every other crate agrees on: vital-sign
//! samples and records, the sync audit trail, the patient profile and
//! local users. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     HealthGuard Edge Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              apps/edge-node (axum REST + SSE)                   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌──────────────────┐  ┌───────▼──────────┐  ┌──────────────────────┐  │
//! │  │ healthguard-     │  │ healthguard-sync │  │ healthguard-db       │  │
//! │  │ sensor           │  │ (sign + upload)  │  │ (SQLite repos)       │  │
//! │  └────────┬─────────┘  └────────┬─────────┘  └──────────┬───────────┘  │
//! │           │                     │                       │              │
//! │  ┌────────▼─────────────────────▼───────────────────────▼───────────┐  │
//! │  │               ★ healthguard-core (THIS CRATE) ★                  │  │
//! │  │   VitalSample  VitalRecord  SyncAttempt  Patient  User  Page<T>  │  │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS             │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation for the presentation layer

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Number of samples in a synthetic PPG waveform segment.
pub const PPG_SEGMENT_SAMPLES: usize = 50;

/// Largest page a client may request from the vitals listing.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Longest statistics window, in hours (30 days).
pub const MAX_STATS_HOURS: u32 = 720;

/// Rounds `value` to `decimals` decimal places.
///
/// ```rust
/// use healthguard_core::round_to;
///
/// assert_eq!(round_to(72.349, 1), 72.3);
/// assert_eq!(round_to(0.123456, 4), 0.1235);
/// ```
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
