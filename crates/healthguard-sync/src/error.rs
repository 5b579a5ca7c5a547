//! # Sync Error Types
//!
//! Error types for sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Payload             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  ClientSetup    │  │  SerializationFailed    │ │
//! │  │  MissingDeviceId│  │  RequestFailed  │  │  SigningFailed          │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Database     │  │    Delivery     │  │      Internal           │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  DatabaseError  │  │  Rejected       │  │  TaskFailed             │ │
//! │  │                 │  │  RetriesExhaust.│  │                         │ │
//! │  │                 │  │  Cancelled      │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The `Display` text of an error is what lands in `sync_log.error_message`
//! for a failed cycle.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible sync failures.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID (sent with every batch).
    #[error("Device ID not configured")]
    MissingDeviceId,

    /// Invalid central server URL.
    #[error("Invalid central server URL: {0}")]
    InvalidUrl(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// The request never produced a response (DNS, connect, reset).
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The request exceeded the client timeout.
    #[error("Request timed out")]
    Timeout,

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// Failed to serialize the batch.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Failed to compute the batch signature.
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Database query failed.
    #[error("Database error: {0}")]
    DatabaseError(String),

    // =========================================================================
    // Delivery Errors
    // =========================================================================
    /// The central server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Every delivery attempt of a cycle failed.
    #[error("all retries exhausted")]
    RetriesExhausted,

    /// Shutdown interrupted the wait before the next attempt.
    #[error("cancelled while waiting to retry")]
    Cancelled,

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// A background task panicked or was aborted.
    #[error("Sync task failed: {0}")]
    TaskFailed(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<healthguard_db::DbError> for SyncError {
    fn from(err: healthguard_db::DbError) -> Self {
        SyncError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::SerializationFailed(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_builder() {
            SyncError::ClientSetup(err.to_string())
        } else {
            SyncError::RequestFailed(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns true if another delivery attempt may succeed.
    ///
    /// ## Retryable Errors
    /// - Network failures and timeouts
    /// - Non-success HTTP statuses
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Payload and database errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::RequestFailed(_) | SyncError::Timeout | SyncError::Rejected { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::RequestFailed("connection refused".into()).is_retryable());
        assert!(SyncError::Timeout.is_retryable());
        assert!(SyncError::Rejected {
            status: 503,
            body: String::new()
        }
        .is_retryable());

        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::DatabaseError("locked".into()).is_retryable());
        assert!(!SyncError::RetriesExhausted.is_retryable());
        assert!(!SyncError::Cancelled.is_retryable());
        assert!(!SyncError::ClientSetup("no TLS backend".into()).is_retryable());
    }

    #[test]
    fn test_exhausted_message() {
        assert_eq!(SyncError::RetriesExhausted.to_string(), "all retries exhausted");
    }

    #[test]
    fn test_db_error_conversion() {
        let err: SyncError = healthguard_db::DbError::not_found("VitalRecord", "7").into();
        assert!(matches!(err, SyncError::DatabaseError(_)));
    }
}
