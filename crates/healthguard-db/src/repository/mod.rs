//! # Repository Module
//!
//! Database repository implementations for the edge node.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  Caller (collector / sync engine / handler)                            │
//! │       │                                                                 │
//! │       │  db.vitals().fetch_unsynced(100)                               │
//! │       ▼                                                                 │
//! │  VitalRepository                                                       │
//! │  ├── insert(&self, patient_id, sample)                                 │
//! │  ├── fetch_unsynced(&self, limit)                                      │
//! │  ├── mark_synced(&self, ids)                                           │
//! │  └── list / latest / stats / counts                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`vitals::VitalRepository`] - Readings, sync-state transitions, aggregates
//! - [`sync_log::SyncLogRepository`] - Append-only sync audit trail
//! - [`patients::PatientRepository`] - The node's patient profile
//! - [`users::UserRepository`] - Dashboard users

pub mod patients;
pub mod sync_log;
pub mod users;
pub mod vitals;

use chrono::{DateTime, SecondsFormat, Utc};

/// Formats a timestamp the way every table stores it.
///
/// Fixed-width microsecond RFC 3339 in UTC, so string comparison in SQL
/// orders the same as time.
pub fn db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}
