//! # healthguard-db: Database Layer for the HealthGuard Edge Node
//!
//! This crate provides database access for the edge node.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     HealthGuard Edge Data Flow                          │
//! │                                                                         │
//! │  Collection loop        Sync engine          HTTP handlers             │
//! │  (insert readings)      (select/mark/audit)  (list/stats/patient)      │
//! │       │                      │                     │                    │
//! │       ▼                      ▼                     ▼                    │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  healthguard-db (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ VitalRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SyncLogRepo   │    │ 001_initial_ │  │   │
//! │  │   │ WAL mode      │    │ PatientRepo   │    │ schema.sql   │  │   │
//! │  │   │               │    │ UserRepo      │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ./healthguard.db                                              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (vitals, sync log, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use healthguard_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./healthguard.db")).await?;
//!
//! let batch = db.vitals().fetch_unsynced(100).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::patients::PatientRepository;
pub use repository::sync_log::SyncLogRepository;
pub use repository::users::UserRepository;
pub use repository::vitals::VitalRepository;
