//! # healthguard-sync: Uplink to the Central Server
//!
//! Forwards unsynced vital readings in signed batches, retries with
//! exponential backoff, and keeps an audit row per cycle.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Pipeline                                    │
//! │                                                                         │
//! │  ┌────────────────┐   sync_cycle()   ┌──────────────────────────────┐  │
//! │  │ SchedulerHandle│ ───────────────► │          SyncEngine          │  │
//! │  │ (every N secs) │                  │                              │  │
//! │  └────────────────┘                  │  VitalRepository (select,    │  │
//! │  ┌────────────────┐   sync_cycle()   │    mark synced)              │  │
//! │  │ POST /api/     │ ───────────────► │  SyncPayload + HMAC          │  │
//! │  │  system/sync   │                  │  RetryPolicy                 │  │
//! │  └────────────────┘                  │  SyncLogRepository (audit)   │  │
//! │                                      └──────────────┬───────────────┘  │
//! │                                                     │                   │
//! │                                      ┌──────────────▼───────────────┐  │
//! │                                      │  dyn BatchUploader           │  │
//! │                                      │  HttpUploader (reqwest)      │  │
//! │                                      └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//! - [`config`]: `SyncSettings` and `RetryPolicy`
//! - [`error`]: `SyncError` and `SyncResult`
//! - [`payload`]: batch wire format and signing
//! - [`uploader`]: `BatchUploader` trait and the HTTP implementation
//! - [`engine`]: the sync cycle
//! - [`scheduler`]: periodic task

pub mod config;
pub mod engine;
pub mod error;
pub mod payload;
pub mod scheduler;
pub mod uploader;

pub use config::{RetryPolicy, SyncSettings};
pub use engine::{DeliveryAttempt, SyncEngine, SyncReport};
pub use error::{SyncError, SyncResult};
pub use payload::{ReadingPayload, SignedBatch, SyncPayload};
pub use scheduler::SchedulerHandle;
pub use uploader::{BatchUploader, DeliveryOutcome, HttpUploader};
