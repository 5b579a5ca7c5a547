//! # HealthGuard Edge Node
//!
//! Local REST/SSE API and process lifecycle for a bedside monitoring node.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Edge Node Process                               │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  routes::auth  │  │ routes::vitals │  │  routes::system            ││
//! │  │                │  │                │  │                            ││
//! │  │ • login        │  │ • list         │  │ • status                   ││
//! │  │ • register     │  │ • latest       │  │ • sync (manual cycle)      ││
//! │  │ • me           │  │ • stats        │  │                            ││
//! │  │                │  │ • stream (SSE) │  │  routes::patient           ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                     EdgeNode (Arc, axum state)                    │  │
//! │  │                                                                   │  │
//! │  │  Database   CollectorHandle   SyncEngine   SchedulerHandle   JWT  │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod node;
pub mod routes;

pub use config::{ConfigError, EdgeConfig};
pub use error::{ApiError, ApiResult};
pub use node::{EdgeNode, NodeError};
pub use routes::{router, serve};
