//! # Bahi Sync Engine
//!
//! Push/pull reconciliation between the local store and a remote server.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          bahi-sync                                  │
//! │                                                                     │
//! │  transport  - SyncTransport port trait + wire page types            │
//! │  engine     - Syncer: push, pull, tombstones, full-run report       │
//! │  config     - TOML config (business, device, batch size)            │
//! │  progress   - Observation-only progress event stream                │
//! │  error      - SyncError / TransportError                            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let config = SyncConfig::load("bahi-sync.toml")?;
//! let syncer = Syncer::new(db, client, config)?;
//!
//! let report = syncer.run_full_sync().await;
//! if !report.is_clean() {
//!     // per-kind errors are in report.kinds
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod progress;
pub mod transport;

pub use config::{BusinessConfig, DeviceConfig, SyncConfig, SyncSettings};
pub use engine::{KindReport, SyncReport, Syncer};
pub use error::{SyncError, SyncResult, TransportError};
pub use progress::{ProgressSender, SyncDirection, SyncProgress};
pub use transport::{PullPage, PushOutcome, RemoteTombstone, SyncTransport, TombstonePage};
