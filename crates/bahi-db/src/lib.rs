//! # Bahi Database Layer
//!
//! SQLite persistence and the Ledger Mutation Engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                           bahi-db                                   │
//! │                                                                     │
//! │  pool        - DbConfig builder, Database handle, WAL setup         │
//! │  migrations  - Embedded SQL migrations                              │
//! │  repository  - Typed CRUD + dirty listing per entity family,        │
//! │                plus the kind-dispatched sync gateway                │
//! │  ledger      - Commit / update / delete under the commit lock;      │
//! │                the ONLY writer of balances, stock and avg prices    │
//! │  error       - DbError (wraps sqlx and bahi-core errors)            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let db = Database::new(DbConfig::new("./bahi.db")).await?;
//!
//! let mut sale = Transaction::new("BIZ1", TransactionType::Sale);
//! // ...fill in party, payment method, lines...
//! let sale = db.ledger().commit(sale).await?;
//! ```

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use ledger::LedgerEngine;
pub use pool::{Database, DbConfig};
pub use repository::sync::{SyncRepository, SyncRow};
