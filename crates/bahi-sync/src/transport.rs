//! # Sync Transport Port
//!
//! The contract a remote server client must fulfil for the engine to sync
//! against it.
//!
//! ## Shape Of The Protocol
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  PUSH   push_batch(kind, rows)      → slugs the server accepted     │
//! │                                                                     │
//! │  PULL   pull_since(kind, cursor)    → page of rows + next cursor    │
//! │         pull_tombstones(cursor)     → page of deletions + cursor    │
//! │                                                                     │
//! │  Cursors are OPAQUE server-issued strings. The engine stores and    │
//! │  echoes them, never inspects them.                                  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows cross this boundary as `serde_json::Value`; the typed world ends
//! at the database gateway. That keeps this trait small enough to mock in
//! a handful of lines.

use async_trait::async_trait;

use crate::error::TransportError;
use bahi_core::EntityKind;

/// Result of pushing one batch.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    /// Slugs the server durably accepted. Only these rows get their local
    /// dirty flag cleared; anything missing stays dirty for the next run.
    pub acknowledged: Vec<String>,
}

/// One page of pulled entity rows.
#[derive(Debug, Clone)]
pub struct PullPage {
    /// Full entity payloads, newest-last within the page.
    pub rows: Vec<serde_json::Value>,
    /// Cursor for the next page. `None` means the stream is exhausted.
    pub next_cursor: Option<String>,
}

/// A deletion pulled from another device.
#[derive(Debug, Clone)]
pub struct RemoteTombstone {
    /// What kind of entity was deleted.
    pub entity_kind: EntityKind,
    /// Slug of the deleted row.
    pub record_slug: String,
}

/// One page of pulled tombstones.
#[derive(Debug, Clone)]
pub struct TombstonePage {
    /// Deletions to replay locally, oldest-first.
    pub tombstones: Vec<RemoteTombstone>,
    /// Cursor for the next page. `None` means the stream is exhausted.
    pub next_cursor: Option<String>,
}

/// The remote server as the sync engine sees it.
///
/// Implementations wrap whatever wire protocol the deployment uses. All
/// methods must be safe to retry: the engine replays pushes for rows that
/// were not acknowledged and replays pull pages after a crash.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Pushes one batch of dirty rows of a single kind.
    async fn push_batch(
        &self,
        kind: EntityKind,
        rows: &[serde_json::Value],
    ) -> Result<PushOutcome, TransportError>;

    /// Pulls rows of one kind changed since the cursor.
    ///
    /// `None` asks for everything the server has for this business.
    async fn pull_since(
        &self,
        kind: EntityKind,
        cursor: Option<&str>,
    ) -> Result<PullPage, TransportError>;

    /// Pulls tombstones recorded since the cursor.
    async fn pull_tombstones(
        &self,
        cursor: Option<&str>,
    ) -> Result<TombstonePage, TransportError>;
}
