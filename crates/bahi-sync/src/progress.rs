//! # Sync Progress Events
//!
//! Observation-only progress stream for UIs. Dropping the receiver, or
//! never attaching one, changes nothing about the sync itself.

use tokio::sync::mpsc;

/// Which way rows are moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDirection {
    /// Local dirty rows going to the server.
    Push,
    /// Server rows coming down.
    Pull,
}

/// One progress tick.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    /// What is being moved, e.g. "Parties" or "Deleted records".
    pub label: String,
    /// Direction of travel.
    pub direction: SyncDirection,
    /// Rows handled so far for this label.
    pub completed: usize,
    /// Total rows for this label. For pulls the total is unknown until
    /// the stream is exhausted, so this tracks `completed`.
    pub total: usize,
}

/// Progress event sender, tolerant of nobody listening.
#[derive(Debug, Clone, Default)]
pub struct ProgressSender {
    tx: Option<mpsc::UnboundedSender<SyncProgress>>,
}

impl ProgressSender {
    /// A sender that discards every event.
    pub fn disabled() -> Self {
        ProgressSender { tx: None }
    }

    /// Creates a connected sender and its receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SyncProgress>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressSender { tx: Some(tx) }, rx)
    }

    /// Emits one tick. A closed or absent receiver is silently ignored.
    pub fn emit(&self, progress: SyncProgress) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(progress);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
