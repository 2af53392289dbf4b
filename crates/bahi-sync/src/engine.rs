//! # Sync Engine
//!
//! Drives a full reconciliation run against a `SyncTransport`.
//!
//! ## Run Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  run_full_sync()                                                    │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  PUSH, dependency order (categories … transactions, tombstones      │
//! │  last): list dirty → batch → push_batch → mark acknowledged rows    │
//! │  synced (updated_at snapshot guard)                                 │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  PULL, same order: cursor → pull_since pages → typed upsert per     │
//! │  row → advance cursor AFTER the page is applied                     │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  TOMBSTONES: dedicated cursor, replay remote deletions              │
//! │                                                                     │
//! │  A failure in one entity kind is logged and recorded in the         │
//! │  report; the run continues with the next kind.                      │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Pulled rows are applied verbatim: the server's copy already carries
//! settled balances, so the ledger engine never runs during sync.

use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::progress::{ProgressSender, SyncDirection, SyncProgress};
use crate::transport::SyncTransport;
use bahi_core::EntityKind;
use bahi_db::Database;

// =============================================================================
// Reports
// =============================================================================

/// Outcome of one entity kind within a full sync run.
#[derive(Debug, Clone)]
pub struct KindReport {
    /// The entity kind this entry covers.
    pub kind: EntityKind,
    /// Rows the server acknowledged during push.
    pub pushed: usize,
    /// Rows applied locally during pull.
    pub pulled: usize,
    /// First error hit for this kind, if any. The rows counted above
    /// still went through.
    pub error: Option<String>,
}

/// Outcome of a full sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Per-kind outcomes, in push order.
    pub kinds: Vec<KindReport>,
    /// Remote deletions replayed locally.
    pub tombstones_applied: usize,
    /// Error from the tombstone pull, if any.
    pub tombstone_error: Option<String>,
}

impl SyncReport {
    /// Whether the run completed without any per-kind failures.
    pub fn is_clean(&self) -> bool {
        self.tombstone_error.is_none() && self.kinds.iter().all(|k| k.error.is_none())
    }

    /// Total rows acknowledged by the server across all kinds.
    pub fn total_pushed(&self) -> usize {
        self.kinds.iter().map(|k| k.pushed).sum()
    }

    /// Total rows applied locally across all kinds.
    pub fn total_pulled(&self) -> usize {
        self.kinds.iter().map(|k| k.pulled).sum()
    }
}

// =============================================================================
// Syncer
// =============================================================================

/// The sync engine. Generic over the transport so tests drive it with an
/// in-memory fake.
pub struct Syncer<T: SyncTransport> {
    db: Database,
    transport: T,
    config: SyncConfig,
    progress: ProgressSender,
}

impl<T: SyncTransport> Syncer<T> {
    /// Creates a syncer. The config must validate.
    pub fn new(db: Database, transport: T, config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Syncer {
            db,
            transport,
            config,
            progress: ProgressSender::disabled(),
        })
    }

    /// Attaches a progress event sender.
    pub fn with_progress(mut self, progress: ProgressSender) -> Self {
        self.progress = progress;
        self
    }

    /// Runs a complete push + pull + tombstone cycle.
    ///
    /// Never fails as a whole: each entity kind's outcome (including any
    /// error) lands in the report and the run moves on.
    pub async fn run_full_sync(&self) -> SyncReport {
        info!(
            business = %self.config.business.slug,
            device = %self.config.device.name,
            "Starting full sync"
        );

        let mut report = SyncReport {
            kinds: EntityKind::PUSH_ORDER
                .iter()
                .map(|&kind| KindReport {
                    kind,
                    pushed: 0,
                    pulled: 0,
                    error: None,
                })
                .collect(),
            ..Default::default()
        };

        // Push in dependency order so the server sees parents before the
        // rows that reference them.
        for entry in &mut report.kinds {
            match self.push_kind(entry.kind).await {
                Ok(pushed) => entry.pushed = pushed,
                Err(e) => {
                    error!(kind = entry.kind.as_str(), error = %e, "Push failed");
                    entry.error = Some(e.to_string());
                }
            }
        }

        // Pull in the same order, for the same reason. Tombstones come
        // down through their own stream, not as entity rows.
        for entry in &mut report.kinds {
            if entry.kind == EntityKind::DeletedRecord {
                continue;
            }
            match self.pull_kind(entry.kind).await {
                Ok(pulled) => entry.pulled = pulled,
                Err(e) => {
                    error!(kind = entry.kind.as_str(), error = %e, "Pull failed");
                    entry.error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        match self.pull_remote_tombstones().await {
            Ok(applied) => report.tombstones_applied = applied,
            Err(e) => {
                error!(error = %e, "Tombstone pull failed");
                report.tombstone_error = Some(e.to_string());
            }
        }

        info!(
            pushed = report.total_pushed(),
            pulled = report.total_pulled(),
            tombstones = report.tombstones_applied,
            clean = report.is_clean(),
            "Full sync finished"
        );
        report
    }

    /// Pushes the dirty rows of one entity kind.
    ///
    /// Returns the number of rows the server acknowledged. A row edited
    /// while its batch was in flight fails the snapshot guard and stays
    /// dirty for the next run.
    pub async fn push_kind(&self, kind: EntityKind) -> SyncResult<usize> {
        let sync_repo = self.db.sync();
        let rows = sync_repo
            .list_dirty_rows(kind, &self.config.business.slug)
            .await?;
        if rows.is_empty() {
            return Ok(0);
        }

        let total = rows.len();
        debug!(kind = kind.as_str(), rows = total, "Pushing dirty rows");

        let mut acknowledged = 0;
        let mut handled = 0;
        for chunk in rows.chunks(self.config.settings.batch_size) {
            let payloads: Vec<serde_json::Value> =
                chunk.iter().map(|row| row.payload.clone()).collect();
            let outcome = self.transport.push_batch(kind, &payloads).await?;

            for row in chunk {
                if !outcome.acknowledged.iter().any(|slug| slug == &row.slug) {
                    warn!(
                        kind = kind.as_str(),
                        slug = %row.slug,
                        "Server did not acknowledge row, staying dirty"
                    );
                    continue;
                }
                acknowledged += 1;
                if !sync_repo.mark_row_synced(kind, row).await? {
                    debug!(
                        kind = kind.as_str(),
                        slug = %row.slug,
                        "Row changed during push, newer revision stays dirty"
                    );
                }
            }

            handled += chunk.len();
            self.progress.emit(SyncProgress {
                label: kind.display_name().to_string(),
                direction: SyncDirection::Push,
                completed: handled,
                total,
            });
        }

        Ok(acknowledged)
    }

    /// Pulls one entity kind to the local store.
    ///
    /// Pages until the server reports the stream exhausted. The cursor
    /// advances only after a page is fully applied, so an interrupted
    /// pull replays that page; upserts make the replay harmless.
    pub async fn pull_kind(&self, kind: EntityKind) -> SyncResult<usize> {
        let sync_repo = self.db.sync();
        let cursors = self.db.cursors();

        let mut cursor = cursors.get(kind).await?;
        let mut pulled = 0;

        loop {
            let page = self.transport.pull_since(kind, cursor.as_deref()).await?;
            let page_was_empty = page.rows.is_empty();

            for payload in &page.rows {
                sync_repo.apply_remote_row(kind, payload).await?;
                pulled += 1;
            }

            if pulled > 0 {
                self.progress.emit(SyncProgress {
                    label: kind.display_name().to_string(),
                    direction: SyncDirection::Pull,
                    completed: pulled,
                    total: pulled,
                });
            }

            match page.next_cursor {
                Some(next) => {
                    cursors.set(kind, &next).await?;
                    cursor = Some(next);
                    // An empty page that still carries a cursor means
                    // "caught up"; do not spin on it.
                    if page_was_empty {
                        break;
                    }
                }
                None => break,
            }
        }

        if pulled > 0 {
            debug!(kind = kind.as_str(), rows = pulled, "Pulled remote rows");
        }
        Ok(pulled)
    }

    /// Pulls and replays remote deletions.
    pub async fn pull_remote_tombstones(&self) -> SyncResult<usize> {
        let sync_repo = self.db.sync();
        let cursors = self.db.cursors();

        let mut cursor = cursors.get_tombstone().await?;
        let mut applied = 0;

        loop {
            let page = self.transport.pull_tombstones(cursor.as_deref()).await?;
            let page_was_empty = page.tombstones.is_empty();

            for tombstone in &page.tombstones {
                sync_repo
                    .apply_tombstone(tombstone.entity_kind, &tombstone.record_slug)
                    .await?;
                applied += 1;
            }

            if applied > 0 {
                self.progress.emit(SyncProgress {
                    label: "Deleted records".to_string(),
                    direction: SyncDirection::Pull,
                    completed: applied,
                    total: applied,
                });
            }

            match page.next_cursor {
                Some(next) => {
                    cursors.set_tombstone(&next).await?;
                    cursor = Some(next);
                    if page_was_empty {
                        break;
                    }
                }
                None => break,
            }
        }

        Ok(applied)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
