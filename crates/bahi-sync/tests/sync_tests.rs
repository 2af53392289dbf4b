//! Integration tests for the sync engine.
//!
//! A mock transport plays the server: it records what was pushed, serves
//! scripted pull pages, and can be told to reject rows, fail whole kinds,
//! or edit a local row while a push is in flight.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use bahi_core::{DeletedRecord, EntityKind, Party, PartyRole, Product, SyncStatus, Warehouse};
use bahi_db::{Database, DbConfig};
use bahi_sync::{
    ProgressSender, PullPage, PushOutcome, RemoteTombstone, SyncConfig, SyncDirection,
    SyncTransport, Syncer, TombstonePage, TransportError,
};

const BIZ: &str = "BIZ1";

// =============================================================================
// Mock transport
// =============================================================================

#[derive(Default)]
struct MockState {
    /// Everything push_batch received, per kind.
    pushed: HashMap<EntityKind, Vec<serde_json::Value>>,
    /// Slugs the server refuses to acknowledge.
    unacknowledged: HashSet<String>,
    /// Kinds whose requests fail outright.
    failing_kinds: HashSet<EntityKind>,
    /// Scripted pull pages, consumed front to back.
    pull_pages: HashMap<EntityKind, VecDeque<PullPage>>,
    /// Scripted tombstone pages.
    tombstone_pages: VecDeque<TombstonePage>,
    /// Cursors the engine presented to pull_since, per kind.
    cursors_seen: HashMap<EntityKind, Vec<Option<String>>>,
    /// When set, the next push_batch renames this party locally before
    /// acknowledging, simulating an edit racing the push.
    edit_during_push: Option<(Database, String)>,
}

#[derive(Clone, Default)]
struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    fn refuse(&self, slug: &str) {
        self.state.lock().unwrap().unacknowledged.insert(slug.to_string());
    }

    fn fail_kind(&self, kind: EntityKind) {
        self.state.lock().unwrap().failing_kinds.insert(kind);
    }

    fn queue_page(&self, kind: EntityKind, page: PullPage) {
        self.state.lock().unwrap().pull_pages.entry(kind).or_default().push_back(page);
    }

    fn queue_tombstones(&self, page: TombstonePage) {
        self.state.lock().unwrap().tombstone_pages.push_back(page);
    }

    fn edit_during_push(&self, db: Database, party_slug: &str) {
        self.state.lock().unwrap().edit_during_push = Some((db, party_slug.to_string()));
    }

    fn pushed_count(&self, kind: EntityKind) -> usize {
        self.state.lock().unwrap().pushed.get(&kind).map_or(0, Vec::len)
    }

    fn cursors_seen(&self, kind: EntityKind) -> Vec<Option<String>> {
        self.state.lock().unwrap().cursors_seen.get(&kind).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl SyncTransport for MockTransport {
    async fn push_batch(
        &self,
        kind: EntityKind,
        rows: &[serde_json::Value],
    ) -> Result<PushOutcome, TransportError> {
        let (acknowledged, race) = {
            let mut state = self.state.lock().unwrap();
            if state.failing_kinds.contains(&kind) {
                return Err(TransportError::Network("server unreachable".to_string()));
            }
            state.pushed.entry(kind).or_default().extend(rows.iter().cloned());

            // Tombstone payloads carry record_slug instead of slug.
            let acknowledged = rows
                .iter()
                .filter_map(|row| {
                    row.get("slug")
                        .or_else(|| row.get("record_slug"))
                        .and_then(|s| s.as_str())
                })
                .filter(|slug| !state.unacknowledged.contains(*slug))
                .map(String::from)
                .collect();
            (acknowledged, state.edit_during_push.take())
        };

        if let Some((db, slug)) = race {
            let mut party = db.parties().get_by_slug(&slug).await.unwrap().unwrap();
            party.name = "Renamed mid-push".to_string();
            db.parties().update(&party).await.unwrap();
        }

        Ok(PushOutcome { acknowledged })
    }

    async fn pull_since(
        &self,
        kind: EntityKind,
        cursor: Option<&str>,
    ) -> Result<PullPage, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.failing_kinds.contains(&kind) {
            return Err(TransportError::Timeout);
        }
        state
            .cursors_seen
            .entry(kind)
            .or_default()
            .push(cursor.map(String::from));

        Ok(state
            .pull_pages
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
            .unwrap_or(PullPage {
                rows: vec![],
                next_cursor: None,
            }))
    }

    async fn pull_tombstones(&self, _cursor: Option<&str>) -> Result<TombstonePage, TransportError> {
        let mut state = self.state.lock().unwrap();
        Ok(state.tombstone_pages.pop_front().unwrap_or(TombstonePage {
            tombstones: vec![],
            next_cursor: None,
        }))
    }
}

// =============================================================================
// Helpers
// =============================================================================

async fn setup() -> (Database, MockTransport, Syncer<MockTransport>) {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let mock = MockTransport::default();
    let syncer = Syncer::new(db.clone(), mock.clone(), SyncConfig::for_business(BIZ)).unwrap();
    (db, mock, syncer)
}

async fn party_status(db: &Database, slug: &str) -> SyncStatus {
    db.parties().get_by_slug(slug).await.unwrap().unwrap().sync_status
}

// =============================================================================
// Push
// =============================================================================

#[tokio::test]
async fn push_clears_dirty_rows_and_reports_them() {
    let (db, mock, syncer) = setup().await;

    let party = Party::new(BIZ, "Aslam", PartyRole::Customer);
    let warehouse = Warehouse::new(BIZ, "Main");
    db.parties().insert(&party).await.unwrap();
    db.warehouses().insert(&warehouse).await.unwrap();

    let report = syncer.run_full_sync().await;

    assert!(report.is_clean());
    assert_eq!(report.total_pushed(), 2);
    assert_eq!(mock.pushed_count(EntityKind::Party), 1);
    assert_eq!(mock.pushed_count(EntityKind::Warehouse), 1);
    assert_eq!(party_status(&db, &party.slug).await, SyncStatus::Synced);
}

#[tokio::test]
async fn second_run_has_nothing_to_push() {
    let (db, mock, syncer) = setup().await;

    db.parties()
        .insert(&Party::new(BIZ, "Aslam", PartyRole::Customer))
        .await
        .unwrap();

    syncer.run_full_sync().await;
    let report = syncer.run_full_sync().await;

    assert!(report.is_clean());
    assert_eq!(report.total_pushed(), 0);
    // The one row from the first run, nothing more.
    assert_eq!(mock.pushed_count(EntityKind::Party), 1);
}

#[tokio::test]
async fn unacknowledged_rows_stay_dirty_and_retry() {
    let (db, mock, syncer) = setup().await;

    let accepted = Party::new(BIZ, "Aslam", PartyRole::Customer);
    let refused = Party::new(BIZ, "Bashir", PartyRole::Vendor);
    db.parties().insert(&accepted).await.unwrap();
    db.parties().insert(&refused).await.unwrap();
    mock.refuse(&refused.slug);

    let report = syncer.run_full_sync().await;
    assert!(report.is_clean());
    assert_eq!(report.total_pushed(), 1);
    assert_eq!(party_status(&db, &accepted.slug).await, SyncStatus::Synced);
    assert_eq!(party_status(&db, &refused.slug).await, SyncStatus::Dirty);

    // Next run retries only the refused row.
    let report = syncer.run_full_sync().await;
    assert_eq!(report.total_pushed(), 0);
    assert_eq!(mock.pushed_count(EntityKind::Party), 3);
}

#[tokio::test]
async fn edit_racing_a_push_keeps_the_row_dirty() {
    let (db, mock, syncer) = setup().await;

    let party = Party::new(BIZ, "Aslam", PartyRole::Customer);
    db.parties().insert(&party).await.unwrap();
    mock.edit_during_push(db.clone(), &party.slug);

    let report = syncer.run_full_sync().await;

    // The server acknowledged the old revision, but the newer edit must
    // not be masked by that acknowledgement.
    assert!(report.is_clean());
    let edited = db.parties().get_by_slug(&party.slug).await.unwrap().unwrap();
    assert_eq!(edited.name, "Renamed mid-push");
    assert_eq!(edited.sync_status, SyncStatus::Dirty);
}

#[tokio::test]
async fn tombstones_push_after_their_entities() {
    let (db, mock, syncer) = setup().await;

    db.tombstones()
        .insert(&DeletedRecord::new(BIZ, EntityKind::Party, "GONE1234"))
        .await
        .unwrap();

    let report = syncer.run_full_sync().await;

    assert!(report.is_clean());
    assert_eq!(mock.pushed_count(EntityKind::DeletedRecord), 1);
    assert!(db.tombstones().list_dirty(BIZ).await.unwrap().is_empty());
}

// =============================================================================
// Pull
// =============================================================================

#[tokio::test]
async fn pull_applies_rows_and_advances_the_cursor() {
    let (db, mock, syncer) = setup().await;

    let remote = Party::new(BIZ, "Remote Customer", PartyRole::Customer);
    mock.queue_page(
        EntityKind::Party,
        PullPage {
            rows: vec![serde_json::to_value(&remote).unwrap()],
            next_cursor: Some("c1".to_string()),
        },
    );

    let report = syncer.run_full_sync().await;

    assert!(report.is_clean());
    assert_eq!(report.total_pulled(), 1);

    let pulled = db.parties().get_by_slug(&remote.slug).await.unwrap().unwrap();
    assert_eq!(pulled.name, "Remote Customer");
    assert_eq!(pulled.sync_status, SyncStatus::Synced);

    assert_eq!(
        db.cursors().get(EntityKind::Party).await.unwrap(),
        Some("c1".to_string())
    );
    // First request from scratch, second from the stored cursor.
    assert_eq!(
        mock.cursors_seen(EntityKind::Party),
        vec![None, Some("c1".to_string())]
    );
}

#[tokio::test]
async fn next_run_pulls_from_the_stored_cursor() {
    let (_db, mock, syncer) = setup().await;

    mock.queue_page(
        EntityKind::Party,
        PullPage {
            rows: vec![],
            next_cursor: Some("c1".to_string()),
        },
    );

    syncer.run_full_sync().await;
    syncer.run_full_sync().await;

    let seen = mock.cursors_seen(EntityKind::Party);
    assert_eq!(seen.first().unwrap(), &None);
    assert!(seen[1..].iter().all(|c| c == &Some("c1".to_string())));
}

#[tokio::test]
async fn replaying_a_page_is_idempotent() {
    let (db, mock, syncer) = setup().await;

    let remote = Party::new(BIZ, "Remote Customer", PartyRole::Customer);
    let payload = serde_json::to_value(&remote).unwrap();
    mock.queue_page(
        EntityKind::Party,
        PullPage {
            rows: vec![payload.clone()],
            next_cursor: Some("c1".to_string()),
        },
    );
    mock.queue_page(
        EntityKind::Party,
        PullPage {
            rows: vec![payload],
            next_cursor: Some("c2".to_string()),
        },
    );

    let report = syncer.run_full_sync().await;

    assert!(report.is_clean());
    assert_eq!(db.parties().list(BIZ).await.unwrap().len(), 1);
}

#[tokio::test]
async fn pulled_rows_overwrite_local_state() {
    let (db, mock, syncer) = setup().await;

    let mut product = Product::new(BIZ, "Sugar");
    product.sale_price = 100.0;
    db.products().insert(&product).await.unwrap();
    syncer.run_full_sync().await;

    // Another device repriced it; the server copy wins.
    product.sale_price = 120.0;
    mock.queue_page(
        EntityKind::Product,
        PullPage {
            rows: vec![serde_json::to_value(&product).unwrap()],
            next_cursor: Some("p1".to_string()),
        },
    );
    syncer.run_full_sync().await;

    let local = db.products().get_by_slug(&product.slug).await.unwrap().unwrap();
    assert_eq!(local.sale_price, 120.0);
    assert_eq!(local.sync_status, SyncStatus::Synced);
}

// =============================================================================
// Tombstones
// =============================================================================

#[tokio::test]
async fn remote_tombstone_deletes_the_local_row() {
    let (db, mock, syncer) = setup().await;

    let party = Party::new(BIZ, "Aslam", PartyRole::Customer);
    db.parties().insert(&party).await.unwrap();
    syncer.run_full_sync().await;

    mock.queue_tombstones(TombstonePage {
        tombstones: vec![RemoteTombstone {
            entity_kind: EntityKind::Party,
            record_slug: party.slug.clone(),
        }],
        next_cursor: Some("t1".to_string()),
    });

    let report = syncer.run_full_sync().await;

    assert!(report.is_clean());
    assert_eq!(report.tombstones_applied, 1);
    assert!(db.parties().get_by_slug(&party.slug).await.unwrap().is_none());
    assert_eq!(
        db.cursors().get_tombstone().await.unwrap(),
        Some("t1".to_string())
    );
}

#[tokio::test]
async fn tombstone_for_an_already_missing_row_is_fine() {
    let (_db, mock, syncer) = setup().await;

    mock.queue_tombstones(TombstonePage {
        tombstones: vec![RemoteTombstone {
            entity_kind: EntityKind::Product,
            record_slug: "NEVERHAD".to_string(),
        }],
        next_cursor: None,
    });

    let report = syncer.run_full_sync().await;
    assert!(report.is_clean());
    assert_eq!(report.tombstones_applied, 1);
}

// =============================================================================
// Failure isolation
// =============================================================================

#[tokio::test]
async fn one_failing_kind_does_not_stop_the_others() {
    let (db, mock, syncer) = setup().await;

    let party = Party::new(BIZ, "Aslam", PartyRole::Customer);
    let product = Product::new(BIZ, "Sugar");
    db.parties().insert(&party).await.unwrap();
    db.products().insert(&product).await.unwrap();
    mock.fail_kind(EntityKind::Party);

    let report = syncer.run_full_sync().await;

    assert!(!report.is_clean());
    let party_entry = report
        .kinds
        .iter()
        .find(|k| k.kind == EntityKind::Party)
        .unwrap();
    assert!(party_entry.error.is_some());
    assert_eq!(party_status(&db, &party.slug).await, SyncStatus::Dirty);

    // Products synced despite the party failure.
    let product_entry = report
        .kinds
        .iter()
        .find(|k| k.kind == EntityKind::Product)
        .unwrap();
    assert!(product_entry.error.is_none());
    assert_eq!(product_entry.pushed, 1);
    let local = db.products().get_by_slug(&product.slug).await.unwrap().unwrap();
    assert_eq!(local.sync_status, SyncStatus::Synced);
}

// =============================================================================
// Progress
// =============================================================================

#[tokio::test]
async fn progress_events_cover_pushed_kinds() {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let mock = MockTransport::default();
    let (progress, mut rx) = ProgressSender::channel();
    let syncer = Syncer::new(db.clone(), mock, SyncConfig::for_business(BIZ))
        .unwrap()
        .with_progress(progress);

    db.parties()
        .insert(&Party::new(BIZ, "Aslam", PartyRole::Customer))
        .await
        .unwrap();

    syncer.run_full_sync().await;
    drop(syncer);

    let mut saw_party_push = false;
    while let Some(event) = rx.recv().await {
        if event.label == "Parties" && event.direction == SyncDirection::Push {
            assert_eq!(event.completed, 1);
            assert_eq!(event.total, 1);
            saw_party_push = true;
        }
    }
    assert!(saw_party_push);
}
