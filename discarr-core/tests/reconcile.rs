use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use discarr_core::{
    ActionError, DiscardExecutor, InMemoryLedgerStore, JsonFileLedgerStore,
    Ledger, LedgerStore, QueueSnapshotSource, ReconcileError, Reconciler,
    StallPolicy, TransportError,
};
use discarr_model::{DownloadId, LedgerTimestamp, QueueEntry, TimeLeft};

#[derive(Default)]
struct StubSnapshot {
    entries: Mutex<Vec<QueueEntry>>,
    offline: AtomicBool,
}

impl StubSnapshot {
    fn set(&self, entries: Vec<QueueEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl QueueSnapshotSource for StubSnapshot {
    fn name(&self) -> &str {
        "stub"
    }

    async fn fetch(&self) -> Result<Vec<QueueEntry>, TransportError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(TransportError::Rpc("connection refused".into()));
        }
        Ok(self.entries.lock().unwrap().clone())
    }
}

#[derive(Default)]
struct StubExecutor {
    discarded: Mutex<Vec<DownloadId>>,
    failing: Mutex<HashSet<DownloadId>>,
}

impl StubExecutor {
    fn fail_for(&self, id: &DownloadId) {
        self.failing.lock().unwrap().insert(id.clone());
    }

    fn recover(&self) {
        self.failing.lock().unwrap().clear();
    }

    fn discarded(&self) -> Vec<DownloadId> {
        self.discarded.lock().unwrap().clone()
    }
}

#[async_trait]
impl DiscardExecutor for StubExecutor {
    async fn discard(&self, id: &DownloadId) -> Result<(), ActionError> {
        if self.failing.lock().unwrap().contains(id) {
            return Err(ActionError::Transport(TransportError::Rpc(
                "upstream timed out".into(),
            )));
        }
        self.discarded.lock().unwrap().push(id.clone());
        Ok(())
    }
}

struct Harness {
    snapshot: Arc<StubSnapshot>,
    executor: Arc<StubExecutor>,
    store: InMemoryLedgerStore,
    reconciler: Reconciler,
}

fn harness() -> Harness {
    harness_with(InMemoryLedgerStore::new())
}

fn harness_with(store: InMemoryLedgerStore) -> Harness {
    let snapshot = Arc::new(StubSnapshot::default());
    let executor = Arc::new(StubExecutor::default());
    let reconciler = Reconciler::new(
        "radarr",
        snapshot.clone(),
        executor.clone(),
        Arc::new(store.clone()),
        StallPolicy::new(
            Duration::from_secs(2 * 3600),
            Duration::from_secs(5 * 60),
        ),
    );
    Harness {
        snapshot,
        executor,
        store,
        reconciler,
    }
}

fn t0() -> LedgerTimestamp {
    LedgerTimestamp::from_naive(
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(20, 0, 0)
            .unwrap(),
    )
}

fn at(minutes: i64) -> LedgerTimestamp {
    t0().checked_add(TimeDelta::minutes(minutes)).unwrap()
}

fn id(n: i64) -> DownloadId {
    DownloadId::from(n)
}

fn entry(n: i64, timeleft: &str) -> QueueEntry {
    QueueEntry::new(id(n), TimeLeft::parse(Some(timeleft)))
}

#[tokio::test]
async fn stalled_entry_is_discarded_after_catchup_window() {
    let h = harness();

    h.snapshot.set(vec![entry(42, "00:30:00")]);
    let report = h.reconciler.run_at(t0()).await.unwrap();
    assert_eq!(report.newly_observed, 1);
    assert_eq!(h.store.snapshot().get(&id(42)), Some(t0()));

    h.snapshot.set(vec![entry(42, "03:00:00")]);
    let report = h.reconciler.run_at(at(1)).await.unwrap();
    assert_eq!(report.waiting, 1);
    assert_eq!(h.store.snapshot().get(&id(42)), Some(t0()));

    let report = h.reconciler.run_at(at(6)).await.unwrap();
    assert_eq!(report.discarded, vec![id(42)]);
    assert_eq!(h.executor.discarded(), vec![id(42)]);
    assert!(!h.store.snapshot().contains(&id(42)));
}

#[tokio::test]
async fn healthy_sample_restarts_the_stall_timer() {
    let h = harness();

    h.snapshot.set(vec![entry(42, "00:30:00")]);
    h.reconciler.run_at(t0()).await.unwrap();

    h.snapshot.set(vec![entry(42, "01:00:00")]);
    let report = h.reconciler.run_at(at(3)).await.unwrap();
    assert_eq!(report.refreshed, 1);
    assert_eq!(h.store.snapshot().get(&id(42)), Some(at(3)));

    h.snapshot.set(vec![entry(42, "05:00:00")]);
    let report = h.reconciler.run_at(at(7)).await.unwrap();
    assert_eq!(report.waiting, 1, "only 4 minutes since the healthy sample");

    let report = h.reconciler.run_at(at(9)).await.unwrap();
    assert_eq!(report.discarded, vec![id(42)]);
}

#[tokio::test]
async fn single_blip_is_never_discarded() {
    let h = harness();

    h.snapshot.set(vec![entry(7, "00:10:00")]);
    h.reconciler.run_at(t0()).await.unwrap();

    h.snapshot.set(vec![QueueEntry::new(id(7), TimeLeft::Unknown)]);
    h.reconciler.run_at(at(4)).await.unwrap();

    h.snapshot.set(vec![entry(7, "00:09:00")]);
    h.reconciler.run_at(at(8)).await.unwrap();

    h.snapshot.set(vec![entry(7, "00:08:00")]);
    h.reconciler.run_at(at(20)).await.unwrap();

    assert!(h.executor.discarded().is_empty());
    assert_eq!(h.store.snapshot().get(&id(7)), Some(at(20)));
}

#[tokio::test]
async fn zero_time_left_counts_as_stalled() {
    let h = harness();

    h.snapshot.set(vec![entry(3, "00:00:00")]);
    h.reconciler.run_at(t0()).await.unwrap();
    let report = h.reconciler.run_at(at(2)).await.unwrap();
    assert_eq!(report.waiting, 1);

    let report = h.reconciler.run_at(at(10)).await.unwrap();
    assert_eq!(report.discarded, vec![id(3)]);
}

#[tokio::test]
async fn discard_fires_on_elapsed_time_regardless_of_run_count() {
    let sparse = harness();
    let dense = harness();

    for h in [&sparse, &dense] {
        h.snapshot.set(vec![entry(1, "00:10:00")]);
        h.reconciler.run_at(t0()).await.unwrap();
        h.snapshot.set(vec![entry(1, "10:00:00")]);
    }

    for minute in 1..=5 {
        let report = dense.reconciler.run_at(at(minute)).await.unwrap();
        assert!(report.discarded.is_empty(), "minute {minute}");
    }
    let report = sparse.reconciler.run_at(at(5)).await.unwrap();
    assert!(report.discarded.is_empty());

    let dense_report = dense
        .reconciler
        .run_at(t0().checked_add(TimeDelta::seconds(301)).unwrap())
        .await
        .unwrap();
    let sparse_report = sparse
        .reconciler
        .run_at(t0().checked_add(TimeDelta::seconds(301)).unwrap())
        .await
        .unwrap();
    assert_eq!(dense_report.discarded, vec![id(1)]);
    assert_eq!(sparse_report.discarded, vec![id(1)]);
}

#[tokio::test]
async fn vanished_ids_are_dropped_in_the_same_run() {
    let mut ledger = Ledger::new();
    ledger.upsert(id(1), t0());
    ledger.upsert(id(2), at(-30));
    ledger.upsert(id(3), t0());
    let h = harness_with(InMemoryLedgerStore::with_ledger(ledger));

    h.snapshot.set(vec![entry(3, "00:20:00")]);
    let report = h.reconciler.run_at(at(1)).await.unwrap();

    assert_eq!(report.vanished, vec![id(1), id(2)]);
    let ledger = h.store.snapshot();
    assert_eq!(ledger.len(), 1);
    assert!(ledger.contains(&id(3)));
    assert!(h.executor.discarded().is_empty());
}

#[tokio::test]
async fn snapshot_failure_leaves_ledger_untouched() {
    let mut ledger = Ledger::new();
    ledger.upsert(id(9), t0());
    let h = harness_with(InMemoryLedgerStore::with_ledger(ledger.clone()));

    h.snapshot.go_offline();
    let err = h.reconciler.run_at(at(30)).await.unwrap_err();

    assert!(matches!(err, ReconcileError::Snapshot(_)));
    assert_eq!(h.store.snapshot(), ledger);
    assert_eq!(h.store.save_count(), 0);
}

#[tokio::test]
async fn failed_discard_keeps_record_and_processing_continues() {
    let h = harness();

    h.snapshot.set(vec![
        entry(1, "09:00:00"),
        entry(2, "09:00:00"),
        entry(3, "00:05:00"),
    ]);
    h.reconciler.run_at(t0()).await.unwrap();

    h.executor.fail_for(&id(1));
    let report = h.reconciler.run_at(at(10)).await.unwrap();

    assert_eq!(report.failed_discards, vec![id(1)]);
    assert_eq!(report.discarded, vec![id(2)]);
    assert_eq!(report.refreshed, 1);
    let ledger = h.store.snapshot();
    assert_eq!(ledger.get(&id(1)), Some(t0()));
    assert!(!ledger.contains(&id(2)));
    assert_eq!(ledger.get(&id(3)), Some(at(10)));

    h.executor.recover();
    h.snapshot.set(vec![entry(1, "09:00:00"), entry(3, "00:05:00")]);
    let report = h.reconciler.run_at(at(11)).await.unwrap();
    assert_eq!(report.discarded, vec![id(1)]);
}

#[tokio::test]
async fn rerun_on_unchanged_snapshot_only_refreshes() {
    let h = harness();
    h.snapshot.set(vec![
        entry(1, "00:10:00"),
        entry(2, "04:00:00"),
        entry(3, "01:00:00"),
    ]);

    h.reconciler.run_at(t0()).await.unwrap();
    h.reconciler.run_at(at(1)).await.unwrap();
    let first = h.store.snapshot();

    let report = h.reconciler.run_at(at(1)).await.unwrap();
    assert_eq!(h.store.snapshot(), first);
    assert!(report.discarded.is_empty());
    assert!(report.vanished.is_empty());
    assert_eq!(report.newly_observed, 0);
}

#[tokio::test]
async fn duplicate_ids_in_snapshot_are_processed_once() {
    let h = harness();
    h.snapshot.set(vec![entry(5, "09:00:00"), entry(5, "09:00:00")]);
    h.reconciler.run_at(t0()).await.unwrap();

    let report = h.reconciler.run_at(at(6)).await.unwrap();
    assert_eq!(report.observed, 1);
    assert_eq!(h.executor.discarded(), vec![id(5)]);
}

#[tokio::test]
async fn discards_are_persisted_before_the_run_ends() {
    let h = harness();
    h.snapshot.set(vec![entry(1, "09:00:00"), entry(2, "09:00:00")]);
    h.reconciler.run_at(t0()).await.unwrap();
    let saves_before = h.store.save_count();

    h.reconciler.run_at(at(6)).await.unwrap();
    // one save per discard plus the final one
    assert_eq!(h.store.save_count() - saves_before, 3);
}

#[tokio::test]
async fn json_ledger_survives_between_runs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("currently_downloading_movies.json");
    let snapshot = Arc::new(StubSnapshot::default());
    let executor = Arc::new(StubExecutor::default());

    let build = || {
        Reconciler::new(
            "radarr",
            snapshot.clone(),
            executor.clone(),
            Arc::new(JsonFileLedgerStore::new(&path)),
            StallPolicy::new(
                Duration::from_secs(2 * 3600),
                Duration::from_secs(5 * 60),
            ),
        )
    };

    snapshot.set(vec![entry(42, "00:30:00")]);
    build().run_at(t0()).await.unwrap();

    snapshot.set(vec![entry(42, "03:00:00")]);
    build().run_at(at(1)).await.unwrap();
    let persisted = JsonFileLedgerStore::new(&path).load();
    assert_eq!(persisted.get(&id(42)), Some(t0()));

    build().run_at(at(6)).await.unwrap();
    assert!(JsonFileLedgerStore::new(&path).load().is_empty());
    assert_eq!(executor.discarded(), vec![id(42)]);
}
