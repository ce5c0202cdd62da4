//! One sweep of one service's queue against its ledger.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use discarr_model::{DownloadId, LedgerTimestamp, QueueEntry};
use tracing::{debug, info, warn};

use crate::error::{ReconcileError, Result};
use crate::ledger::{Ledger, LedgerStore};
use crate::ports::{DiscardExecutor, QueueSnapshotSource};
use crate::stall::{StallClassifier, StallPolicy, Verdict};

/// What a single run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Distinct ids in the snapshot.
    pub observed: usize,
    /// Ids seen for the first time and recorded as healthy now.
    pub newly_observed: usize,
    /// Known ids whose last-healthy timestamp advanced.
    pub refreshed: usize,
    /// Stalled ids still inside their catch-up window.
    pub waiting: usize,
    pub discarded: Vec<DownloadId>,
    /// Discards that failed upstream; their records are kept for a retry.
    pub failed_discards: Vec<DownloadId>,
    /// Ledger ids that were no longer in the snapshot.
    pub vanished: Vec<DownloadId>,
}

/// Drives runs for one service: a snapshot source, a discard executor and
/// the ledger they share.
pub struct Reconciler {
    service: String,
    snapshot: Arc<dyn QueueSnapshotSource>,
    executor: Arc<dyn DiscardExecutor>,
    store: Arc<dyn LedgerStore>,
    classifier: StallClassifier,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("service", &self.service)
            .field("snapshot", &self.snapshot.name())
            .field("store", &self.store)
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl Reconciler {
    pub fn new(
        service: impl Into<String>,
        snapshot: Arc<dyn QueueSnapshotSource>,
        executor: Arc<dyn DiscardExecutor>,
        store: Arc<dyn LedgerStore>,
        policy: StallPolicy,
    ) -> Self {
        Self {
            service: service.into(),
            snapshot,
            executor,
            store,
            classifier: StallClassifier::new(policy),
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        self.run_at(LedgerTimestamp::now()).await
    }

    /// Run with an explicit clock reading.
    ///
    /// A failed snapshot fetch returns before the ledger is touched. Any
    /// per-entry failure is logged and the run carries on.
    pub async fn run_at(&self, now: LedgerTimestamp) -> Result<RunReport> {
        let entries = self
            .snapshot
            .fetch()
            .await
            .map_err(ReconcileError::Snapshot)?;

        let mut ledger = self.store.load();
        let mut report = RunReport::default();
        let mut present = HashSet::with_capacity(entries.len());

        for entry in &entries {
            if !present.insert(entry.id.clone()) {
                debug!(
                    service = %self.service,
                    download_id = %entry.id,
                    "duplicate queue entry ignored"
                );
                continue;
            }
            report.observed += 1;
            self.process_entry(entry, now, &mut ledger, &mut report).await;
        }

        report.vanished = ledger.retain_present(&present);
        for id in &report.vanished {
            info!(
                service = %self.service,
                download_id = %id,
                "download left the queue, dropping from ledger"
            );
        }

        self.store.save(&ledger)?;

        info!(
            service = %self.service,
            observed = report.observed,
            new = report.newly_observed,
            refreshed = report.refreshed,
            waiting = report.waiting,
            discarded = report.discarded.len(),
            failed = report.failed_discards.len(),
            vanished = report.vanished.len(),
            "sweep finished"
        );
        Ok(report)
    }

    async fn process_entry(
        &self,
        entry: &QueueEntry,
        now: LedgerTimestamp,
        ledger: &mut Ledger,
        report: &mut RunReport,
    ) {
        let last_healthy_at = ledger.get(&entry.id);
        let verdict =
            self.classifier.classify(&entry.time_left, last_healthy_at, now);
        debug!(
            service = %self.service,
            download_id = %entry.id,
            title = entry.title.as_deref().unwrap_or(""),
            time_left = ?entry.time_left,
            verdict = verdict.label(),
            "classified"
        );

        match verdict {
            Verdict::Refresh => {
                if last_healthy_at.is_none() {
                    report.newly_observed += 1;
                } else {
                    report.refreshed += 1;
                }
                ledger.upsert(entry.id.clone(), now);
            }
            Verdict::Wait { .. } => report.waiting += 1,
            Verdict::Discard { elapsed } => {
                info!(
                    service = %self.service,
                    download_id = %entry.id,
                    title = entry.title.as_deref().unwrap_or(""),
                    elapsed_secs = elapsed.num_seconds(),
                    "stalled past catch-up window, discarding"
                );
                match self.executor.discard(&entry.id).await {
                    Ok(()) => {
                        ledger.remove(&entry.id);
                        report.discarded.push(entry.id.clone());
                        // Already gone upstream; persist before moving on.
                        if let Err(err) = self.store.save(ledger) {
                            warn!(
                                service = %self.service,
                                error = %err,
                                "ledger save after discard failed"
                            );
                        }
                    }
                    Err(err) => {
                        warn!(
                            service = %self.service,
                            download_id = %entry.id,
                            error = %err,
                            "discard failed, will retry next run"
                        );
                        report.failed_discards.push(entry.id.clone());
                    }
                }
            }
        }
    }
}
