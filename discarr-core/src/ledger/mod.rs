//! Durable per-download record of the last moment each entry was healthy.

mod json_file;
mod memory;

pub use json_file::JsonFileLedgerStore;
pub use memory::InMemoryLedgerStore;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use discarr_model::{DownloadId, LedgerRecord, LedgerTimestamp};

use crate::error::LedgerError;

/// In-memory view of a ledger for the duration of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    records: BTreeMap<DownloadId, LedgerTimestamp>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &DownloadId) -> Option<LedgerTimestamp> {
        self.records.get(id).copied()
    }

    pub fn contains(&self, id: &DownloadId) -> bool {
        self.records.contains_key(id)
    }

    pub fn upsert(&mut self, id: DownloadId, last_healthy_at: LedgerTimestamp) {
        self.records.insert(id, last_healthy_at);
    }

    /// Drop `id`. Removing an id that is not tracked is a no-op and returns
    /// `false`.
    pub fn remove(&mut self, id: &DownloadId) -> bool {
        self.records.remove(id).is_some()
    }

    /// Drop every id not in `present`, returning the dropped ids.
    pub fn retain_present(
        &mut self,
        present: &HashSet<DownloadId>,
    ) -> Vec<DownloadId> {
        let vanished: Vec<DownloadId> = self
            .records
            .keys()
            .filter(|id| !present.contains(*id))
            .cloned()
            .collect();
        for id in &vanished {
            self.records.remove(id);
        }
        vanished
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = LedgerRecord> + '_ {
        self.records.iter().map(|(id, ts)| LedgerRecord {
            id: id.clone(),
            last_healthy_at: *ts,
        })
    }
}

impl FromIterator<LedgerRecord> for Ledger {
    fn from_iter<T: IntoIterator<Item = LedgerRecord>>(iter: T) -> Self {
        Self {
            records: iter
                .into_iter()
                .map(|record| (record.id, record.last_healthy_at))
                .collect(),
        }
    }
}

/// Persistence for a [`Ledger`].
///
/// `load` fails soft: a missing or unreadable ledger is an empty one. `save`
/// must replace the persisted form atomically, so a crash leaves either the
/// previous or the new ledger behind, never a mix.
pub trait LedgerStore: Send + Sync + fmt::Debug {
    fn load(&self) -> Ledger;

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError>;
}
