use std::sync::{Arc, Mutex};

use super::{Ledger, LedgerStore};
use crate::error::LedgerError;

/// Process-local ledger store. Counts saves so callers can check how often
/// the ledger was persisted.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLedgerStore {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    ledger: Ledger,
    saves: usize,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState { ledger, saves: 0 })),
        }
    }

    pub fn snapshot(&self) -> Ledger {
        self.lock().ledger.clone()
    }

    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LedgerStore for InMemoryLedgerStore {
    fn load(&self) -> Ledger {
        self.snapshot()
    }

    fn save(&self, ledger: &Ledger) -> Result<(), LedgerError> {
        let mut state = self.lock();
        state.ledger = ledger.clone();
        state.saves += 1;
        Ok(())
    }
}
