//! Core library for discarr.
//!
//! Watches the download queues of Radarr and Sonarr, gives stalled or
//! overly slow downloads a bounded window to recover, and discards the ones
//! that do not. The pieces:
//!
//! - [`stall`]: the pure classifier turning a time-remaining signal and the
//!   entry's last-healthy timestamp into a [`stall::Verdict`].
//! - [`ledger`]: the durable per-id record of "last time this was healthy".
//! - [`reconcile`]: one run against one service, applying verdicts and
//!   sweeping ids that left the queue.
//! - [`ports`] and [`infra`]: the snapshot / discard collaborators and their
//!   HTTP implementations.
//!
//! Runs against the same ledger file must not overlap; nothing here locks
//! the file.

pub mod error;
pub mod infra;
pub mod ledger;
pub mod ports;
pub mod reconcile;
pub mod stall;

pub use error::{ActionError, LedgerError, ReconcileError, TransportError};
pub use ledger::{InMemoryLedgerStore, JsonFileLedgerStore, Ledger, LedgerStore};
pub use ports::{DiscardExecutor, QueueSnapshotSource};
pub use reconcile::{Reconciler, RunReport};
pub use stall::{StallClassifier, StallPolicy, Verdict, is_stalled};
