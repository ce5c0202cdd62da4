//! Core data model definitions shared across discarr crates.

pub mod error;
pub mod ids;
pub mod ledger;
pub mod queue;
pub mod service;

pub use error::ModelError;
pub use ids::DownloadId;
pub use ledger::{LEDGER_TIMESTAMP_FORMAT, LedgerRecord, LedgerTimestamp};
pub use queue::{QueueEntry, TimeLeft};
pub use service::ServiceKind;
