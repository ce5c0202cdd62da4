use std::path::PathBuf;

use discarr_model::DownloadId;
use thiserror::Error;

/// Failure talking to an upstream service.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}")]
    Status {
        method: &'static str,
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("invalid response from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Failure persisting the ledger.
///
/// Loading never produces one of these: an unreadable ledger is reset to
/// empty and logged instead.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger I/O failed for {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("ledger serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A discard that could not be carried out. The ledger record is kept so
/// the entry is retried next run.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("no configured service tracks download {id}")]
    NotTracked { id: DownloadId },
}

/// Run-level failure of the reconciler.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("queue snapshot could not be fetched")]
    Snapshot(#[source] TransportError),

    #[error("ledger could not be persisted")]
    Ledger(#[from] LedgerError),
}

pub type Result<T> = std::result::Result<T, ReconcileError>;
