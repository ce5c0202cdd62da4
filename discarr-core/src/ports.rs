//! Collaborators the reconciler drives. The HTTP implementations live in
//! [`crate::infra`]; tests substitute stubs.

use async_trait::async_trait;
use discarr_model::{DownloadId, QueueEntry};

use crate::error::{ActionError, TransportError};

/// Point-in-time list of the downloads a service currently has queued.
#[async_trait]
pub trait QueueSnapshotSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Vec<QueueEntry>, TransportError>;
}

/// Removes a stalled download upstream so it is not picked again from the
/// same source.
///
/// Implementations must be idempotent: discarding an id that is already
/// gone is a success.
#[async_trait]
pub trait DiscardExecutor: Send + Sync {
    async fn discard(&self, id: &DownloadId) -> Result<(), ActionError>;
}
