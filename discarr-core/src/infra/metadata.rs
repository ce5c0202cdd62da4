//! Torrents stuck on "retrieving metadata".
//!
//! A torrent without metadata never reports a time-remaining, so every one
//! of them enters the reconciler as [`TimeLeft::Stalled`]. Once one has gone
//! without metadata for longer than the grace window it is marked failed in
//! whichever *arr service grabbed it and removed from Transmission.

use std::sync::Arc;

use async_trait::async_trait;
use discarr_model::{DownloadId, QueueEntry, TimeLeft};
use tracing::{info, warn};

use super::{ArrClient, TransmissionClient};
use crate::error::{ActionError, TransportError};
use crate::ports::{DiscardExecutor, QueueSnapshotSource};

#[derive(Debug, Clone)]
pub struct MetadataStallSource {
    transmission: Arc<TransmissionClient>,
}

impl MetadataStallSource {
    pub fn new(transmission: Arc<TransmissionClient>) -> Self {
        Self { transmission }
    }
}

#[async_trait]
impl QueueSnapshotSource for MetadataStallSource {
    fn name(&self) -> &str {
        "transmission-metadata"
    }

    async fn fetch(&self) -> Result<Vec<QueueEntry>, TransportError> {
        let torrents = self.transmission.torrents().await?;
        let mut entries = Vec::new();
        for torrent in torrents.into_iter().filter(|t| !t.has_metadata()) {
            let Ok(id) = DownloadId::from_hash(&torrent.hash_string) else {
                warn!("torrent without a hash skipped");
                continue;
            };
            let entry = QueueEntry::new(id, TimeLeft::Stalled);
            entries.push(match torrent.name {
                Some(name) => entry.with_title(name),
                None => entry,
            });
        }
        Ok(entries)
    }
}

/// Marks a metadata-stalled torrent failed upstream, then removes it from
/// Transmission.
#[derive(Debug, Clone)]
pub struct MarkFailedExecutor {
    services: Vec<Arc<ArrClient>>,
    transmission: Arc<TransmissionClient>,
}

impl MarkFailedExecutor {
    pub fn new(
        services: Vec<Arc<ArrClient>>,
        transmission: Arc<TransmissionClient>,
    ) -> Self {
        Self {
            services,
            transmission,
        }
    }
}

#[async_trait]
impl DiscardExecutor for MarkFailedExecutor {
    async fn discard(&self, id: &DownloadId) -> Result<(), ActionError> {
        for service in &self.services {
            let Some(history_id) = service.find_history_id(id.as_str()).await?
            else {
                continue;
            };

            service.mark_history_failed(history_id).await?;
            self.transmission.remove(id.as_str()).await?;
            info!(
                service = %service.kind(),
                download_id = %id,
                history_id,
                "marked failed and removed from transmission"
            );
            return Ok(());
        }

        Err(ActionError::NotTracked { id: id.clone() })
    }
}
