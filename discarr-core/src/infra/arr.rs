use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use discarr_model::{DownloadId, QueueEntry, ServiceKind, TimeLeft};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use super::{ensure_success, normalize_base, redact, status_error};
use crate::error::{ActionError, TransportError};
use crate::ports::{DiscardExecutor, QueueSnapshotSource};

const PAGE_SIZE: u32 = 100;
/// Upper bound on queue pages fetched in one snapshot.
const MAX_QUEUE_PAGES: u32 = 200;
/// History is searched newest first; a torrent stuck on metadata was grabbed
/// recently, so a few pages are enough.
const MAX_HISTORY_PAGES: u32 = 5;

/// Paged envelope shared by the v3 `queue` and `history` endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Page<T> {
    #[serde(default)]
    total_records: u64,
    #[serde(default = "Vec::new")]
    records: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct QueueRecord {
    id: i64,
    #[serde(default)]
    timeleft: Option<String>,
    #[serde(default)]
    title: Option<String>,
}

impl From<QueueRecord> for QueueEntry {
    fn from(record: QueueRecord) -> Self {
        let entry = QueueEntry::new(
            DownloadId::from(record.id),
            TimeLeft::parse(record.timeleft.as_deref()),
        );
        match record.title {
            Some(title) => entry.with_title(title),
            None => entry,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    id: i64,
    #[serde(default)]
    download_id: Option<String>,
}

/// Client for the Radarr / Sonarr v3 API.
#[derive(Clone)]
pub struct ArrClient {
    kind: ServiceKind,
    base: Url,
    api_key: String,
    http: reqwest::Client,
}

impl fmt::Debug for ArrClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrClient")
            .field("kind", &self.kind)
            .field("base", &self.base.as_str())
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ArrClient {
    pub fn new(
        kind: ServiceKind,
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            kind,
            base: normalize_base(base_url)?,
            api_key: api_key.into(),
            http,
        })
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Ok(self.base.join(path)?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<T, TransportError> {
        let response = self
            .http
            .get(url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;
        let response = ensure_success("GET", &url, response)?;
        response
            .json::<T>()
            .await
            .map_err(|err| TransportError::Decode {
                url: redact(&url),
                reason: err.to_string(),
            })
    }

    fn paged_url(&self, path: &str, page: u32) -> Result<Url, TransportError> {
        let mut url = self.endpoint(path)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("page", &page.to_string())
                .append_pair("pageSize", &PAGE_SIZE.to_string());
            for (key, value) in self.kind.include_params() {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Every record currently in the download queue, across all pages.
    ///
    /// Fails rather than returning a truncated queue when the page cap is
    /// reached first.
    pub async fn fetch_queue(&self) -> Result<Vec<QueueEntry>, TransportError> {
        let mut entries = Vec::new();
        let mut total_records = 0;
        for page in 1..=MAX_QUEUE_PAGES {
            let url = self.paged_url("api/v3/queue", page)?;
            let body: Page<QueueRecord> = self.get_json(url).await?;
            let fetched = body.records.len();
            total_records = body.total_records;
            entries.extend(body.records.into_iter().map(QueueEntry::from));

            if fetched == 0 || entries.len() as u64 >= total_records {
                debug!(
                    service = %self.kind,
                    count = entries.len(),
                    "queue fetched"
                );
                return Ok(entries);
            }
        }

        let url = self.endpoint("api/v3/queue")?;
        Err(TransportError::Decode {
            url: redact(&url),
            reason: format!(
                "queue still incomplete after {MAX_QUEUE_PAGES} pages \
                 ({} of {total_records} records)",
                entries.len()
            ),
        })
    }

    /// Remove a queue item from the download client and blocklist its
    /// release. An item that is already gone counts as removed.
    pub async fn remove_and_blocklist(
        &self,
        id: &DownloadId,
    ) -> Result<(), TransportError> {
        let mut url = self.endpoint(&format!("api/v3/queue/{id}"))?;
        url.query_pairs_mut()
            .append_pair("removeFromClient", "true")
            .append_pair("blocklist", "true");

        let response = self
            .http
            .delete(url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                debug!(
                    service = %self.kind,
                    download_id = %id,
                    "queue item already gone"
                );
                Ok(())
            }
            status => Err(status_error("DELETE", &url, status)),
        }
    }

    /// Id of the newest history record whose download id matches
    /// `torrent_hash` (case-insensitive).
    pub async fn find_history_id(
        &self,
        torrent_hash: &str,
    ) -> Result<Option<i64>, TransportError> {
        for page in 1..=MAX_HISTORY_PAGES {
            let mut url = self.paged_url("api/v3/history", page)?;
            url.query_pairs_mut()
                .append_pair("sortKey", "date")
                .append_pair("sortDirection", "descending");

            let body: Page<HistoryRecord> = self.get_json(url).await?;
            if let Some(record) = body.records.iter().find(|record| {
                record
                    .download_id
                    .as_deref()
                    .is_some_and(|hash| hash.eq_ignore_ascii_case(torrent_hash))
            }) {
                return Ok(Some(record.id));
            }

            let seen = u64::from(page) * u64::from(PAGE_SIZE);
            if body.records.is_empty() || seen >= body.total_records {
                break;
            }
        }
        Ok(None)
    }

    pub async fn mark_history_failed(
        &self,
        history_id: i64,
    ) -> Result<(), TransportError> {
        let url =
            self.endpoint(&format!("api/v3/history/failed/{history_id}"))?;
        let response = self
            .http
            .post(url.clone())
            .header("X-Api-Key", &self.api_key)
            .send()
            .await?;
        ensure_success("POST", &url, response)?;
        Ok(())
    }
}

#[async_trait]
impl QueueSnapshotSource for ArrClient {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    async fn fetch(&self) -> Result<Vec<QueueEntry>, TransportError> {
        self.fetch_queue().await
    }
}

#[async_trait]
impl DiscardExecutor for ArrClient {
    async fn discard(&self, id: &DownloadId) -> Result<(), ActionError> {
        self.remove_and_blocklist(id).await?;
        info!(
            service = %self.kind,
            download_id = %id,
            "removed from client and blocklisted"
        );
        Ok(())
    }
}
