use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use super::{ensure_success, normalize_base, redact};
use crate::error::TransportError;

const SESSION_HEADER: &str = "X-Transmission-Session-Id";

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    method: &'a str,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: String,
    arguments: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TorrentList {
    #[serde(default)]
    torrents: Vec<TorrentStatus>,
}

/// Subset of the `torrent-get` fields discarr reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentStatus {
    pub hash_string: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata_percent_complete: f64,
}

impl TorrentStatus {
    pub fn has_metadata(&self) -> bool {
        self.metadata_percent_complete >= 1.0
    }
}

/// Minimal Transmission JSON-RPC client.
pub struct TransmissionClient {
    endpoint: Url,
    credentials: Option<(String, Option<String>)>,
    http: reqwest::Client,
    session_id: Mutex<Option<String>>,
}

impl fmt::Debug for TransmissionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransmissionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}

impl TransmissionClient {
    pub fn new(
        base_url: &str,
        credentials: Option<(String, Option<String>)>,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        let endpoint = normalize_base(base_url)?.join("transmission/rpc")?;
        Ok(Self {
            endpoint,
            credentials,
            http,
            session_id: Mutex::new(None),
        })
    }

    fn current_session(&self) -> Option<String> {
        self.session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn store_session(&self, id: String) {
        *self
            .session_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(id);
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        arguments: Value,
    ) -> Result<Option<T>, TransportError> {
        let body = RpcRequest { method, arguments };

        // A 409 hands out a fresh session id; retry once with it.
        for _ in 0..2 {
            let mut request = self.http.post(self.endpoint.clone()).json(&body);
            if let Some(session) = self.current_session() {
                request = request.header(SESSION_HEADER, session);
            }
            if let Some((user, password)) = &self.credentials {
                request = request.basic_auth(user, password.as_deref());
            }

            let response = request.send().await?;
            if response.status() == StatusCode::CONFLICT {
                let session = response
                    .headers()
                    .get(SESSION_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
                    .ok_or_else(|| {
                        TransportError::Rpc(
                            "409 without a session id header".to_string(),
                        )
                    })?;
                debug!("transmission session renewed");
                self.store_session(session);
                continue;
            }

            let response = ensure_success("POST", &self.endpoint, response)?;
            let parsed: RpcResponse<T> =
                response.json().await.map_err(|err| TransportError::Decode {
                    url: redact(&self.endpoint),
                    reason: err.to_string(),
                })?;
            if parsed.result != "success" {
                return Err(TransportError::Rpc(format!(
                    "{method}: {}",
                    parsed.result
                )));
            }
            return Ok(parsed.arguments);
        }

        Err(TransportError::Rpc("session id rejected twice".to_string()))
    }

    pub async fn torrents(&self) -> Result<Vec<TorrentStatus>, TransportError> {
        let list: Option<TorrentList> = self
            .call(
                "torrent-get",
                json!({
                    "fields": ["hashString", "name", "metadataPercentComplete"]
                }),
            )
            .await?;
        Ok(list.map(|list| list.torrents).unwrap_or_default())
    }

    /// Remove a torrent, keeping any downloaded data. Unknown hashes are
    /// ignored by Transmission.
    pub async fn remove(&self, hash: &str) -> Result<(), TransportError> {
        self.call::<Value>(
            "torrent-remove",
            json!({ "ids": [hash], "delete-local-data": false }),
        )
        .await?;
        Ok(())
    }
}
