use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Opaque, stable identifier of one queued download.
///
/// Radarr and Sonarr hand out integer queue ids, Transmission identifies
/// torrents by info-hash. Both are stored as the decimal / hex text that the
/// ledger file uses as its object keys.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DownloadId(String);

impl DownloadId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ModelError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ModelError::EmptyId);
        }
        Ok(Self(raw))
    }

    /// Info-hashes compare case-insensitively upstream, so they are keyed
    /// lower-case.
    pub fn from_hash(hash: &str) -> Result<Self, ModelError> {
        Self::new(hash.trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for DownloadId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl FromStr for DownloadId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for DownloadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
