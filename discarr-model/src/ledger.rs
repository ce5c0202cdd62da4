use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ModelError;
use crate::ids::DownloadId;

/// `strftime` pattern of timestamps in the persisted ledger
/// (`YYYY-MM-DD HH:MM:SS.ffffff`).
pub const LEDGER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const LEDGER_TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Wall-clock instant recorded in the ledger, UTC without an offset suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LedgerTimestamp(NaiveDateTime);

impl LedgerTimestamp {
    pub fn now() -> Self {
        Self(Utc::now().naive_utc())
    }

    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self(value)
    }

    /// Signed time from `self` to `later`. Negative when the clock went
    /// backwards between runs.
    pub fn elapsed_until(&self, later: LedgerTimestamp) -> TimeDelta {
        later.0 - self.0
    }

    pub fn checked_add(&self, delta: TimeDelta) -> Option<Self> {
        self.0.checked_add_signed(delta).map(Self)
    }
}

impl fmt::Display for LedgerTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(LEDGER_TIMESTAMP_FORMAT))
    }
}

impl FromStr for LedgerTimestamp {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s.trim(), LEDGER_TIMESTAMP_PARSE_FORMAT)
            .map(Self)
            .map_err(|_| ModelError::InvalidTimestamp { raw: s.to_string() })
    }
}

impl Serialize for LedgerTimestamp {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LedgerTimestamp {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// "Last moment this download was confirmed not stalled."
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub id: DownloadId,
    pub last_healthy_at: LedgerTimestamp,
}
