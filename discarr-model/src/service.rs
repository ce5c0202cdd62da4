use std::fmt;

use serde::{Deserialize, Serialize};

/// Upstream media-acquisition manager whose download queue is swept.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Radarr,
    Sonarr,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Radarr => "radarr",
            ServiceKind::Sonarr => "sonarr",
        }
    }

    /// Extra query parameters that make the queue and history endpoints
    /// include the media each record belongs to.
    pub fn include_params(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            ServiceKind::Radarr => &[
                ("includeUnknownMovieItems", "true"),
                ("includeMovie", "true"),
            ],
            ServiceKind::Sonarr => &[
                ("includeUnknownSeriesItems", "true"),
                ("includeSeries", "true"),
                ("includeEpisode", "true"),
            ],
        }
    }

    /// Ledger file name used when none is configured.
    pub fn default_ledger_file(&self) -> &'static str {
        match self {
            ServiceKind::Radarr => "currently_downloading_movies.json",
            ServiceKind::Sonarr => "currently_downloading_series.json",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
