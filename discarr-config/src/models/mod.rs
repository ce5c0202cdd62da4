pub mod sources;

use std::path::{Path, PathBuf};
use std::time::Duration;

use discarr_core::StallPolicy;
use discarr_model::ServiceKind;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory relative ledger paths resolve against.
    pub state_dir: PathBuf,
    pub request_timeout: Duration,
    /// Global thresholds; services may override them.
    pub stall: StallThresholds,
    pub radarr: Option<ServiceConfig>,
    pub sonarr: Option<ServiceConfig>,
    pub transmission: Option<TransmissionConfig>,
    pub metadata_sweep: MetadataSweepConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    pub fn service(&self, kind: ServiceKind) -> Option<&ServiceConfig> {
        match kind {
            ServiceKind::Radarr => self.radarr.as_ref(),
            ServiceKind::Sonarr => self.sonarr.as_ref(),
        }
    }

    /// Configured services in a stable order (Radarr first).
    pub fn services(&self) -> impl Iterator<Item = &ServiceConfig> {
        self.radarr.iter().chain(self.sonarr.iter())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StallThresholds {
    pub max_allowed_download_time: Duration,
    pub max_allowed_catchup_time: Duration,
}

impl StallThresholds {
    pub fn policy(&self) -> StallPolicy {
        StallPolicy::new(
            self.max_allowed_download_time,
            self.max_allowed_catchup_time,
        )
    }
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub kind: ServiceKind,
    pub url: String,
    pub api_key: String,
    pub thresholds: StallThresholds,
    pub ledger_path: PathBuf,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("kind", &self.kind)
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("thresholds", &self.thresholds)
            .field("ledger_path", &self.ledger_path)
            .finish()
    }
}

#[derive(Clone)]
pub struct TransmissionConfig {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl TransmissionConfig {
    pub fn credentials(&self) -> Option<(String, Option<String>)> {
        self.username
            .clone()
            .map(|user| (user, self.password.clone()))
    }
}

impl std::fmt::Debug for TransmissionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransmissionConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Settings for the sweep of torrents stuck retrieving metadata.
#[derive(Debug, Clone)]
pub struct MetadataSweepConfig {
    pub max_time_without_metadata: Duration,
    pub ledger_path: PathBuf,
}

impl MetadataSweepConfig {
    pub fn policy(&self) -> StallPolicy {
        StallPolicy::grace_only(self.max_time_without_metadata)
    }
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

pub(crate) fn resolve_in(state_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        state_dir.join(path)
    }
}

/// Field names used in errors for a service's threshold overrides.
pub(crate) fn threshold_fields(
    kind: ServiceKind,
) -> (&'static str, &'static str) {
    match kind {
        ServiceKind::Radarr => (
            "radarr.max_allowed_download_time",
            "radarr.max_allowed_catchup_time",
        ),
        ServiceKind::Sonarr => (
            "sonarr.max_allowed_download_time",
            "sonarr.max_allowed_catchup_time",
        ),
    }
}
