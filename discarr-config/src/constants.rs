use std::time::Duration;

pub const DEFAULT_MAX_ALLOWED_DOWNLOAD_TIME: Duration =
    Duration::from_secs(4 * 60 * 60);
pub const DEFAULT_MAX_ALLOWED_CATCHUP_TIME: Duration =
    Duration::from_secs(10 * 60);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_TIME_WITHOUT_METADATA: Duration = Duration::from_secs(60);

pub const DEFAULT_STATE_DIR: &str = ".";
pub const DEFAULT_METADATA_LEDGER_FILE: &str = "torrents_without_metadata.json";

/// Timeouts above this are accepted but flagged.
pub const REQUEST_TIMEOUT_WARN_THRESHOLD: Duration = Duration::from_secs(60);

pub const DEFAULT_CONFIG_LOCATIONS: &[&str] =
    &["discarr.toml", "config/discarr.toml"];
