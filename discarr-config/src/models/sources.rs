use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::non_empty_var;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<String>,
    #[serde(default)]
    pub stall: FileStallConfig,
    pub radarr: Option<FileServiceConfig>,
    pub sonarr: Option<FileServiceConfig>,
    pub transmission: Option<FileTransmissionConfig>,
    #[serde(default)]
    pub metadata: FileMetadataConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileStallConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_allowed_download_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_allowed_catchup_time: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_allowed_download_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_allowed_catchup_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileTransmissionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileMetadataConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_time_without_metadata: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger_path: Option<PathBuf>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub request_timeout: Option<String>,
    pub max_allowed_download_time: Option<String>,
    pub max_allowed_catchup_time: Option<String>,
    pub radarr_url: Option<String>,
    pub radarr_api_key: Option<String>,
    pub radarr_api_key_file: Option<PathBuf>,
    pub sonarr_url: Option<String>,
    pub sonarr_api_key: Option<String>,
    pub sonarr_api_key_file: Option<PathBuf>,
    pub transmission_url: Option<String>,
    pub transmission_username: Option<String>,
    pub transmission_password: Option<String>,
    pub max_time_without_metadata: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: non_empty_var("DISCARR_CONFIG").map(PathBuf::from),
            state_dir: non_empty_var("DISCARR_STATE_DIR").map(PathBuf::from),
            request_timeout: non_empty_var("DISCARR_REQUEST_TIMEOUT"),
            max_allowed_download_time: non_empty_var(
                "DISCARR_MAX_ALLOWED_DOWNLOAD_TIME",
            ),
            max_allowed_catchup_time: non_empty_var(
                "DISCARR_MAX_ALLOWED_CATCHUP_TIME",
            ),
            radarr_url: non_empty_var("RADARR_URL"),
            radarr_api_key: non_empty_var("RADARR_API_KEY"),
            radarr_api_key_file: non_empty_var("RADARR_API_KEY_FILE")
                .map(PathBuf::from),
            sonarr_url: non_empty_var("SONARR_URL"),
            sonarr_api_key: non_empty_var("SONARR_API_KEY"),
            sonarr_api_key_file: non_empty_var("SONARR_API_KEY_FILE")
                .map(PathBuf::from),
            transmission_url: non_empty_var("TRANSMISSION_URL"),
            transmission_username: non_empty_var("TRANSMISSION_USERNAME"),
            transmission_password: non_empty_var("TRANSMISSION_PASSWORD"),
            max_time_without_metadata: non_empty_var(
                "DISCARR_MAX_TIME_WITHOUT_METADATA",
            ),
        }
    }
}
