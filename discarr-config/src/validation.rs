use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::constants::REQUEST_TIMEOUT_WARN_THRESHOLD;
use crate::models::{Config, ServiceConfig, threshold_fields};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("{service} url {reason}")]
    InvalidServiceUrl {
        service: &'static str,
        reason: String,
    },
    #[error("{service} api key is missing")]
    MissingApiKey { service: &'static str },
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("metadata sweep requires {missing}")]
    MetadataSweepUnavailable { missing: &'static str },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    non_zero("request_timeout", config.request_timeout)?;
    non_zero(
        "stall.max_allowed_download_time",
        config.stall.max_allowed_download_time,
    )?;
    non_zero(
        "stall.max_allowed_catchup_time",
        config.stall.max_allowed_catchup_time,
    )?;
    non_zero(
        "metadata.max_time_without_metadata",
        config.metadata_sweep.max_time_without_metadata,
    )?;

    if config.request_timeout > REQUEST_TIMEOUT_WARN_THRESHOLD {
        warnings.push_with_hint(
            format!(
                "request_timeout of {}s is unusually long",
                config.request_timeout.as_secs()
            ),
            "A hung service will block the run for this long per request",
        );
    }

    let mut any_service = false;
    for service in config.services() {
        any_service = true;
        validate_service(service, &mut warnings)?;
    }

    if !any_service {
        warnings.push_with_hint(
            "Neither Radarr nor Sonarr is configured; runs will do nothing",
            "Set RADARR_URL/RADARR_API_KEY or add a [radarr] section",
        );
    }

    Ok(warnings)
}

/// Checks the extra requirements of the metadata sweep. Only enforced
/// when that sweep is requested.
pub fn validate_metadata_sweep(
    config: &Config,
) -> Result<(), ConfigGuardRailError> {
    let Some(transmission) = config.transmission.as_ref() else {
        return Err(ConfigGuardRailError::MetadataSweepUnavailable {
            missing: "a [transmission] section or TRANSMISSION_URL",
        });
    };
    http_url("transmission", &transmission.url)?;

    if config.services().next().is_none() {
        return Err(ConfigGuardRailError::MetadataSweepUnavailable {
            missing: "Radarr or Sonarr to mark downloads as failed",
        });
    }
    Ok(())
}

fn validate_service(
    service: &ServiceConfig,
    warnings: &mut ConfigWarnings,
) -> Result<(), ConfigGuardRailError> {
    let name = service.kind.as_str();
    http_url(name, &service.url)?;

    if service.api_key.trim().is_empty() {
        return Err(ConfigGuardRailError::MissingApiKey { service: name });
    }

    let (download_field, catchup_field) = threshold_fields(service.kind);
    non_zero(download_field, service.thresholds.max_allowed_download_time)?;
    non_zero(catchup_field, service.thresholds.max_allowed_catchup_time)?;

    if service.thresholds.max_allowed_catchup_time
        > service.thresholds.max_allowed_download_time
    {
        warnings.push_with_hint(
            format!(
                "{name} catch-up window is longer than its download threshold"
            ),
            "Lower max_allowed_catchup_time below max_allowed_download_time",
        );
    }

    Ok(())
}

fn http_url(
    service: &'static str,
    raw: &str,
) -> Result<(), ConfigGuardRailError> {
    if raw.trim().is_empty() {
        return Err(ConfigGuardRailError::InvalidServiceUrl {
            service,
            reason: "is missing".into(),
        });
    }
    let parsed = Url::parse(raw.trim()).map_err(|err| {
        ConfigGuardRailError::InvalidServiceUrl {
            service,
            reason: format!("'{raw}' does not parse: {err}"),
        }
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigGuardRailError::InvalidServiceUrl {
            service,
            reason: format!("uses unsupported scheme `{other}`"),
        }),
    }
}

fn non_zero(
    field: &'static str,
    value: Duration,
) -> Result<(), ConfigGuardRailError> {
    if value.is_zero() {
        return Err(ConfigGuardRailError::ZeroDuration { field });
    }
    Ok(())
}
