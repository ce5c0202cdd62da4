use std::fs::read_to_string;
use std::path::Path;
use std::time::Duration;

use crate::loader::error::ConfigLoadError;

/// Parse a human-readable duration (`"4h"`, `"10m"`, `"1h 30m"`).
pub fn parse_duration(
    field: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|source| {
        ConfigLoadError::InvalidDuration {
            field,
            value: raw.to_string(),
            source,
        }
    })
}

/// Parse an optional raw duration, falling back to `default`.
pub fn duration_or(
    field: &'static str,
    raw: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw.filter(|value| !value.trim().is_empty()) {
        Some(value) => parse_duration(field, value),
        None => Ok(default),
    }
}

pub fn read_secret_file(
    path: &Path,
) -> Result<Option<String>, ConfigLoadError> {
    let contents = read_to_string(path).map_err(|source| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(trimmed.to_string()))
    }
}

/// Read an environment variable, treating blank values as unset.
pub fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
