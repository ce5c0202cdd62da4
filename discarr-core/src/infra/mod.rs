//! HTTP shims for the upstream services.

pub mod arr;
pub mod metadata;
pub mod transmission;

pub use arr::ArrClient;
pub use metadata::{MarkFailedExecutor, MetadataStallSource};
pub use transmission::{TorrentStatus, TransmissionClient};

use reqwest::{Response, StatusCode};
use url::Url;

use crate::error::TransportError;

/// Make sure relative joins append to the base path instead of replacing its
/// last segment (`http://host/radarr` + `api/v3/queue`).
pub(crate) fn normalize_base(raw: &str) -> Result<Url, TransportError> {
    let mut url = Url::parse(raw.trim())?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

pub(crate) fn ensure_success(
    method: &'static str,
    url: &Url,
    response: Response,
) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(status_error(method, url, status))
    }
}

pub(crate) fn status_error(
    method: &'static str,
    url: &Url,
    status: StatusCode,
) -> TransportError {
    TransportError::Status {
        method,
        url: redact(url),
        status,
    }
}

/// Strip query strings before a URL ends up in logs or errors; some
/// deployments still pass the API key as `?apikey=`.
pub(crate) fn redact(url: &Url) -> String {
    let mut clean = url.clone();
    clean.set_query(None);
    clean.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_paths_gain_a_trailing_slash() {
        let url = normalize_base("http://nas:7878/radarr").unwrap();
        assert_eq!(
            url.join("api/v3/queue").unwrap().as_str(),
            "http://nas:7878/radarr/api/v3/queue"
        );

        let root = normalize_base("http://nas:7878").unwrap();
        assert_eq!(
            root.join("api/v3/queue").unwrap().as_str(),
            "http://nas:7878/api/v3/queue"
        );
    }

    #[test]
    fn redaction_drops_query() {
        let url =
            Url::parse("http://nas:7878/api/v3/queue?apikey=secret").unwrap();
        assert_eq!(redact(&url), "http://nas:7878/api/v3/queue");
    }
}
