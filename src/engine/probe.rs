//! Discovering a remote engine's API version.

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use super::tls::error_chain;
use crate::error::{ConnectionError, DockhandError};

/// Rewrite a leading `tcp://` to `https://`; other URLs pass through.
#[must_use]
pub fn https_endpoint(endpoint: &str) -> String {
    endpoint.strip_prefix("tcp://").map_or_else(
        || endpoint.to_owned(),
        |rest| format!("https://{rest}"),
    )
}

/// Ask the engine at `endpoint` for its API version via `GET /version`.
///
/// `endpoint` must already carry an HTTP scheme; see [`https_endpoint`].
///
/// # Errors
///
/// Returns `ConnectionError::VersionProbeFailed` if the request fails, the
/// body cannot be read or is not JSON, or the JSON has no string
/// `ApiVersion` field.
pub async fn probe_api_version(http: &Client, endpoint: &str) -> Result<String, DockhandError> {
    let url = format!("{}/version", endpoint.trim_end_matches('/'));
    let failed = |message: String| {
        DockhandError::from(ConnectionError::VersionProbeFailed {
            endpoint: endpoint.to_owned(),
            message,
        })
    };

    let response = http
        .get(&url)
        .send()
        .await
        .map_err(|e| failed(error_chain(&e)))?;
    let body = response.bytes().await.map_err(|e| failed(error_chain(&e)))?;

    let version = api_version_from_body(&body).map_err(failed)?;
    debug!(%endpoint, api_version = %version, "discovered engine API version");
    Ok(version)
}

/// Extract the `ApiVersion` string from a `/version` response body.
fn api_version_from_body(body: &[u8]) -> Result<String, String> {
    let parsed: Value = serde_json::from_slice(body).map_err(|e| {
        format!(
            "could not determine ApiVersion ({e}): {}",
            String::from_utf8_lossy(body)
        )
    })?;

    match parsed.get("ApiVersion") {
        Some(Value::String(version)) => Ok(version.clone()),
        _ => Err(format!("could not determine ApiVersion: {parsed}")),
    }
}
