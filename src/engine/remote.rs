//! Engine access over HTTPS for remote machines.
//!
//! Machine engines require client certificates, which the local `Bollard`
//! transport cannot present with a caller-supplied trust pool. Requests are
//! therefore issued with the `reqwest` client built from the machine's TLS
//! material, against the versioned API path the engine reported.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::tls::error_chain;
use super::transport::{BuildOptions, ImageEngine, OpenStreamFuture, PullOptions};
use crate::error::{DockhandError, StreamError};
use crate::image::ImageReference;
use crate::stream::ndjson::decode_events;
use crate::stream::{BuildEvent, EventStream, PullEvent};

const TAR_CONTENT_TYPE: &str = "application/x-tar";

/// A remote engine bound to an endpoint, an API version and a TLS client.
#[derive(Debug, Clone)]
pub struct RemoteEngine {
    base_url: String,
    api_version: String,
    http: Client,
}

impl RemoteEngine {
    /// Bind to `base_url` (an `https://` URL) speaking `api_version`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_version: impl Into<String>, http: Client) -> Self {
        Self {
            base_url: base_url.into(),
            api_version: api_version.into(),
            http,
        }
    }

    /// The engine's base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The API version requests are issued against.
    #[must_use]
    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/v{}/{path}",
            self.base_url.trim_end_matches('/'),
            self.api_version
        )
    }

    async fn open<E>(
        request: RequestBuilder,
        operation: &'static str,
    ) -> Result<EventStream<'static, E>, DockhandError>
    where
        E: DeserializeOwned + Send + 'static,
    {
        let response = request
            .send()
            .await
            .map_err(|e| request_failed(operation, error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = failure_message(status, response).await;
            return Err(request_failed(operation, message));
        }

        debug!(operation, %status, "engine accepted request");
        Ok(decode_events(response.bytes_stream()))
    }
}

impl ImageEngine for RemoteEngine {
    fn pull_image(
        &self,
        image: &ImageReference,
        options: &PullOptions,
    ) -> OpenStreamFuture<'_, PullEvent> {
        let mut query = vec![
            ("fromImage", image.repository()),
            ("tag", image.pull_tag().to_owned()),
        ];
        if let Some(platform) = &options.platform {
            query.push(("platform", platform.clone()));
        }
        let request = self.http.post(self.url("images/create")).query(&query);

        Box::pin(async move { Self::open(request, "pull").await })
    }

    fn build_image(
        &self,
        context: Bytes,
        options: &BuildOptions,
    ) -> OpenStreamFuture<'_, BuildEvent> {
        let request = self
            .http
            .post(self.url("build"))
            .query(&build_query(options))
            .header(CONTENT_TYPE, TAR_CONTENT_TYPE)
            .body(context);

        Box::pin(async move { Self::open(request, "build").await })
    }
}

fn build_query(options: &BuildOptions) -> Vec<(&'static str, String)> {
    let flag = |value: bool| String::from(if value { "true" } else { "false" });
    let mut query: Vec<(&'static str, String)> = options
        .tags
        .iter()
        .map(|tag| ("t", tag.clone()))
        .collect();
    query.extend([
        ("dockerfile", options.dockerfile.clone()),
        ("rm", flag(options.remove)),
        ("forcerm", flag(options.force_remove)),
        ("pull", flag(options.pull_parent)),
        ("squash", flag(options.squash)),
        ("q", flag(options.suppress_output)),
        ("nocache", flag(options.no_cache)),
    ]);
    query
}

/// Describe a refused request, preferring the engine's `message` field.
async fn failure_message(status: StatusCode, response: Response) -> String {
    let body = response.bytes().await.unwrap_or_default();
    let detail = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value.get("message")?.as_str().map(String::from))
        .unwrap_or_else(|| String::from_utf8_lossy(&body).trim().to_owned());
    format!("engine returned {status}: {detail}")
}

fn request_failed(operation: &str, message: String) -> DockhandError {
    DockhandError::from(StreamError::RequestFailed {
        operation: operation.to_owned(),
        message,
    })
}
