//! Resolved engine transports and the image operations they support.
//!
//! A [`Transport`] is either a local `Bollard` client or a [`RemoteEngine`]
//! reached over mutually authenticated HTTPS. Both implement
//! [`ImageEngine`], which opens pull and build event streams.

use std::future::Future;
use std::pin::{Pin, pin};

use bollard::Docker;
use bollard::models::{BuildInfo, CreateImageInfo};
use bollard::query_parameters::{
    BuildImageOptions, BuildImageOptionsBuilder, CreateImageOptionsBuilder, TagImageOptionsBuilder,
};
use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use super::remote::RemoteEngine;
use crate::error::{DockhandError, StreamError};
use crate::image::ImageReference;
use crate::stream::{BuildEvent, EventStream, ProgressDetail, PullEvent};

/// Events buffered between a local build and its consumer.
const BUILD_EVENT_BUFFER: usize = 64;

/// Boxed future returned by [`ImageEngine`] implementors.
///
/// Resolves once the engine has accepted the request. The stream it yields
/// owns everything it needs, so it may outlive the engine borrow.
pub type OpenStreamFuture<'a, E> =
    Pin<Box<dyn Future<Output = Result<EventStream<'static, E>, DockhandError>> + Send + 'a>>;

/// Options for pulling an image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOptions {
    /// Target platform, such as `linux/arm64`. The engine's own platform
    /// when unset.
    pub platform: Option<String>,
}

/// Options for building an image, passed through to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "mirrors the engine's boolean build parameters"
)]
pub struct BuildOptions {
    /// Names to tag the built image with, all of which are applied.
    pub tags: Vec<String>,
    /// Path of the Dockerfile inside the build context.
    pub dockerfile: String,
    /// Squash the resulting layers into one.
    pub squash: bool,
    /// Remove intermediate containers after a successful build.
    pub remove: bool,
    /// Always remove intermediate containers, even on failure.
    pub force_remove: bool,
    /// Always attempt to pull newer versions of base images.
    pub pull_parent: bool,
    /// Suppress verbose build output.
    pub suppress_output: bool,
    /// Do not use the build cache.
    pub no_cache: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            dockerfile: String::from("Dockerfile"),
            squash: false,
            remove: true,
            force_remove: false,
            pull_parent: false,
            suppress_output: false,
            no_cache: false,
        }
    }
}

/// Behaviour required to start image pulls and builds.
///
/// This abstraction keeps the client handle testable without a running
/// engine.
pub trait ImageEngine: Send + Sync {
    /// Start pulling `image` and return its progress stream.
    fn pull_image(
        &self,
        image: &ImageReference,
        options: &PullOptions,
    ) -> OpenStreamFuture<'_, PullEvent>;

    /// Start building from a tar build context and return its output stream.
    fn build_image(&self, context: Bytes, options: &BuildOptions)
    -> OpenStreamFuture<'_, BuildEvent>;
}


impl ImageEngine for Docker {
    fn pull_image(
        &self,
        image: &ImageReference,
        options: &PullOptions,
    ) -> OpenStreamFuture<'_, PullEvent> {
        let builder = CreateImageOptionsBuilder::default()
            .from_image(&image.repository())
            .tag(image.pull_tag());
        let query = match &options.platform {
            Some(platform) => builder.platform(platform).build(),
            None => builder.build(),
        };

        Box::pin(async move {
            let items = self.create_image(Some(query), None, None).map(pull_event);
            let events: EventStream<'static, PullEvent> = Box::pin(items);
            Ok(events)
        })
    }

    fn build_image(
        &self,
        context: Bytes,
        options: &BuildOptions,
    ) -> OpenStreamFuture<'_, BuildEvent> {
        let query = build_query(options);
        let retags = retag_plan(&options.tags);
        let docker = self.clone();

        Box::pin(async move {
            let (sender, receiver) = mpsc::channel(BUILD_EVENT_BUFFER);
            tokio::spawn(async move {
                let items = Docker::build_image(&docker, query, None, Some(bollard::body_full(context)));
                if forward_build(items, &sender).await {
                    apply_tags(&docker, &retags, &sender).await;
                }
            });
            Ok(received_events(receiver))
        })
    }
}

fn build_query(options: &BuildOptions) -> BuildImageOptions {
    let mut builder = BuildImageOptionsBuilder::default()
        .dockerfile(&options.dockerfile)
        .rm(options.remove)
        .forcerm(options.force_remove)
        .q(options.suppress_output)
        .nocache(options.no_cache)
        .squash(options.squash);
    if let Some(tag) = options.tags.first() {
        builder = builder.t(tag);
    }
    if options.pull_parent {
        builder = builder.pull("true");
    }
    builder.build()
}

/// A name to add to a freshly built image.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Retag {
    source: String,
    repo: String,
    tag: String,
}

/// `Bollard` sends a single `t` parameter, so every name after the first
/// is applied with a tag request once the build succeeds.
fn retag_plan(tags: &[String]) -> Vec<Retag> {
    let Some((first, rest)) = tags.split_first() else {
        return Vec::new();
    };
    rest.iter()
        .map(|name| {
            let (repo, tag) = split_tag(name);
            Retag {
                source: first.clone(),
                repo: repo.to_owned(),
                tag: tag.to_owned(),
            }
        })
        .collect()
}

/// Split `repo:tag`, ignoring a colon that belongs to a registry port.
fn split_tag(name: &str) -> (&str, &str) {
    match name.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (name, "latest"),
    }
}

/// Relay build output to `sender` until the build ends or the consumer
/// goes away. Returns whether the build ended without an error event.
async fn forward_build<S>(items: S, sender: &mpsc::Sender<Result<BuildEvent, StreamError>>) -> bool
where
    S: Stream<Item = Result<BuildInfo, bollard::errors::Error>>,
{
    let mut pending = pin!(items);
    let mut succeeded = true;
    loop {
        let next = tokio::select! {
            () = sender.closed() => return false,
            next = pending.next() => next,
        };
        let Some(item) = next else {
            return succeeded;
        };
        let event = build_event(item);
        succeeded &= event.as_ref().is_ok_and(|built| built.error.is_empty());
        if sender.send(event).await.is_err() {
            return false;
        }
    }
}

async fn apply_tags(
    docker: &Docker,
    retags: &[Retag],
    sender: &mpsc::Sender<Result<BuildEvent, StreamError>>,
) {
    for retag in retags {
        debug!(source = %retag.source, repo = %retag.repo, tag = %retag.tag, "tagging built image");
        let options = TagImageOptionsBuilder::default()
            .repo(&retag.repo)
            .tag(&retag.tag)
            .build();
        if let Err(error) = docker.tag_image(&retag.source, Some(options)).await {
            if sender.send(Err(stream_error(error, "tag"))).await.is_err() {
                debug!("build consumer left before the tag failure was reported");
            }
            return;
        }
    }
}

fn received_events<T: Send + 'static>(
    receiver: mpsc::Receiver<Result<T, StreamError>>,
) -> EventStream<'static, T> {
    Box::pin(stream::unfold(receiver, |mut open| async move {
        open.recv().await.map(|item| (item, open))
    }))
}

/// Engine-reported failures arrive as stream errors from `Bollard`; they are
/// delivered as events carrying `error`, as the remote transport does.
fn pull_event(item: Result<CreateImageInfo, bollard::errors::Error>) -> Result<PullEvent, StreamError> {
    match item {
        Ok(info) => {
            let (current, total) = info.progress_detail.map_or((0, 0), |detail| {
                (
                    detail.current.unwrap_or_default(),
                    detail.total.unwrap_or_default(),
                )
            });
            Ok(PullEvent {
                status: info.status.unwrap_or_default(),
                progress_detail: ProgressDetail { current, total },
                ..PullEvent::default()
            })
        }
        Err(bollard::errors::Error::DockerStreamError { error }) => Ok(PullEvent {
            error,
            ..PullEvent::default()
        }),
        Err(other) => Err(stream_error(other, "pull")),
    }
}

fn build_event(item: Result<BuildInfo, bollard::errors::Error>) -> Result<BuildEvent, StreamError> {
    match item {
        Ok(info) => Ok(BuildEvent {
            stream: info.stream.unwrap_or_default(),
            ..BuildEvent::default()
        }),
        Err(bollard::errors::Error::DockerStreamError { error }) => Ok(BuildEvent {
            error,
            ..BuildEvent::default()
        }),
        Err(other) => Err(stream_error(other, "build")),
    }
}

fn stream_error(error: bollard::errors::Error, operation: &str) -> StreamError {
    match error {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } => StreamError::RequestFailed {
            operation: operation.to_owned(),
            message: format!("engine returned {status_code}: {message}"),
        },
        other => StreamError::Transport {
            message: other.to_string(),
        },
    }
}

/// A connected engine, as chosen by the transport resolver.
#[derive(Debug, Clone)]
pub enum Transport {
    /// An engine reached through a local socket or plain TCP.
    Local(Docker),
    /// A machine engine reached over TLS with a probed API version.
    Remote(RemoteEngine),
}

impl Transport {
    /// `"local"` or `"remote"`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Local(_) => "local",
            Self::Remote(_) => "remote",
        }
    }

    /// The API version discovered for a remote engine.
    ///
    /// Local engines negotiate per request and report `None`.
    #[must_use]
    pub fn api_version(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Remote(remote) => Some(remote.api_version()),
        }
    }
}

impl ImageEngine for Transport {
    fn pull_image(
        &self,
        image: &ImageReference,
        options: &PullOptions,
    ) -> OpenStreamFuture<'_, PullEvent> {
        match self {
            Self::Local(docker) => docker.pull_image(image, options),
            Self::Remote(remote) => remote.pull_image(image, options),
        }
    }

    fn build_image(
        &self,
        context: Bytes,
        options: &BuildOptions,
    ) -> OpenStreamFuture<'_, BuildEvent> {
        match self {
            Self::Local(docker) => ImageEngine::build_image(docker, context, options),
            Self::Remote(remote) => remote.build_image(context, options),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::engine::fake_engine::{FakeEngine, FakeResponse};

    fn local(engine: &FakeEngine) -> Docker {
        Docker::connect_with_http(engine.url(), 5, bollard::API_DEFAULT_VERSION)
            .expect("http client configuration should build")
    }

    #[rstest]
    fn build_options_default_removes_intermediates() {
        let options = BuildOptions::default();

        assert_eq!(options.dockerfile, "Dockerfile");
        assert!(options.remove);
        assert!(!options.force_remove);
        assert!(!options.squash);
        assert!(options.tags.is_empty());
    }

    #[rstest]
    fn pull_items_copy_engine_fields() {
        let info = CreateImageInfo {
            status: Some(String::from("Downloading")),
            progress_detail: Some(bollard::models::ProgressDetail {
                current: Some(1),
                total: Some(2),
            }),
            id: Some(String::from("layer")),
            ..CreateImageInfo::default()
        };

        let event = pull_event(Ok(info)).expect("item should convert");

        assert_eq!(event.status, "Downloading");
        assert_eq!(event.progress_detail, ProgressDetail { current: 1, total: 2 });
        assert!(event.error.is_empty());
    }

    #[rstest]
    fn engine_reported_errors_become_events() {
        let item = Err(bollard::errors::Error::DockerStreamError {
            error: String::from("manifest unknown"),
        });

        let event = pull_event(item).expect("engine errors are delivered as events");

        assert_eq!(event.error, "manifest unknown");
        assert!(event.status.is_empty());
    }

    #[rstest]
    fn server_errors_become_request_failures() {
        let item = Err(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: String::from("pull access denied"),
        });

        let error = build_event(item).expect_err("item should fail");

        assert!(matches!(
            error,
            StreamError::RequestFailed { operation, message }
                if operation == "build" && message == "engine returned 404: pull access denied"
        ));
    }

    #[rstest]
    #[case::plain("app:latest", ("app", "latest"))]
    #[case::untagged("app", ("app", "latest"))]
    #[case::registry_port("registry:5000/app", ("registry:5000/app", "latest"))]
    #[case::registry_port_and_tag("registry:5000/app:v2", ("registry:5000/app", "v2"))]
    fn tags_split_at_the_last_colon(#[case] name: &str, #[case] expected: (&str, &str)) {
        assert_eq!(split_tag(name), expected);
    }

    #[rstest]
    fn later_tags_are_applied_from_the_first() {
        let tags = vec![
            String::from("app:dev"),
            String::from("app:latest"),
            String::from("mirror/app"),
        ];

        let plan = retag_plan(&tags);

        assert_eq!(
            plan,
            vec![
                Retag {
                    source: String::from("app:dev"),
                    repo: String::from("app"),
                    tag: String::from("latest"),
                },
                Retag {
                    source: String::from("app:dev"),
                    repo: String::from("mirror/app"),
                    tag: String::from("latest"),
                },
            ]
        );
        assert!(retag_plan(&tags[..1]).is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn local_pull_delivers_engine_errors_as_events() {
        let engine = FakeEngine::serve(vec![FakeResponse::ok(&[
            "{\"status\":\"Pulling\",\"progressDetail\":{\"current\":3,\"total\":9}}\n",
            "{\"errorDetail\":{\"message\":\"boom\"},\"error\":\"boom\"}\n",
        ])])
        .await;
        let docker = local(&engine);
        let image = ImageReference::docker_library("alpine", "3.20");

        let events = ImageEngine::pull_image(&docker, &image, &PullOptions::default())
            .await
            .expect("pull should start");
        let items: Vec<Result<PullEvent, StreamError>> = events.collect().await;

        assert_eq!(items.len(), 2, "unexpected items: {items:?}");
        let first = items.first().and_then(|item| item.as_ref().ok());
        assert_eq!(first.map(|event| event.progress_detail.total), Some(9));
        let last = items.last().and_then(|item| item.as_ref().ok());
        assert_eq!(last.map(|event| event.error.as_str()), Some("boom"));
    }

    #[rstest]
    #[tokio::test]
    async fn local_build_applies_every_tag() {
        let engine = FakeEngine::serve(vec![
            FakeResponse::ok(&["{\"stream\":\"Successfully built 0123\\n\"}\n"]),
            FakeResponse::empty(201),
        ])
        .await;
        let docker = local(&engine);
        let options = BuildOptions {
            tags: vec![String::from("app:dev"), String::from("app:latest")],
            ..BuildOptions::default()
        };

        let events = ImageEngine::build_image(&docker, Bytes::from_static(b"tar bytes"), &options)
            .await
            .expect("build should start");
        let items: Vec<Result<BuildEvent, StreamError>> = events.collect().await;

        assert!(items.iter().all(Result::is_ok), "unexpected items: {items:?}");
        let requests = engine.requests();
        assert_eq!(requests.len(), 2);
        let build = requests.first().expect("engine should record the build");
        assert!(build.request_line.contains("/build?"), "{}", build.request_line);
        assert!(build.request_line.contains("t=app%3Adev"), "{}", build.request_line);
        assert_eq!(build.body, b"tar bytes");
        let tag = requests.get(1).expect("engine should record the tag request");
        assert!(
            tag.request_line
                .starts_with("POST /images/app:dev/tag?repo=app&tag=latest "),
            "{}",
            tag.request_line
        );
    }

    #[rstest]
    #[tokio::test]
    async fn failed_local_build_is_not_tagged() {
        let engine = FakeEngine::serve(vec![FakeResponse::ok(&[
            "{\"stream\":\"Step 1/2 : FROM scratch\\n\"}\n",
            "{\"errorDetail\":{\"message\":\"no such file\"},\"error\":\"no such file\"}\n",
        ])])
        .await;
        let docker = local(&engine);
        let options = BuildOptions {
            tags: vec![String::from("app:dev"), String::from("app:latest")],
            ..BuildOptions::default()
        };

        let events = ImageEngine::build_image(&docker, Bytes::from_static(b"tar bytes"), &options)
            .await
            .expect("build should start");
        let items: Vec<Result<BuildEvent, StreamError>> = events.collect().await;

        let errors: Vec<&str> = items
            .iter()
            .filter_map(|item| item.as_ref().ok())
            .map(|event| event.error.as_str())
            .filter(|error| !error.is_empty())
            .collect();
        assert_eq!(errors, vec!["no such file"]);
        assert_eq!(engine.requests().len(), 1);
    }

    #[rstest]
    fn local_transport_has_no_probed_version() {
        let docker = Docker::connect_with_http("http://localhost:2375", 5, bollard::API_DEFAULT_VERSION)
            .expect("http client configuration should build");
        let transport = Transport::Local(docker);

        assert_eq!(transport.kind(), "local");
        assert_eq!(transport.api_version(), None);
    }
}
