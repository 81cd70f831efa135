//! The client handle for image pulls and builds.
//!
//! An [`EngineClient`] owns a resolved engine and an operation timeout.
//! Every pull or build runs inside its own [`RequestScope`], so concurrent
//! operations on clones of one client never share a deadline.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::{Handle, Runtime};
use tracing::debug;

use super::resolver::{default_strategies, resolve_transport};
use super::scope::RequestScope;
use super::strategy::ConnectStrategy;
use super::transport::{BuildOptions, ImageEngine, OpenStreamFuture, PullOptions, Transport};
use crate::config::AppConfig;
use crate::error::{ArchiveError, ConnectionError, DockhandError, Result};
use crate::image::ImageReference;
use crate::stream::{BuildEvent, EventStream, PullEvent, drain};

/// Timeout applied to each operation unless configured otherwise.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// A connected engine plus the timeout its operations run under.
#[derive(Debug)]
pub struct EngineClient<E = Transport> {
    engine: Arc<E>,
    timeout: Duration,
}

impl<E> Clone for EngineClient<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            timeout: self.timeout,
        }
    }
}

impl EngineClient<Transport> {
    /// Resolve a transport from `config` using the process environment.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error when no strategy connects.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let env = mockable::DefaultEnv::new();
        Self::connect_with(config, &env).await
    }

    /// Resolve a transport from `config`, reading variables from `env`.
    ///
    /// # Errors
    ///
    /// Returns the resolver's error when no strategy connects.
    pub async fn connect_with<V>(config: &AppConfig, env: &V) -> Result<Self>
    where
        V: mockable::Env + Sync,
    {
        let strategies = default_strategies(config, env);
        let candidates: Vec<&dyn ConnectStrategy> = strategies.iter().map(Box::as_ref).collect();
        let transport = resolve_transport(&candidates).await?;

        Ok(Self::new(transport).with_timeout(Duration::from_secs(config.engine.timeout_secs)))
    }
}

impl<E: ImageEngine> EngineClient<E> {
    /// Wrap an engine with the default operation timeout.
    #[must_use]
    pub fn new(engine: E) -> Self {
        Self {
            engine: Arc::new(engine),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Replace the per-operation timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The per-operation timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Start a scope whose deadline is [`Self::timeout`] from now.
    #[must_use]
    pub fn new_request_scope(&self) -> RequestScope {
        RequestScope::new(self.timeout)
    }

    /// Start pulling `image` and return the raw event stream.
    ///
    /// Only opening the request is bounded by the timeout; the caller owns
    /// the stream from then on.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the pull cannot be started, or
    /// `StreamError::TimedOut` if the engine does not answer in time.
    pub async fn pull_stream(
        &self,
        image: &ImageReference,
        options: &PullOptions,
    ) -> Result<EventStream<'_, PullEvent>> {
        let scope = self.new_request_scope();
        open(&scope, self.engine.pull_image(image, options)).await
    }

    /// Pull `image` with default options, passing each event to `on_event`.
    ///
    /// # Errors
    ///
    /// See [`Self::pull_with_options`].
    pub async fn pull<F>(&self, image: &ImageReference, on_event: F) -> Result<()>
    where
        F: FnMut(&ImageReference, &PullEvent) -> Result<()>,
    {
        self.pull_with_options(image, &PullOptions::default(), on_event)
            .await
    }

    /// Pull `image`, passing each event to `on_event` until the pull ends.
    ///
    /// # Errors
    ///
    /// Returns the engine's error if the pull cannot be started, a decode or
    /// transport error from the stream, `StreamError::TimedOut` once the
    /// operation outlives the timeout, or the callback's own error.
    pub async fn pull_with_options<F>(
        &self,
        image: &ImageReference,
        options: &PullOptions,
        mut on_event: F,
    ) -> Result<()>
    where
        F: FnMut(&ImageReference, &PullEvent) -> Result<()>,
    {
        debug!(image = %image, "pulling image");
        let scope = self.new_request_scope();
        let opened = open(&scope, self.engine.pull_image(image, options)).await;
        drain(opened, scope, |event| on_event(image, event)).await
    }

    /// Upload the tar archive at `archive` and return the build's stream.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::OpenFailed` if the archive cannot be read, and
    /// otherwise the same errors as [`Self::pull_stream`].
    pub async fn build_archive_stream(
        &self,
        archive: &Path,
        options: &BuildOptions,
    ) -> Result<EventStream<'_, BuildEvent>> {
        let context = read_archive(archive).await?;
        let scope = self.new_request_scope();
        open(&scope, self.engine.build_image(context, options)).await
    }

    /// Build from the tar archive at `archive`, passing each event to
    /// `on_event` until the build ends.
    ///
    /// The archive is only read; deleting it stays with the caller.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::OpenFailed` if the archive cannot be read, and
    /// otherwise the same errors as [`Self::pull_with_options`].
    pub async fn build_archive<F>(
        &self,
        archive: &Path,
        options: &BuildOptions,
        on_event: F,
    ) -> Result<()>
    where
        F: FnMut(&BuildEvent) -> Result<()>,
    {
        debug!(archive = %archive.display(), tags = ?options.tags, "building image");
        let scope = self.new_request_scope();
        let opened = match read_archive(archive).await {
            Ok(context) => open(&scope, self.engine.build_image(context, options)).await,
            Err(error) => Err(error),
        };
        drain(opened, scope, on_event).await
    }

    /// Blocking form of [`Self::pull_with_options`], run on `runtime`.
    ///
    /// Must not be called from within an asynchronous context. A runtime
    /// can be obtained from [`create_runtime`].
    ///
    /// ```ignore
    /// let runtime = dockhand::engine::create_runtime()?;
    /// client.pull_blocking(runtime.handle(), &image, &PullOptions::default(), log_pull_event)?;
    /// ```
    ///
    /// # Errors
    ///
    /// See [`Self::pull_with_options`].
    pub fn pull_blocking<F>(
        &self,
        runtime: &Handle,
        image: &ImageReference,
        options: &PullOptions,
        on_event: F,
    ) -> Result<()>
    where
        F: FnMut(&ImageReference, &PullEvent) -> Result<()>,
    {
        runtime.block_on(self.pull_with_options(image, options, on_event))
    }

    /// Blocking form of [`Self::build_archive`], run on `runtime`.
    ///
    /// Must not be called from within an asynchronous context.
    ///
    /// # Errors
    ///
    /// See [`Self::build_archive`].
    pub fn build_archive_blocking<F>(
        &self,
        runtime: &Handle,
        archive: &Path,
        options: &BuildOptions,
        on_event: F,
    ) -> Result<()>
    where
        F: FnMut(&BuildEvent) -> Result<()>,
    {
        runtime.block_on(self.build_archive(archive, options, on_event))
    }
}

/// Create a multi-threaded runtime for the blocking wrappers.
///
/// # Errors
///
/// Returns `ConnectionError::RuntimeCreationFailed` if the runtime cannot be
/// built.
pub fn create_runtime() -> Result<Runtime> {
    Runtime::new().map_err(|e| {
        DockhandError::from(ConnectionError::RuntimeCreationFailed {
            message: e.to_string(),
        })
    })
}

async fn open<T>(
    scope: &RequestScope,
    opening: OpenStreamFuture<'_, T>,
) -> Result<EventStream<'static, T>> {
    scope.guard(opening).await?
}

async fn read_archive(archive: &Path) -> Result<Bytes> {
    let contents = tokio::fs::read(archive).await.map_err(|e| ArchiveError::OpenFailed {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Bytes::from(contents))
}
