//! Ways of reaching an engine, tried in order by the resolver.

use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use super::connection::{EngineConnector, SocketResolver};
use super::probe::{https_endpoint, probe_api_version};
use super::remote::RemoteEngine;
use super::tls::TlsMaterials;
use super::transport::Transport;
use crate::error::DockhandError;
use crate::machine::{MachineConfigSource, parse_machine_config};

/// Boxed future returned by [`ConnectStrategy::connect`].
pub type ConnectFuture<'a> = Pin<Box<dyn Future<Output = Result<Transport, DockhandError>> + Send + 'a>>;

/// One candidate way of connecting to an engine.
pub trait ConnectStrategy: Send + Sync {
    /// Short name used in log output.
    fn name(&self) -> &str;

    /// Attempt to produce a connected transport.
    fn connect(&self) -> ConnectFuture<'_>;
}

/// A strategy backed by a closure.
///
/// # Example
///
/// ```ignore
/// use dockhand::engine::{EngineConnector, FnStrategy, Transport};
///
/// let strategy = FnStrategy::new("fixed", || async {
///     EngineConnector::connect("unix:///run/docker.sock").map(Transport::Local)
/// });
/// ```
pub struct FnStrategy<F> {
    name: String,
    attempt: F,
}

impl<F> FnStrategy<F> {
    /// Wrap `attempt` under `name`.
    pub fn new(name: impl Into<String>, attempt: F) -> Self {
        Self {
            name: name.into(),
            attempt,
        }
    }
}

impl<F, Fut> ConnectStrategy for FnStrategy<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Transport, DockhandError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn connect(&self) -> ConnectFuture<'_> {
        Box::pin((self.attempt)())
    }
}

/// Connect to the local engine named by configuration or the environment.
///
/// The endpoint is, in order: the explicitly configured socket, the first
/// non-empty of `DOCKER_HOST`, `CONTAINER_HOST` and `PODMAN_HOST`, then the
/// platform default. The engine must answer a ping before the strategy
/// succeeds.
pub struct EnvironmentStrategy<'a, E: mockable::Env> {
    env: &'a E,
    config_socket: Option<String>,
}

impl<'a, E: mockable::Env> EnvironmentStrategy<'a, E> {
    /// Create the strategy over `env`, preferring `config_socket` when set.
    #[must_use]
    pub const fn new(env: &'a E, config_socket: Option<String>) -> Self {
        Self { env, config_socket }
    }

    /// The endpoint this strategy would connect to right now.
    #[must_use]
    pub fn endpoint(&self) -> String {
        let resolver = SocketResolver::new(self.env);
        EngineConnector::resolve_socket(self.config_socket.as_deref(), &resolver)
    }
}

impl<E: mockable::Env + Sync> ConnectStrategy for EnvironmentStrategy<'_, E> {
    fn name(&self) -> &'static str {
        "environment"
    }

    fn connect(&self) -> ConnectFuture<'_> {
        let socket = self.endpoint();
        Box::pin(async move {
            debug!(%socket, "connecting to local engine");
            let docker = EngineConnector::connect_and_verify(&socket).await?;
            Ok(Transport::Local(docker))
        })
    }
}

/// Connect to a remote machine over mutually authenticated TLS.
///
/// The machine's endpoint and certificate paths come from `source`. Once
/// the TLS material is loaded the engine is asked for its API version,
/// which all later requests are issued against.
pub struct MachineStrategy<S> {
    source: S,
}

impl<S: MachineConfigSource> MachineStrategy<S> {
    /// Create the strategy over a configuration source.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self { source }
    }

    async fn attempt(&self) -> Result<Transport, DockhandError> {
        let lines = self.source.config_lines().await?;
        let profile = parse_machine_config(&lines);
        profile.validate_for_tls()?;

        let materials = TlsMaterials::load(&profile)?;
        let http = materials.http_client()?;
        let endpoint = https_endpoint(profile.endpoint_url());
        let api_version = probe_api_version(&http, &endpoint).await?;

        debug!(%endpoint, %api_version, "connected to remote machine");
        Ok(Transport::Remote(RemoteEngine::new(endpoint, api_version, http)))
    }
}

impl<S: MachineConfigSource + Send + Sync> ConnectStrategy for MachineStrategy<S> {
    fn name(&self) -> &'static str {
        "machine"
    }

    fn connect(&self) -> ConnectFuture<'_> {
        Box::pin(self.attempt())
    }
}
