//! Container engine connection and image operations.
//!
//! A transport is chosen by trying connection strategies in order:
//!
//! 1. The local engine, at the socket given by `--engine-socket`, the
//!    config file or `DOCKHAND_ENGINE_SOCKET`, else `DOCKER_HOST`,
//!    `CONTAINER_HOST`, `PODMAN_HOST`, else the platform default.
//! 2. A remote machine described by `docker-machine config`, reached over
//!    mutually authenticated TLS at its probed API version.
//!
//! The first strategy to connect wins. The resulting [`Transport`] is
//! wrapped in an [`EngineClient`] that runs pulls and builds, each inside
//! its own [`RequestScope`].

mod client;
mod connection;
#[cfg(test)]
mod fake_engine;
mod probe;
mod remote;
mod resolver;
mod scope;
mod strategy;
mod tls;
mod transport;

pub use client::{DEFAULT_OPERATION_TIMEOUT, EngineClient, create_runtime};
pub use connection::{EngineConnector, SocketResolver};
pub use probe::{https_endpoint, probe_api_version};
pub use remote::RemoteEngine;
pub use resolver::{default_strategies, resolve_transport};
pub use scope::RequestScope;
pub use strategy::{ConnectFuture, ConnectStrategy, EnvironmentStrategy, FnStrategy, MachineStrategy};
pub use tls::TlsMaterials;
pub use transport::{BuildOptions, ImageEngine, OpenStreamFuture, PullOptions, Transport};
