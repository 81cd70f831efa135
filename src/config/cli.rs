//! Command-line argument definitions for dockhand.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use crate::image::DOCKER_LIBRARY_REGISTRY;

/// Command-line interface for dockhand.
#[derive(Debug, Parser)]
#[command(name = "dockhand")]
#[command(
    author,
    version,
    about = "Pull and build container images against a local or remote engine"
)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file.
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Container engine socket path or URL.
    #[arg(long, global = true)]
    pub engine_socket: Option<String>,

    /// Seconds each pull or build may run.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Pull an image from a registry.
    Pull(PullArgs),

    /// Build an image from files on the host.
    Build(BuildArgs),

    /// Report which engine transport was resolved.
    Version,
}

/// Arguments for the `pull` subcommand.
#[derive(Debug, Parser)]
pub struct PullArgs {
    /// Image name, such as `alpine` or `example/tool`.
    #[arg(required = true)]
    pub name: String,

    /// Image version tag. `latest` when omitted.
    #[arg(long, default_value = "")]
    pub version: String,

    /// Registry host and namespace.
    #[arg(long, default_value = DOCKER_LIBRARY_REGISTRY)]
    pub registry: String,

    /// Target platform, such as `linux/arm64`.
    #[arg(long)]
    pub platform: Option<String>,
}

/// Arguments for the `build` subcommand.
#[derive(Debug, Parser)]
#[expect(
    clippy::struct_excessive_bools,
    reason = "each flag maps to one engine build option"
)]
pub struct BuildArgs {
    /// Files to place at the root of the build context.
    #[arg(long = "file", required = true)]
    pub files: Vec<Utf8PathBuf>,

    /// Names to tag the built image with.
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Dockerfile path inside the build context.
    #[arg(long, default_value = "Dockerfile")]
    pub dockerfile: String,

    /// Squash the resulting layers into one.
    #[arg(long)]
    pub squash: bool,

    /// Keep intermediate containers after a successful build.
    #[arg(long)]
    pub no_rm: bool,

    /// Always remove intermediate containers.
    #[arg(long)]
    pub force_rm: bool,

    /// Always attempt to pull newer base images.
    #[arg(long)]
    pub pull: bool,

    /// Suppress verbose build output.
    #[arg(long)]
    pub quiet: bool,

    /// Do not use the build cache.
    #[arg(long)]
    pub no_cache: bool,
}
