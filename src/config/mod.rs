//! Configuration system for dockhand.
//!
//! Configuration is merged by `ortho_config` with this precedence: CLI flags
//! override environment variables, which override configuration files,
//! which override defaults.
//!
//! The configuration file is expected at `~/.config/dockhand/config.toml`
//! by default.
//!
//! # Example Configuration
//!
//! ```toml
//! [engine]
//! socket = "unix:///run/user/1000/podman/podman.sock"
//! timeout_secs = 600
//! strategies = ["environment", "machine"]
//!
//! [machine]
//! binary = "docker-machine"
//! name = "dev"
//! ```

mod cli;
mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use cli::{BuildArgs, Cli, Commands, PullArgs};
pub use loader::{env_var_names, load_config, load_config_with_env};
pub use types::{AppConfig, EngineConfig, MachineConfig, StrategyKind};
