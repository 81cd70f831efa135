//! Configuration data types for dockhand.

use clap::ValueEnum;
use ortho_config::{OrthoConfig, OrthoResult, PostMergeContext, PostMergeHook};
use serde::{Deserialize, Serialize};

use crate::engine::DEFAULT_OPERATION_TIMEOUT;
use crate::error::ConfigError;
use crate::machine::DEFAULT_MACHINE_BINARY;

/// A way of reaching the engine, as named in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// The local engine named by configuration or the environment.
    Environment,
    /// A remote machine described by `docker-machine config`.
    Machine,
}

/// Engine connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// The local engine socket path or URL. Overrides the environment.
    pub socket: Option<String>,

    /// Seconds each pull or build may run before it is abandoned.
    pub timeout_secs: u64,

    /// Connection strategies, tried in order until one connects.
    pub strategies: Vec<StrategyKind>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket: None,
            timeout_secs: DEFAULT_OPERATION_TIMEOUT.as_secs(),
            strategies: vec![StrategyKind::Environment, StrategyKind::Machine],
        }
    }
}

impl EngineConfig {
    /// Check the values that the engine client relies on.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the timeout is zero or no
    /// strategy is listed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: String::from("engine.timeout_secs"),
                reason: String::from("must be greater than zero"),
            });
        }
        if self.strategies.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: String::from("engine.strategies"),
                reason: String::from("must list at least one strategy"),
            });
        }
        Ok(())
    }
}

/// Remote machine settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MachineConfig {
    /// The machine tool to run.
    pub binary: String,

    /// The machine to ask for; the tool's default machine when unset.
    pub name: Option<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            binary: String::from(DEFAULT_MACHINE_BINARY),
            name: None,
        }
    }
}

/// Root application configuration.
///
/// Loaded from configuration files, environment variables and command-line
/// arguments. The precedence order (lowest to highest) is: defaults,
/// configuration file, environment variables, command-line arguments.
///
/// Configuration files are discovered in this order:
/// 1. Path specified via `DOCKHAND_CONFIG_PATH` environment variable
/// 2. `.dockhand.toml` in the current working directory
/// 3. `.dockhand.toml` in the home directory
/// 4. `~/.config/dockhand/config.toml` (XDG default)
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(
    prefix = "DOCKHAND",
    post_merge_hook,
    discovery(
        app_name = "dockhand",
        env_var = "DOCKHAND_CONFIG_PATH",
        config_file_name = "config.toml",
        dotfile_name = ".dockhand.toml",
        config_cli_long = "config",
        config_cli_visible = true,
    )
)]
pub struct AppConfig {
    /// Engine connection settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub engine: EngineConfig,

    /// Remote machine settings.
    #[serde(default)]
    #[ortho_config(skip_cli)]
    pub machine: MachineConfig,
}

impl PostMergeHook for AppConfig {
    fn post_merge(&mut self, _ctx: &PostMergeContext) -> OrthoResult<()> {
        // An empty socket string means "not configured".
        if self.engine.socket.as_deref().is_some_and(str::is_empty) {
            self.engine.socket = None;
        }
        Ok(())
    }
}
