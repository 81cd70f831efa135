//! Configuration loading with layered precedence.
//!
//! Precedence, lowest to highest: application defaults, configuration file,
//! environment variables, command-line arguments.
//!
//! Layers are composed with `MergeComposer` directly rather than through the
//! derived `load()`, because the `Cli` struct owns subcommand parsing and
//! because typed environment values must fail fast instead of being ignored.
//!
//! # Environment Variable Handling
//!
//! Empty variables are treated as unset. String fields such as
//! `DOCKHAND_ENGINE_SOCKET` are always accepted. Typed
//! fields such as `DOCKHAND_ENGINE_TIMEOUT_SECS` must parse, or loading
//! fails with `ConfigError::InvalidValue`.

use camino::Utf8PathBuf;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use mockable::Env;
use ortho_config::discovery::ConfigDiscovery;
use ortho_config::serde_json::{self, Map, Value};
use ortho_config::{MergeComposer, toml};
use tracing::debug;

use crate::config::{AppConfig, Cli};
use crate::error::{ConfigError, Result};

/// The type of value expected from an environment variable.
#[derive(Clone, Copy)]
enum EnvVarType {
    /// String value (always accepted).
    String,
    /// Unsigned 64-bit integer. Invalid values return an error.
    U64,
    /// Comma-separated list of strings.
    List,
}

/// Specification for a single environment variable mapping.
struct EnvVarSpec {
    /// The environment variable name.
    env_var: &'static str,
    /// The JSON path segments (e.g., `["engine", "timeout_secs"]`).
    path: &'static [&'static str],
    /// The expected value type.
    var_type: EnvVarType,
}

const ENV_VAR_SPECS: &[EnvVarSpec] = &[
    EnvVarSpec {
        env_var: "DOCKHAND_ENGINE_SOCKET",
        path: &["engine", "socket"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKHAND_ENGINE_TIMEOUT_SECS",
        path: &["engine", "timeout_secs"],
        var_type: EnvVarType::U64,
    },
    EnvVarSpec {
        env_var: "DOCKHAND_ENGINE_STRATEGIES",
        path: &["engine", "strategies"],
        var_type: EnvVarType::List,
    },
    EnvVarSpec {
        env_var: "DOCKHAND_MACHINE_BINARY",
        path: &["machine", "binary"],
        var_type: EnvVarType::String,
    },
    EnvVarSpec {
        env_var: "DOCKHAND_MACHINE_NAME",
        path: &["machine", "name"],
        var_type: EnvVarType::String,
    },
];

/// Returns the environment variable names recognised by the config loader.
///
/// Tests use this to clear every `DOCKHAND_*` variable without keeping a
/// separate list in sync.
#[must_use]
pub fn env_var_names() -> Vec<&'static str> {
    ENV_VAR_SPECS.iter().map(|spec| spec.env_var).collect()
}

/// Read a configuration file and push it to the composer.
fn load_config_file(path: &Utf8PathBuf, composer: &mut MergeComposer) -> Result<()> {
    let current_dir = Utf8PathBuf::from(".");
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| current_dir.as_ref());
    let file_name = path.file_name().unwrap_or(path.as_str());

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|e| {
        ConfigError::ParseError {
            message: format!("failed to open directory {parent}: {e}"),
        }
    })?;

    let content = dir
        .read_to_string(file_name)
        .map_err(|e| ConfigError::ParseError {
            message: format!("failed to read {path}: {e}"),
        })?;

    let value =
        toml::from_str::<serde_json::Value>(&content).map_err(|e| ConfigError::ParseError {
            message: format!("failed to parse {path}: {e}"),
        })?;

    debug!(%path, "loaded configuration file");
    composer.push_file(value, Some(path.clone()));
    Ok(())
}

/// Load configuration from the process environment and `cli`.
///
/// # Errors
///
/// See [`load_config_with_env`].
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    load_config_with_env(cli, &mockable::DefaultEnv::new())
}

/// Load configuration with full layer precedence, reading variables from
/// `env`.
///
/// Sources, lowest to highest:
/// 1. Application defaults
/// 2. The file given by `--config`, or the first discovered of
///    `DOCKHAND_CONFIG_PATH`, `.dockhand.toml` and
///    `~/.config/dockhand/config.toml`
/// 3. `DOCKHAND_*` environment variables
/// 4. Command-line arguments
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if `--config` names a missing file,
/// `ConfigError::ParseError` for an unreadable or malformed file,
/// `ConfigError::InvalidValue` for an unparseable typed environment value or
/// an invalid merged value, and `ConfigError::OrthoConfig` if the layers
/// cannot be merged.
pub fn load_config_with_env<E: Env>(cli: &Cli, env: &E) -> Result<AppConfig> {
    let mut composer = MergeComposer::new();

    let defaults =
        serde_json::to_value(AppConfig::default()).map_err(|e| ConfigError::ParseError {
            message: format!("failed to serialise defaults: {e}"),
        })?;
    composer.push_defaults(defaults);

    if let Some(path) = config_file_path(cli)? {
        load_config_file(&path, &mut composer)?;
    }

    let env_values = collect_env_vars(env)?;
    if !env_values.is_null() {
        composer.push_environment(env_values);
    }

    let cli_overrides = build_cli_overrides(cli);
    if !cli_overrides.is_null() {
        composer.push_cli(cli_overrides);
    }

    let config =
        AppConfig::merge_from_layers(composer.layers()).map_err(ConfigError::OrthoConfig)?;
    config.engine.validate()?;
    Ok(config)
}

/// The explicit `--config` path, or the first discovered candidate.
fn config_file_path(cli: &Cli) -> Result<Option<Utf8PathBuf>> {
    if let Some(path) = &cli.config {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.clone().into_std_path_buf(),
            }
            .into());
        }
        return Ok(Some(path.clone()));
    }

    let discovery = ConfigDiscovery::builder("dockhand")
        .env_var("DOCKHAND_CONFIG_PATH")
        .config_file_name("config.toml")
        .dotfile_name(".dockhand.toml")
        .build();
    Ok(discovery
        .candidates()
        .into_iter()
        .filter(|p| p.exists())
        .find_map(|p| Utf8PathBuf::try_from(p).ok()))
}

/// Collect `DOCKHAND_*` variables into a JSON value shaped like `AppConfig`.
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a typed variable does not parse.
fn collect_env_vars<E: Env>(env: &E) -> Result<Value> {
    let mut root = Map::new();

    for spec in ENV_VAR_SPECS {
        let Some(raw_value) = env.string(spec.env_var).filter(|v| !v.is_empty()) else {
            continue;
        };

        let json_value = match spec.var_type {
            EnvVarType::String => Value::String(raw_value),
            EnvVarType::U64 => match raw_value.parse::<u64>() {
                Ok(n) => Value::Number(n.into()),
                Err(_) => {
                    return Err(ConfigError::InvalidValue {
                        field: spec.env_var.to_owned(),
                        reason: format!("expected unsigned integer, got '{raw_value}'"),
                    }
                    .into());
                }
            },
            EnvVarType::List => Value::Array(
                raw_value
                    .split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(|item| Value::String(item.to_lowercase()))
                    .collect(),
            ),
        };

        insert_at_path(&mut root, spec.path, json_value);
    }

    if root.is_empty() {
        Ok(Value::Null)
    } else {
        Ok(Value::Object(root))
    }
}

/// Insert a value at a nested path in a JSON map, creating intermediate
/// objects as needed.
fn insert_at_path(root: &mut Map<String, Value>, path: &[&str], value: Value) {
    let Some((&field, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for &segment in parents {
        let entry = current
            .entry(segment.to_owned())
            .or_insert_with(|| Value::Object(Map::new()));
        let Some(obj) = entry.as_object_mut() else {
            return;
        };
        current = obj;
    }

    current.insert(field.to_owned(), value);
}

/// Build a JSON value containing CLI overrides.
fn build_cli_overrides(cli: &Cli) -> Value {
    let mut engine = Map::new();

    if let Some(socket) = &cli.engine_socket {
        engine.insert(String::from("socket"), Value::String(socket.clone()));
    }
    if let Some(seconds) = cli.timeout_secs {
        engine.insert(String::from("timeout_secs"), Value::Number(seconds.into()));
    }

    if engine.is_empty() {
        return Value::Null;
    }
    let mut overrides = Map::new();
    overrides.insert(String::from("engine"), Value::Object(engine));
    Value::Object(overrides)
}
