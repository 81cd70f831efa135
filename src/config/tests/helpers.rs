//! Shared fixtures and helper functions for config tests.

use std::io::Write;

use camino::Utf8PathBuf;
use mockable::MockEnv;
use rstest::fixture;
use tempfile::NamedTempFile;

use crate::config::{AppConfig, Cli, Commands};

/// Fixture providing an `AppConfig` parsed from a full TOML example.
#[fixture]
pub fn app_config_from_full_toml() -> AppConfig {
    let toml = r#"
        [engine]
        socket = "unix:///run/podman/podman.sock"
        timeout_secs = 120
        strategies = ["machine"]

        [machine]
        binary = "/opt/bin/docker-machine"
        name = "dev"
    "#;

    ortho_config::toml::from_str(toml).expect("TOML parsing should succeed")
}

/// A config file holding `contents`, deleted when dropped.
pub fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file should be created");
    file.write_all(contents.as_bytes())
        .expect("config should be written");
    file
}

/// A CLI invocation of `version` that points at `file`.
pub fn cli_for(file: &NamedTempFile) -> Cli {
    let path = Utf8PathBuf::from_path_buf(file.path().to_path_buf())
        .expect("temp path should be UTF-8");
    Cli {
        command: Commands::Version,
        config: Some(path),
        engine_socket: None,
        timeout_secs: None,
    }
}

/// An environment holding exactly `vars`.
pub fn env_with(vars: &[(&'static str, &'static str)]) -> MockEnv {
    let owned: Vec<(&'static str, &'static str)> = vars.to_vec();
    let mut env = MockEnv::new();
    env.expect_string().returning(move |key| {
        owned
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| String::from(*value))
    });
    env
}
