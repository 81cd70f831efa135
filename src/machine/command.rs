//! Running the machine tool to obtain its configuration lines.

use std::future::Future;
use std::pin::Pin;

use tokio::process::Command;
use tracing::debug;

use crate::error::{ConnectionError, DockhandError};

/// Default name of the machine tool binary.
pub const DEFAULT_MACHINE_BINARY: &str = "docker-machine";

/// Boxed future type returned by [`MachineConfigSource`] implementors.
pub type MachineConfigFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<String>, DockhandError>> + Send + 'a>>;

/// Behaviour required to fetch raw machine configuration lines.
///
/// This abstraction keeps the remote-machine strategy testable without the
/// tool installed.
pub trait MachineConfigSource {
    /// Produce the tool's `key=value` output, one entry per line.
    fn config_lines(&self) -> MachineConfigFuture<'_>;
}

/// Invokes `<binary> config [machine-name]` as a child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineCommand {
    binary: String,
    machine_name: Option<String>,
}

impl Default for MachineCommand {
    fn default() -> Self {
        Self::new(DEFAULT_MACHINE_BINARY, None)
    }
}

impl MachineCommand {
    /// Create a command for the given binary and optional machine name.
    #[must_use]
    pub fn new(binary: impl Into<String>, machine_name: Option<String>) -> Self {
        Self {
            binary: binary.into(),
            machine_name,
        }
    }

    /// The binary that will be executed.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// The machine whose configuration is requested, if any.
    #[must_use]
    pub fn machine_name(&self) -> Option<&str> {
        self.machine_name.as_deref()
    }

    fn arguments(&self) -> Vec<&str> {
        let mut args = vec!["config"];
        args.extend(self.machine_name.as_deref());
        args
    }

    async fn run(&self) -> Result<Vec<String>, DockhandError> {
        let args = self.arguments();
        debug!(binary = %self.binary, ?args, "querying machine configuration");

        let output = Command::new(&self.binary)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| unavailable(format!("failed to run '{}': {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unavailable(format!(
                "'{}' exited with {}: {}",
                self.binary,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().map(String::from).collect())
    }
}

impl MachineConfigSource for MachineCommand {
    fn config_lines(&self) -> MachineConfigFuture<'_> {
        Box::pin(self.run())
    }
}

fn unavailable(message: String) -> DockhandError {
    DockhandError::from(ConnectionError::MachineConfigUnavailable { message })
}
