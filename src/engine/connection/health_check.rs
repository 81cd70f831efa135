//! Engine liveness checks.

use std::time::Duration;

use bollard::Docker;

use super::error_classification::classify_connection_error;
use super::{EngineConnector, HEALTH_CHECK_TIMEOUT_SECS};
use crate::error::{ConnectionError, DockhandError};

impl EngineConnector {
    /// Ping the engine, giving up after the health-check timeout.
    ///
    /// `socket` is only used to name the socket in classified errors.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::HealthCheckTimeout` if the engine does not
    /// answer in time, `ConnectionError::SocketNotFound` or
    /// `ConnectionError::PermissionDenied` when the socket is missing or
    /// unreadable, and `ConnectionError::HealthCheckFailed` otherwise.
    pub async fn health_check(docker: &Docker, socket: &str) -> Result<(), DockhandError> {
        let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

        tokio::time::timeout(timeout, docker.ping())
            .await
            .map_err(|_| {
                DockhandError::from(ConnectionError::HealthCheckTimeout {
                    seconds: HEALTH_CHECK_TIMEOUT_SECS,
                })
            })?
            .map_err(|e| {
                let classified = match classify_connection_error(&e, socket) {
                    ConnectionError::ConnectionFailed { message } => {
                        ConnectionError::HealthCheckFailed { message }
                    }
                    other => other,
                };
                DockhandError::from(classified)
            })?;
        Ok(())
    }

    /// Connect to `socket` and confirm the engine answers.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::connect`] and [`Self::health_check`].
    pub async fn connect_and_verify(socket: &str) -> Result<Docker, DockhandError> {
        let docker = Self::connect(socket)?;
        Self::health_check(&docker, socket).await?;
        Ok(docker)
    }
}
