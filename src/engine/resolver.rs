//! Choosing a transport from an ordered list of strategies.

use tracing::{debug, info};

use super::strategy::{ConnectStrategy, EnvironmentStrategy, MachineStrategy};
use super::transport::Transport;
use crate::config::{AppConfig, StrategyKind};
use crate::error::{ConnectionError, DockhandError};
use crate::machine::MachineCommand;

/// Try each strategy in order and return the first transport produced.
///
/// Failed attempts are logged at debug level and do not stop the search.
///
/// # Errors
///
/// Returns the last strategy's error when every strategy fails, or
/// `ConnectionError::NoStrategies` when `strategies` is empty.
pub async fn resolve_transport(
    strategies: &[&dyn ConnectStrategy],
) -> Result<Transport, DockhandError> {
    let mut last_error = None;

    for strategy in strategies {
        match strategy.connect().await {
            Ok(transport) => {
                info!(
                    strategy = strategy.name(),
                    transport = transport.kind(),
                    "connected to engine"
                );
                return Ok(transport);
            }
            Err(error) => {
                debug!(strategy = strategy.name(), %error, "connection strategy failed");
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ConnectionError::NoStrategies.into()))
}

/// Build the strategies named by `config.engine.strategies`, in order.
#[must_use]
pub fn default_strategies<'a, E>(config: &AppConfig, env: &'a E) -> Vec<Box<dyn ConnectStrategy + 'a>>
where
    E: mockable::Env + Sync,
{
    config
        .engine
        .strategies
        .iter()
        .map(|kind| -> Box<dyn ConnectStrategy + 'a> {
            match kind {
                StrategyKind::Environment => Box::new(EnvironmentStrategy::new(
                    env,
                    config.engine.socket.clone(),
                )),
                StrategyKind::Machine => Box::new(MachineStrategy::new(MachineCommand::new(
                    config.machine.binary.clone(),
                    config.machine.name.clone(),
                ))),
            }
        })
        .collect()
}
