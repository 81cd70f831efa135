//! Remote machine configuration.
//!
//! A machine is a remote engine provisioned by `docker-machine`. Its
//! connection settings come from `docker-machine config`, which this module
//! runs and parses into a [`ConnectionProfile`].

mod command;
mod profile;

pub use command::{DEFAULT_MACHINE_BINARY, MachineCommand, MachineConfigFuture, MachineConfigSource};
pub use profile::{ConnectionProfile, parse_machine_config};
