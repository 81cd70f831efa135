//! Connection resolution, build contexts and progress streams for container
//! engines.
//!
//! `dockhand` is a convenience layer over the container engine's remote API.
//! It works out how to reach an engine, either through a local socket named
//! by configuration and the environment or a remote TLS-secured machine
//! described by `docker-machine config`. It then pulls and builds images,
//! decoding the engine's newline-delimited JSON progress into typed events.
//!
//! # Modules
//!
//! - [`api`]: Orchestration behind each CLI subcommand
//! - [`archive`]: Temporary tar build contexts filled by content providers
//! - [`config`]: Configuration system with layered precedence (CLI > env > file > defaults)
//! - [`engine`]: Transport resolution and the client handle
//! - [`error`]: Semantic error types for the library
//! - [`image`]: Image references
//! - [`machine`]: Remote machine configuration
//! - [`stream`]: Event stream decoding and draining

pub mod api;
pub mod archive;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod machine;
pub mod stream;
