//! Semantic error types for dockhand.
//!
//! This module defines the error hierarchy, following the principle of using
//! semantic error enums (via `thiserror`) for conditions the caller might
//! inspect or map, while reserving opaque errors (`eyre::Report`) for the
//! application boundary.
//!
//! The enums follow the failure taxonomy of the library: configuration and
//! TLS material problems, engine connectivity, event stream decoding and
//! callback aborts, and build-context archive handling.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while loading configuration or connection material.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found at the specified path.
    #[error("configuration file not found: {path}")]
    FileNotFound {
        /// The path that was searched.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("failed to parse configuration file: {message}")]
    ParseError {
        /// A description of the parse error.
        message: String,
    },

    /// A required configuration value is missing.
    #[error("missing required configuration: {field}")]
    MissingRequired {
        /// The name of the missing field.
        field: String,
    },

    /// A configuration value failed validation.
    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue {
        /// The name of the invalid field.
        field: String,
        /// The reason the value is invalid.
        reason: String,
    },

    /// A TLS certificate, key or CA bundle could not be used.
    #[error("invalid TLS material at '{path}': {message}")]
    InvalidTlsMaterial {
        /// The file that held the offending material.
        path: PathBuf,
        /// A description of the problem.
        message: String,
    },

    /// The `OrthoConfig` library returned an error during configuration loading.
    #[error("configuration loading failed: {0}")]
    OrthoConfig(Arc<ortho_config::OrthoError>),
}

/// Errors raised while resolving or establishing an engine transport.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The resolver was handed an empty strategy list.
    #[error("no connection strategies were provided")]
    NoStrategies,

    /// Failed to connect to the container engine.
    #[error("failed to connect to container engine: {message}")]
    ConnectionFailed {
        /// A description of the connection failure.
        message: String,
    },

    /// The container engine socket was not found.
    #[error("container engine socket not found: {path}")]
    SocketNotFound {
        /// The path where the socket was expected.
        path: PathBuf,
    },

    /// Permission denied when accessing the container engine socket.
    #[error("permission denied accessing container socket: {path}")]
    PermissionDenied {
        /// The path to the socket.
        path: PathBuf,
    },

    /// Health check failed - engine did not respond correctly.
    #[error("container engine health check failed: {message}")]
    HealthCheckFailed {
        /// A description of the health check failure.
        message: String,
    },

    /// Health check timed out.
    #[error("container engine health check timed out after {seconds} seconds")]
    HealthCheckTimeout {
        /// The timeout duration in seconds.
        seconds: u64,
    },

    /// The machine configuration tool could not produce usable output.
    #[error("machine configuration unavailable: {message}")]
    MachineConfigUnavailable {
        /// A description of the tool failure.
        message: String,
    },

    /// The remote engine's API version could not be discovered.
    #[error("failed to probe API version at '{endpoint}': {message}")]
    VersionProbeFailed {
        /// The endpoint that was probed.
        endpoint: String,
        /// A description of why the version query failed.
        message: String,
    },

    /// The HTTP client for a remote engine could not be constructed.
    #[error("failed to build HTTP client: {message}")]
    HttpClient {
        /// A description of the builder failure.
        message: String,
    },

    /// Failed to create the Tokio runtime used by blocking helpers.
    #[error("failed to create async runtime: {message}")]
    RuntimeCreationFailed {
        /// A description of the runtime creation failure.
        message: String,
    },
}

/// Errors raised while opening or consuming an engine event stream.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The engine refused or failed the request that opens the stream.
    #[error("{operation} request failed: {message}")]
    RequestFailed {
        /// The operation being started (`pull` or `build`).
        operation: String,
        /// A description of the failure.
        message: String,
    },

    /// A JSON object in the stream could not be decoded.
    #[error("failed to decode engine event: {message}")]
    Decode {
        /// A description of the decode failure.
        message: String,
    },

    /// A single JSON object exceeded the decoder's buffer limit.
    #[error("engine event exceeded {limit} bytes")]
    EventTooLarge {
        /// The maximum number of buffered bytes per event.
        limit: usize,
    },

    /// The underlying transport failed while reading the stream.
    #[error("engine stream failed: {message}")]
    Transport {
        /// A description of the transport failure.
        message: String,
    },

    /// The request scope was cancelled before the stream finished.
    #[error("operation cancelled")]
    Cancelled,

    /// The request scope's deadline elapsed before the stream finished.
    #[error("operation timed out after {seconds} seconds")]
    TimedOut {
        /// The scope timeout in seconds.
        seconds: u64,
    },

    /// An event callback asked for the operation to stop.
    #[error("operation aborted by event handler: {message}")]
    Aborted {
        /// The reason given by the handler.
        message: String,
    },
}

/// Errors raised while writing or reading a build-context archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The temporary archive file could not be created.
    #[error("failed to create build context archive: {message}")]
    CreateFailed {
        /// A description of the creation failure.
        message: String,
    },

    /// A content provider failed to append its entries.
    #[error("content provider {index} failed: {message}")]
    ProviderFailed {
        /// Zero-based position of the provider in the sequence.
        index: usize,
        /// A description of the provider failure.
        message: String,
    },

    /// The archive could not be finalized.
    #[error("failed to finalize build context archive '{path}': {message}")]
    FinalizeFailed {
        /// The temporary archive path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// A finished archive could not be opened for upload.
    #[error("failed to open build context archive '{path}': {message}")]
    OpenFailed {
        /// The archive path.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },
}

/// Top-level error type for dockhand.
///
/// This enum aggregates all domain-specific errors into a single type that can
/// be used throughout the library. At the application boundary (main.rs),
/// these errors are converted to `eyre::Report` for human-readable reporting.
#[derive(Debug, Error)]
pub enum DockhandError {
    /// An error occurred during configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error occurred while connecting to the engine.
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// An error occurred while consuming an event stream.
    #[error(transparent)]
    Stream(#[from] StreamError),

    /// An error occurred while handling a build-context archive.
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// A specialised `Result` type for dockhand operations.
pub type Result<T> = std::result::Result<T, DockhandError>;
