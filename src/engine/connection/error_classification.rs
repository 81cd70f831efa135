//! Mapping `Bollard` failures onto connection errors.
//!
//! A missing socket and a socket the user cannot open both surface as
//! generic transport errors; this module digs the underlying I/O error out
//! so the caller can report which one happened.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::ConnectionError;

/// Filesystem path of a `unix://` or `npipe://` endpoint.
fn extract_socket_path(socket_uri: &str) -> Option<&Path> {
    socket_uri
        .strip_prefix("unix://")
        .or_else(|| socket_uri.strip_prefix("npipe://"))
        .map(Path::new)
}

fn classify_io_error_kind(
    kind: ErrorKind,
    socket_path: Option<&Path>,
    error_msg: &str,
) -> ConnectionError {
    let failed = || ConnectionError::ConnectionFailed {
        message: error_msg.to_owned(),
    };
    match kind {
        ErrorKind::PermissionDenied => socket_path.map_or_else(failed, |path| {
            ConnectionError::PermissionDenied {
                path: path.to_path_buf(),
            }
        }),
        ErrorKind::NotFound => socket_path.map_or_else(failed, |path| {
            ConnectionError::SocketNotFound {
                path: path.to_path_buf(),
            }
        }),
        _ => failed(),
    }
}

/// Classify a `Bollard` error raised while talking to `socket_uri`.
///
/// Falls back to `ConnectionFailed` for unrecognised errors and for
/// endpoints without a filesystem path.
pub(super) fn classify_connection_error(
    bollard_error: &bollard::errors::Error,
    socket_uri: &str,
) -> ConnectionError {
    let socket_path = extract_socket_path(socket_uri);
    let error_msg = bollard_error.to_string();

    match bollard_error {
        bollard::errors::Error::SocketNotFoundError(_) => {
            if let Some(path) = socket_path {
                return ConnectionError::SocketNotFound {
                    path: path.to_path_buf(),
                };
            }
        }
        bollard::errors::Error::IOError { err } => {
            let kind = io_error_kind_in_chain(err).unwrap_or_else(|| err.kind());
            return classify_io_error_kind(kind, socket_path, &error_msg);
        }
        _ => {}
    }

    if let Some(kind) = io_error_kind_in_chain(bollard_error) {
        return classify_io_error_kind(kind, socket_path, &error_msg);
    }

    ConnectionError::ConnectionFailed { message: error_msg }
}

/// Walk the error source chain looking for an `io::Error` kind.
fn io_error_kind_in_chain(error: &dyn std::error::Error) -> Option<ErrorKind> {
    let mut current = error.source();
    while let Some(err) = current {
        if let Some(io_err) = err.downcast_ref::<std::io::Error>() {
            return Some(io_err.kind());
        }
        current = err.source();
    }
    None
}
