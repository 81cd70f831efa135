//! TLS client material for remote machine engines.
//!
//! A machine engine authenticates clients with a certificate signed by the
//! machine's CA. This module reads the CA bundle and the client key pair
//! from disk and turns them into a `reqwest` client that verifies the
//! server against the system roots plus that CA.

use std::path::PathBuf;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs_utf8::Dir;
use reqwest::{Certificate, Client, Identity};
use tracing::debug;

use crate::error::{ConfigError, ConnectionError, DockhandError};
use crate::machine::ConnectionProfile;

/// Loaded CA certificates and client identity.
#[derive(Clone)]
pub struct TlsMaterials {
    roots: Vec<Certificate>,
    identity: Identity,
}

impl std::fmt::Debug for TlsMaterials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterials")
            .field("roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}

impl TlsMaterials {
    /// Load the CA bundle and client key pair named by `profile`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidTlsMaterial` if any file cannot be read
    /// or is empty, if the CA file holds no certificate, or if the
    /// certificate and key cannot form a client identity or do not match.
    pub fn load(profile: &ConnectionProfile) -> Result<Self, ConfigError> {
        Self::from_paths(
            profile.ca_cert_path(),
            profile.cert_path(),
            profile.key_path(),
        )
    }

    /// Load TLS material from explicit file paths.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn from_paths(
        ca_path: &Utf8Path,
        cert_path: &Utf8Path,
        key_path: &Utf8Path,
    ) -> Result<Self, ConfigError> {
        let ca_pem = read_pem_file(ca_path)?;
        let roots = Certificate::from_pem_bundle(&ca_pem)
            .map_err(|e| invalid(ca_path, format!("failed to parse certificates: {e}")))?;
        if roots.is_empty() {
            return Err(invalid(ca_path, String::from("no certificates found")));
        }

        let cert_pem = read_pem_file(cert_path)?;
        require_label(&cert_pem, cert_path, "CERTIFICATE")?;
        let key_pem = read_pem_file(key_path)?;
        require_label(&key_pem, key_path, "PRIVATE KEY")?;

        let mut identity_pem = key_pem;
        identity_pem.push(b'\n');
        identity_pem.extend_from_slice(&cert_pem);
        let identity = Identity::from_pem(&identity_pem)
            .map_err(|e| invalid(key_path, format!("failed to load client identity: {e}")))?;
        check_key_pair(&identity, key_path)?;

        debug!(roots = roots.len(), %ca_path, "loaded machine TLS material");
        Ok(Self { roots, identity })
    }

    /// Number of CA certificates added on top of the system roots.
    #[must_use]
    pub const fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Build an HTTPS client presenting this identity.
    ///
    /// Server certificates are always verified, against the platform's
    /// native roots (if any) extended with the machine CA.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::HttpClient` if the TLS stack cannot be set
    /// up, for example when the native root store is unreadable.
    pub fn http_client(&self) -> Result<Client, DockhandError> {
        let builder = self
            .roots
            .iter()
            .cloned()
            .fold(Client::builder().use_rustls_tls(), |builder, root| {
                builder.add_root_certificate(root)
            });

        builder
            .identity(self.identity.clone())
            .build()
            .map_err(|e| {
                DockhandError::from(ConnectionError::HttpClient {
                    message: error_chain(&e),
                })
            })
    }
}

/// `rustls` checks that the key belongs to the certificate only when a
/// client is configured with them, so one is built and thrown away.
fn check_key_pair(identity: &Identity, key_path: &Utf8Path) -> Result<(), ConfigError> {
    Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
        .identity(identity.clone())
        .build()
        .map(drop)
        .map_err(|e| {
            invalid(
                key_path,
                format!("certificate and key do not form a pair: {}", error_chain(&e)),
            )
        })
}

/// Read a PEM file through a capability on its parent directory.
fn read_pem_file(path: &Utf8Path) -> Result<Vec<u8>, ConfigError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| invalid(path, String::from("path does not contain a filename")))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|e| invalid(path, format!("failed to open parent directory: {e}")))?;
    let contents = dir
        .read(file_name)
        .map_err(|e| invalid(path, format!("failed to read file: {e}")))?;

    if contents.iter().all(u8::is_ascii_whitespace) {
        return Err(invalid(path, String::from("file is empty")));
    }
    Ok(contents)
}

fn require_label(pem: &[u8], path: &Utf8Path, label: &str) -> Result<(), ConfigError> {
    let text = String::from_utf8_lossy(pem);
    let found = text.lines().map(str::trim).any(|line| {
        line.starts_with("-----BEGIN ")
            && line
                .strip_suffix("-----")
                .is_some_and(|head| head.ends_with(label))
    });
    if found {
        return Ok(());
    }
    Err(invalid(path, format!("no PEM {label} block found")))
}

fn invalid(path: &Utf8Path, message: String) -> ConfigError {
    ConfigError::InvalidTlsMaterial {
        path: PathBuf::from(path.as_std_path()),
        message,
    }
}

/// Render an error and its sources, which `reqwest` keeps out of `Display`.
pub(crate) fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        message.push_str(": ");
        message.push_str(&source.to_string());
        current = source.source();
    }
    message
}
