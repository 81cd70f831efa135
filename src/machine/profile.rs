//! Parsing of `docker-machine config` output into a connection profile.
//!
//! The tool prints one flag per line in the form `--key="value"` (or a bare
//! `--tlsverify`). Values may be double-quoted and may carry doubled
//! backslashes on Windows hosts. Parsing never fails: unknown keys are logged
//! and ignored, and lines without a `=` are skipped.

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::error::ConfigError;

const KEY_TLS_VERIFY: &str = "tlsverify";
const KEY_TLS_CA_CERT: &str = "tlscacert";
const KEY_TLS_CERT: &str = "tlscert";
const KEY_TLS_KEY: &str = "tlskey";
const KEY_HOST: &str = "H";

/// Remote engine connection settings reported by the machine tool.
///
/// Built once per resolution attempt and immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionProfile {
    endpoint_url: String,
    tls_enabled: bool,
    ca_cert_path: Utf8PathBuf,
    cert_path: Utf8PathBuf,
    key_path: Utf8PathBuf,
}

impl ConnectionProfile {
    /// The engine endpoint, usually `tcp://host:2376`.
    #[must_use]
    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Whether the tool asked for TLS verification.
    #[must_use]
    pub const fn tls_enabled(&self) -> bool {
        self.tls_enabled
    }

    /// Path to the CA bundle that signed the engine's certificate.
    #[must_use]
    pub fn ca_cert_path(&self) -> &Utf8Path {
        &self.ca_cert_path
    }

    /// Path to the client certificate.
    #[must_use]
    pub fn cert_path(&self) -> &Utf8Path {
        &self.cert_path
    }

    /// Path to the client private key.
    #[must_use]
    pub fn key_path(&self) -> &Utf8Path {
        &self.key_path
    }

    /// Check that every field needed for a TLS connection is present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingRequired` naming each absent key, in the
    /// order `H`, `tlscacert`, `tlscert`, `tlskey`.
    pub fn validate_for_tls(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            (KEY_HOST, self.endpoint_url.is_empty()),
            (KEY_TLS_CA_CERT, self.ca_cert_path.as_str().is_empty()),
            (KEY_TLS_CERT, self.cert_path.as_str().is_empty()),
            (KEY_TLS_KEY, self.key_path.as_str().is_empty()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        if missing.is_empty() {
            return Ok(());
        }
        Err(ConfigError::MissingRequired {
            field: missing.join(", "),
        })
    }

    fn apply(&mut self, key: &str, value: &str, line: &str) {
        match key {
            KEY_TLS_VERIFY => self.tls_enabled = true,
            KEY_TLS_CA_CERT => self.ca_cert_path = Utf8PathBuf::from(unescape(value)),
            KEY_TLS_CERT => self.cert_path = Utf8PathBuf::from(unescape(value)),
            KEY_TLS_KEY => self.key_path = Utf8PathBuf::from(unescape(value)),
            KEY_HOST => self.endpoint_url = unescape(value),
            _ => warn!(line, "unknown machine config entry"),
        }
    }
}

/// Parse machine tool output into a [`ConnectionProfile`].
///
/// Each line has trailing whitespace removed and leading dashes stripped,
/// then splits on the first `=`. `tlsverify` needs no value.
#[must_use]
pub fn parse_machine_config<I, S>(lines: I) -> ConnectionProfile
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut profile = ConnectionProfile::default();
    for raw in lines {
        let line = raw.as_ref().trim_end();
        let flag = line.trim_start_matches('-');
        match flag.split_once('=') {
            Some((key, value)) => profile.apply(key, value, line),
            None if flag == KEY_TLS_VERIFY => profile.tls_enabled = true,
            None => {}
        }
    }
    profile
}

/// Strip surrounding quotes and collapse doubled backslashes.
fn unescape(value: &str) -> String {
    value.trim_matches('"').replace("\\\\", "\\")
}
