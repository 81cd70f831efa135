//! Three-part image references.
//!
//! An [`ImageReference`] names an image by registry (or registry namespace),
//! repository name, and version tag. It renders to the fully qualified form
//! the engine accepts and to the short form a person would type.

use std::fmt;

/// Registry namespace for official library images.
pub const DOCKER_LIBRARY_REGISTRY: &str = "docker.io/library";

/// Registry host for third-party images published on Docker Hub.
pub const DOCKER_HUB_REGISTRY: &str = "registry.hub.docker.com";

/// An immutable `registry/name:version` image identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    name: String,
    version: String,
}

impl ImageReference {
    /// Create a reference from its three parts.
    #[must_use]
    pub fn new(
        registry: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            name: name.into(),
            version: version.into(),
        }
    }

    /// Reference an official image, such as `golang` or `alpine`.
    #[must_use]
    pub fn docker_library(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(DOCKER_LIBRARY_REGISTRY, name, version)
    }

    /// Reference a third-party image on Docker Hub, such as
    /// `kitematic/minecraft`.
    #[must_use]
    pub fn docker_hub(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(DOCKER_HUB_REGISTRY, name, version)
    }

    /// The registry or registry namespace.
    #[must_use]
    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// The repository name within the registry.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The version tag; may be empty.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Render `registry/name:version`.
    ///
    /// All three parts are always present, even when the version is empty.
    #[must_use]
    pub fn fully_qualified_name(&self) -> String {
        format!("{}/{}:{}", self.registry, self.name, self.version)
    }

    /// Render `name:version`, or just `name` when the version is empty.
    #[must_use]
    pub fn short_name(&self) -> String {
        if self.version.is_empty() {
            return self.name.clone();
        }
        format!("{}:{}", self.name, self.version)
    }

    /// The repository portion passed to the engine when pulling.
    #[must_use]
    pub(crate) fn repository(&self) -> String {
        format!("{}/{}", self.registry, self.name)
    }

    /// The tag passed to the engine when pulling.
    ///
    /// The engine pulls every tag when none is given, so an empty version
    /// falls back to `latest`.
    #[must_use]
    pub(crate) fn pull_tag(&self) -> &str {
        if self.version.is_empty() {
            "latest"
        } else {
            &self.version
        }
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.registry, self.name, self.version)
    }
}
