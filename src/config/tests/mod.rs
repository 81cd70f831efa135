//! Unit tests for dockhand configuration.
//!
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Defaults, serialisation and validation
//! - [`layer_precedence_tests`] - File, environment and CLI layering

mod helpers;
