//! Core domain types for sidekick.
//!
//! This crate holds everything the adapters share without pulling in an
//! async runtime or HTTP stack:
//!
//! - [`catalog`] - the static registry of downloadable model artifacts and
//!   local artifact scanning
//! - [`config`] - environment-driven configuration
//! - [`domain`] - chat message types understood by the engine
//! - [`error`] - the error taxonomy shared by every crate
//! - [`paths`] - data directory resolution

#![deny(unused_crate_dependencies)]

pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod paths;
pub mod utils;

pub use catalog::{
    ARTIFACT_EXTENSION, ArtifactCategory, ArtifactDescriptor, CatalogError, LocalArtifact,
    delete, list_available, resolve, scan_local,
};
pub use config::{ConfigError, DEFAULT_CONTEXT_SIZE, DEFAULT_ENGINE_PORT, SidekickConfig};
pub use domain::{ChatMessage, ChatOptions, MessageRole};
pub use error::ErrorCategory;
pub use paths::{PathError, data_root, engine_binary_name};
pub use utils::format_size;
