//! Data directory resolution.
//!
//! Resolution order for the data root:
//! 1. `SIDEKICK_DATA_DIR` environment variable (highest priority)
//! 2. System data directory (e.g., `~/.local/share/sidekick`)

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "SIDEKICK_DATA_DIR";

/// Errors that can occur during path resolution.
#[derive(Debug, Error)]
pub enum PathError {
    /// Could not determine the system data directory.
    #[error("Cannot determine system data directory")]
    NoDataDir,

    /// An empty path was provided.
    #[error("Path cannot be empty")]
    EmptyPath,
}

impl PathError {
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }
}

/// Root directory for everything sidekick writes to disk.
pub fn data_root() -> Result<PathBuf, PathError> {
    data_root_from(|key| std::env::var(key).ok())
}

/// Same as [`data_root`], reading overrides through `lookup`.
pub fn data_root_from(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf, PathError> {
    if let Some(value) = lookup(DATA_DIR_ENV) {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PathError::EmptyPath);
        }
        return Ok(PathBuf::from(trimmed));
    }

    dirs::data_dir()
        .map(|dir| dir.join("sidekick"))
        .ok_or(PathError::NoDataDir)
}

/// File name of the engine executable on this platform.
pub const fn engine_binary_name() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "llama-server.exe"
    }

    #[cfg(not(target_os = "windows"))]
    {
        "llama-server"
    }
}
