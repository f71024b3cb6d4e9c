//! Environment-driven configuration.
//!
//! Adapters call [`SidekickConfig::from_env`] after loading any `.env` file.
//! Tests use [`SidekickConfig::from_lookup`] so they never have to mutate the
//! process environment.

use std::path::PathBuf;
use thiserror::Error;

use crate::error::ErrorCategory;
use crate::paths::{PathError, data_root_from};

/// Default port the engine binds on loopback.
pub const DEFAULT_ENGINE_PORT: u16 = 8765;

/// Default context window passed to the engine.
pub const DEFAULT_CONTEXT_SIZE: u32 = 4096;

const MIN_CONTEXT_SIZE: u32 = 512;
const MAX_CONTEXT_SIZE: u32 = 1_048_576;

/// Release metadata endpoints queried for engine archives, in priority order.
pub const DEFAULT_RELEASE_ENDPOINTS: [&str; 2] = [
    "https://api.github.com/repos/ggml-org/llama.cpp/releases/latest",
    "https://api.github.com/repos/ggerganov/llama.cpp/releases/latest",
];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Path(#[from] PathError),

    /// A value was present but unusable.
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub const fn category(&self) -> ErrorCategory {
        ErrorCategory::Config
    }

    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Resolved configuration for the engine host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidekickConfig {
    /// Root for all data written by sidekick.
    pub data_dir: PathBuf,
    /// Directory holding downloaded model artifacts.
    pub models_dir: PathBuf,
    /// Directory the engine archive is downloaded and extracted into.
    pub engine_dir: PathBuf,
    /// Loopback port for the engine.
    pub port: u16,
    /// Context window passed to the engine.
    pub context_size: u32,
    /// Worker threads; `None` lets the runtime pick the CPU count.
    pub threads: Option<usize>,
    /// Release metadata endpoints, in priority order.
    pub release_endpoints: Vec<String>,
}

impl SidekickConfig {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_dir = data_root_from(&lookup)?;
        let models_dir = get("SIDEKICK_MODELS_DIR")
            .map_or_else(|| data_dir.join("models"), PathBuf::from);
        let engine_dir = get("SIDEKICK_ENGINE_DIR")
            .map_or_else(|| data_dir.join("engine"), PathBuf::from);

        let port = match get("SIDEKICK_PORT") {
            Some(raw) => parse_number("SIDEKICK_PORT", &raw)?,
            None => DEFAULT_ENGINE_PORT,
        };
        let context_size = match get("SIDEKICK_CONTEXT_SIZE") {
            Some(raw) => parse_number("SIDEKICK_CONTEXT_SIZE", &raw)?,
            None => DEFAULT_CONTEXT_SIZE,
        };
        let threads = get("SIDEKICK_THREADS")
            .map(|raw| parse_number("SIDEKICK_THREADS", &raw))
            .transpose()?;
        let release_endpoints = get("SIDEKICK_RELEASE_ENDPOINTS").map_or_else(
            || {
                DEFAULT_RELEASE_ENDPOINTS
                    .iter()
                    .map(ToString::to_string)
                    .collect()
            },
            |raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(ToString::to_string)
                    .collect()
            },
        );

        let config = Self {
            data_dir,
            models_dir,
            engine_dir,
            port,
            context_size,
            threads,
            release_endpoints,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port < 1024 {
            return Err(ConfigError::invalid(
                "SIDEKICK_PORT",
                format!("port {} is privileged, use >= 1024", self.port),
            ));
        }
        if !(MIN_CONTEXT_SIZE..=MAX_CONTEXT_SIZE).contains(&self.context_size) {
            return Err(ConfigError::invalid(
                "SIDEKICK_CONTEXT_SIZE",
                format!(
                    "{} is outside {MIN_CONTEXT_SIZE}..={MAX_CONTEXT_SIZE}",
                    self.context_size
                ),
            ));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::invalid(
                "SIDEKICK_THREADS",
                "must be greater than zero",
            ));
        }
        if self.release_endpoints.is_empty() {
            return Err(ConfigError::invalid(
                "SIDEKICK_RELEASE_ENDPOINTS",
                "at least one endpoint is required",
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, format!("'{raw}': {e}")))
}
