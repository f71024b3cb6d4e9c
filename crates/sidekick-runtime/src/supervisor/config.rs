//! Engine launch configuration.

use sidekick_core::{DEFAULT_CONTEXT_SIZE, DEFAULT_ENGINE_PORT, SidekickConfig};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ProcessError;

/// Loopback address the engine binds to.
pub const ENGINE_HOST: &str = "127.0.0.1";

/// Everything needed to launch one engine process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub binary_path: PathBuf,
    pub model_path: PathBuf,
    pub context_size: u32,
    pub threads: usize,
    pub port: u16,
}

impl EngineConfig {
    /// Config with default context size, port and thread count.
    pub fn new(binary_path: impl Into<PathBuf>, model_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: binary_path.into(),
            model_path: model_path.into(),
            context_size: DEFAULT_CONTEXT_SIZE,
            threads: Self::resolve_threads(None),
            port: DEFAULT_ENGINE_PORT,
        }
    }

    /// Config for `model_path` using the settings from `config`.
    pub fn from_settings(
        settings: &SidekickConfig,
        binary_path: impl Into<PathBuf>,
        model_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            binary_path: binary_path.into(),
            model_path: model_path.into(),
            context_size: settings.context_size,
            threads: Self::resolve_threads(settings.threads),
            port: settings.port,
        }
    }

    #[must_use]
    pub const fn with_context_size(mut self, context_size: u32) -> Self {
        self.context_size = context_size;
        self
    }

    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Requested thread count, or one per logical CPU.
    pub fn resolve_threads(requested: Option<usize>) -> usize {
        requested.unwrap_or_else(num_cpus::get)
    }

    pub fn validate(&self) -> Result<(), ProcessError> {
        require_file(&self.binary_path, "engine binary")?;
        require_file(&self.model_path, "model file")?;

        if self.context_size == 0 {
            return Err(ProcessError::InvalidConfig(
                "context size must be greater than 0".to_string(),
            ));
        }
        if self.threads == 0 {
            return Err(ProcessError::InvalidConfig(
                "thread count must be greater than 0".to_string(),
            ));
        }
        if self.port < 1024 {
            return Err(ProcessError::InvalidConfig(format!(
                "port {} is a privileged port, use a port >= 1024",
                self.port
            )));
        }
        Ok(())
    }

    /// Command line passed to the engine binary.
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "-m".into(),
            self.model_path.clone().into_os_string(),
            "-c".into(),
            self.context_size.to_string().into(),
            "-t".into(),
            self.threads.to_string().into(),
            "--host".into(),
            ENGINE_HOST.into(),
            "--port".into(),
            self.port.to_string().into(),
            "--embedding".into(),
        ]
    }
}

fn require_file(path: &Path, what: &str) -> Result<(), ProcessError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(ProcessError::InvalidConfig(format!(
            "{what} not found: {}",
            path.display()
        )))
    }
}

/// Timing knobs for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOptions {
    /// Delay between health checks during startup.
    pub health_interval: Duration,
    /// How long startup may take before the process is killed.
    pub startup_timeout: Duration,
    /// Grace period between SIGTERM and a forced kill.
    pub stop_grace: Duration,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            health_interval: Duration::from_millis(200),
            startup_timeout: Duration::from_secs(30),
            stop_grace: Duration::from_secs(2),
        }
    }
}
