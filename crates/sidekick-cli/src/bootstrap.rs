//! CLI bootstrap - the composition root.
//!
//! Configuration is loaded here and every long-lived component is built
//! once: the transfer engine, the engine installer and the supervisor.
//! Command handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use sidekick_core::{ARTIFACT_EXTENSION, SidekickConfig};
use sidekick_download::{EngineInstaller, TransferEngine};
use sidekick_runtime::{EngineConfig, EngineSupervisor, SupervisorOptions};
use tracing::debug;

use crate::commands::EngineArgs;

/// Command-line overrides applied on top of the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub models_dir: Option<PathBuf>,
}

/// Fully composed application context for CLI commands.
#[derive(Debug)]
pub struct CliContext {
    pub config: SidekickConfig,
    pub transfer: TransferEngine,
    pub installer: EngineInstaller,
    pub supervisor: EngineSupervisor,
}

impl CliContext {
    /// Path of the installed engine binary.
    pub fn engine_binary(&self) -> Result<PathBuf> {
        self.installer
            .installed_binary(&self.config.engine_dir)
            .ok_or_else(|| {
                anyhow!("Engine is not installed.\n\nTo install it, run:\n  sidekick engine install")
            })
    }

    /// Resolve a model argument to a file on disk.
    pub fn resolve_model(&self, model: &str) -> Result<PathBuf> {
        resolve_model_in(&self.config.models_dir, model)
    }

    /// Launch configuration for `model_path` with the CLI overrides applied.
    pub fn engine_config(&self, model_path: &Path, args: &EngineArgs) -> Result<EngineConfig> {
        let mut config = EngineConfig::from_settings(&self.config, self.engine_binary()?, model_path);
        if let Some(ctx_size) = args.ctx_size {
            config = config.with_context_size(ctx_size);
        }
        if let Some(threads) = args.threads {
            config = config.with_threads(threads);
        }
        if let Some(port) = args.port {
            config = config.with_port(port);
        }
        Ok(config)
    }
}

/// Bootstrap the CLI application.
///
/// Must run inside the tokio runtime: the supervisor task is spawned here.
pub fn bootstrap(overrides: CliOverrides) -> Result<CliContext> {
    let mut config = SidekickConfig::from_env().context("Invalid configuration")?;
    if let Some(models_dir) = overrides.models_dir {
        config.models_dir = models_dir;
    }
    config.validate().context("Invalid configuration")?;
    debug!(?config, "Loaded configuration");

    let user_agent = format!("sidekick/{}", env!("CARGO_PKG_VERSION"));
    let transfer = TransferEngine::builder()
        .user_agent(user_agent.clone())
        .build()?;
    let installer = EngineInstaller::builder()
        .endpoints(config.release_endpoints.clone())
        .user_agent(user_agent)
        .transfer(transfer.clone())
        .build()?;
    let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());

    Ok(CliContext {
        config,
        transfer,
        installer,
        supervisor,
    })
}

/// Accepts, in order: an existing file path, a file name inside
/// `models_dir`, or a catalog id whose artifact has been downloaded.
fn resolve_model_in(models_dir: &Path, model: &str) -> Result<PathBuf> {
    let direct = Path::new(model);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let local = models_dir.join(model);
    if local.is_file() {
        return Ok(local);
    }
    let with_extension = models_dir.join(format!("{model}.{ARTIFACT_EXTENSION}"));
    if with_extension.is_file() {
        return Ok(with_extension);
    }

    match sidekick_core::resolve(model) {
        Ok(descriptor) if descriptor.is_downloaded(models_dir) => {
            Ok(descriptor.local_path(models_dir))
        }
        Ok(descriptor) => bail!(
            "Model '{}' is not downloaded yet.\n\nTo download it, run:\n  sidekick models download {}",
            descriptor.name,
            descriptor.id
        ),
        Err(_) => bail!("No model file or catalog entry named '{model}'"),
    }
}
