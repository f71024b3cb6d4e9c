//! Engine binary acquisition.
//!
//! Looks up the latest engine release, downloads the archive that matches
//! the running platform, unpacks it and locates the server binary inside
//! the unpacked tree.
//!
//! Progress is reported on a single 0..=100 scale: the archive transfer
//! covers the first 80%, unpacking and binary discovery the rest.

mod discover;
mod extract;
mod release;

pub use release::platform_asset_patterns;

use sidekick_core::config::DEFAULT_RELEASE_ENDPOINTS;
use sidekick_core::{ErrorCategory, engine_binary_name};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::transfer::{TransferEngine, TransferError};
use release::{ReleaseAsset, fetch_release, match_asset};

/// Subdirectory of the target directory the archive is unpacked into.
pub const ENGINE_SUBDIR: &str = "engine";

/// Share of the overall progress taken by the archive transfer.
const DOWNLOAD_SHARE: f64 = 0.8;

/// Maximum directory depth searched for the binary.
const MAX_SEARCH_DEPTH: usize = 8;

/// Default time limit for one release metadata request.
pub const DEFAULT_RELEASE_TIMEOUT: Duration = Duration::from_secs(30);

/// Set while any acquisition in this process is running. Concurrent
/// acquisitions would share `<target>/<asset>.partial`.
static ACQUIRE_IN_PROGRESS: AtomicBool = AtomicBool::new(false);

/// Progress update for an acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireProgress {
    /// Overall completion, 0..=100.
    pub percent: f64,
    pub message: String,
}

impl AcquireProgress {
    fn new(percent: f64, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
        }
    }
}

/// Progress callback for acquisitions.
pub type AcquireCallback<'a> = &'a (dyn Fn(AcquireProgress) + Send + Sync);

#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("An engine download is already in progress")]
    AlreadyInProgress,

    #[error("No release asset matches this platform (tried: {})", .patterns.join(", "))]
    NoCompatibleAsset { patterns: Vec<String> },

    #[error(transparent)]
    Transfer(TransferError),

    #[error("Failed to extract {archive}: {reason}")]
    Extraction { archive: PathBuf, reason: String },

    #[error("Unsupported archive format: {0}")]
    UnsupportedArchive(String),

    #[error("'{name}' not found in {root}")]
    BinaryNotFound { name: String, root: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Engine download cancelled")]
    Cancelled,
}

impl AcquireError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::AlreadyInProgress => ErrorCategory::Process,
            Self::NoCompatibleAsset { .. } | Self::BinaryNotFound { .. } => ErrorCategory::NotFound,
            Self::Transfer(e) => e.category(),
            Self::Extraction { .. } | Self::UnsupportedArchive(_) | Self::Io { .. } => {
                ErrorCategory::FileSystem
            }
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn extraction(archive: &Path, reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            archive: archive.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}

impl From<TransferError> for AcquireError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::Cancelled => Self::Cancelled,
            other => Self::Transfer(other),
        }
    }
}

/// Clears the in-progress flag on every exit path.
struct InProgressGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InProgressGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InProgressGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Downloads and installs the engine binary.
///
/// At most one acquisition runs at a time per process, across all installers.
#[derive(Debug)]
pub struct EngineInstaller {
    client: reqwest::Client,
    transfer: TransferEngine,
    endpoints: Vec<String>,
    patterns: Vec<String>,
    binary_name: String,
    user_agent: String,
    cancel: Mutex<Option<CancellationToken>>,
}

impl EngineInstaller {
    pub fn builder() -> EngineInstallerBuilder {
        EngineInstallerBuilder::default()
    }

    /// Whether an acquisition is currently running anywhere in the process.
    #[allow(clippy::unused_self)]
    pub fn is_in_progress(&self) -> bool {
        ACQUIRE_IN_PROGRESS.load(Ordering::SeqCst)
    }

    /// Cancel the running acquisition, if any.
    pub fn cancel(&self) {
        if let Ok(slot) = self.cancel.lock() {
            if let Some(token) = slot.as_ref() {
                info!("Cancelling engine download");
                token.cancel();
            }
        }
    }

    /// Fetch the engine into `target_dir` and return the path of the binary.
    ///
    /// The archive is unpacked into `target_dir/engine`, replacing any
    /// earlier install.
    pub async fn acquire(
        &self,
        target_dir: &Path,
        on_progress: AcquireCallback<'_>,
    ) -> Result<PathBuf, AcquireError> {
        let Some(_guard) = InProgressGuard::acquire(&ACQUIRE_IN_PROGRESS) else {
            return Err(AcquireError::AlreadyInProgress);
        };

        let token = CancellationToken::new();
        self.set_token(Some(token.clone()));
        let result = self.run(target_dir, &token, on_progress).await;
        self.set_token(None);

        match &result {
            Ok(path) => info!(path = %path.display(), "Engine installed"),
            Err(AcquireError::Cancelled) => info!("Engine download cancelled"),
            Err(e) => warn!(error = %e, "Engine install failed"),
        }
        result
    }

    /// The binary from an earlier [`Self::acquire`] into `target_dir`, if any.
    pub fn installed_binary(&self, target_dir: &Path) -> Option<PathBuf> {
        discover::find_binary(
            &target_dir.join(ENGINE_SUBDIR),
            &self.binary_name,
            MAX_SEARCH_DEPTH,
        )
    }

    fn set_token(&self, token: Option<CancellationToken>) {
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = token;
        }
    }

    async fn run(
        &self,
        target_dir: &Path,
        cancel: &CancellationToken,
        on_progress: AcquireCallback<'_>,
    ) -> Result<PathBuf, AcquireError> {
        tokio::fs::create_dir_all(target_dir)
            .await
            .map_err(|e| AcquireError::io(target_dir, e))?;

        on_progress(AcquireProgress::new(0.0, "Looking up latest engine release"));
        let asset = self.find_asset(cancel).await?;
        info!(asset = %asset.name, url = %asset.browser_download_url, "Selected engine asset");

        let file_name = Path::new(&asset.name)
            .file_name()
            .map_or_else(|| asset.name.clone(), |n| n.to_string_lossy().into_owned());
        let archive = target_dir.join(&file_name);

        let label = file_name.clone();
        let report = move |p: crate::transfer::TransferProgress| {
            on_progress(AcquireProgress::new(
                p.percent * DOWNLOAD_SHARE,
                format!("Downloading {label} ({})", p.throughput_label()),
            ));
        };
        self.transfer
            .download(&asset.browser_download_url, &archive, cancel, &report)
            .await?;

        if cancel.is_cancelled() {
            return Err(AcquireError::Cancelled);
        }

        on_progress(AcquireProgress::new(
            DOWNLOAD_SHARE * 100.0,
            format!("Extracting {file_name}"),
        ));
        let engine_dir = target_dir.join(ENGINE_SUBDIR);
        let binary = self.unpack(&archive, &engine_dir).await?;

        make_executable(&binary)?;
        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!(path = %archive.display(), error = %e, "Failed to remove engine archive");
        }

        on_progress(AcquireProgress::new(100.0, "Engine ready"));
        Ok(binary)
    }

    /// Try each release endpoint in order until one has a matching asset.
    async fn find_asset(&self, cancel: &CancellationToken) -> Result<ReleaseAsset, AcquireError> {
        for endpoint in &self.endpoints {
            let fetched = tokio::select! {
                () = cancel.cancelled() => return Err(AcquireError::Cancelled),
                result = fetch_release(&self.client, endpoint, &self.user_agent) => result,
            };

            let release = match fetched {
                Ok(release) => release,
                Err(e) => {
                    warn!(endpoint = %endpoint, error = %e, "Release endpoint failed, trying next");
                    continue;
                }
            };

            if let Some(asset) = match_asset(&release.assets, &self.patterns) {
                debug!(endpoint = %endpoint, tag = ?release.tag_name, "Found matching release");
                return Ok(asset.clone());
            }
            debug!(
                endpoint = %endpoint,
                assets = release.assets.len(),
                "No asset in release matches this platform"
            );
        }

        Err(AcquireError::NoCompatibleAsset {
            patterns: self.patterns.clone(),
        })
    }

    async fn unpack(&self, archive: &Path, engine_dir: &Path) -> Result<PathBuf, AcquireError> {
        let archive = archive.to_path_buf();
        let engine_dir = engine_dir.to_path_buf();
        let name = self.binary_name.clone();
        let join_archive = archive.clone();

        tokio::task::spawn_blocking(move || {
            extract::extract_archive(&archive, &engine_dir)?;
            discover::find_binary(&engine_dir, &name, MAX_SEARCH_DEPTH).ok_or(
                AcquireError::BinaryNotFound {
                    name,
                    root: engine_dir,
                },
            )
        })
        .await
        .map_err(|e| AcquireError::extraction(&join_archive, e))?
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), AcquireError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| AcquireError::io(path, e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), AcquireError> {
    Ok(())
}

/// Builder for [`EngineInstaller`].
#[derive(Debug, Clone)]
pub struct EngineInstallerBuilder {
    endpoints: Vec<String>,
    patterns: Vec<String>,
    binary_name: String,
    user_agent: String,
    release_timeout: Duration,
    transfer: Option<TransferEngine>,
}

impl Default for EngineInstallerBuilder {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_RELEASE_ENDPOINTS.iter().map(|e| (*e).to_string()).collect(),
            patterns: platform_asset_patterns(),
            binary_name: engine_binary_name().to_string(),
            user_agent: format!("sidekick/{}", env!("CARGO_PKG_VERSION")),
            release_timeout: DEFAULT_RELEASE_TIMEOUT,
            transfer: None,
        }
    }
}

impl EngineInstallerBuilder {
    /// Release metadata endpoints, queried in order.
    #[must_use]
    pub fn endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Asset name patterns, best first.
    #[must_use]
    pub fn patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn binary_name(mut self, name: impl Into<String>) -> Self {
        self.binary_name = name.into();
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Time limit for each release metadata request. An endpoint that does
    /// not answer in time is skipped like a failing one.
    #[must_use]
    pub fn release_timeout(mut self, timeout: Duration) -> Self {
        self.release_timeout = timeout;
        self
    }

    /// Use an existing transfer engine for the archive download.
    #[must_use]
    pub fn transfer(mut self, transfer: TransferEngine) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn build(self) -> Result<EngineInstaller, AcquireError> {
        let transfer = match self.transfer {
            Some(transfer) => transfer,
            None => TransferEngine::builder()
                .user_agent(self.user_agent.clone())
                .build()?,
        };
        let client = reqwest::Client::builder()
            .timeout(self.release_timeout)
            .build()
            .map_err(|e| AcquireError::Transfer(TransferError::Transport(e)))?;

        Ok(EngineInstaller {
            client,
            transfer,
            endpoints: self.endpoints,
            patterns: self.patterns,
            binary_name: self.binary_name,
            user_agent: self.user_agent,
            cancel: Mutex::new(None),
        })
    }
}
