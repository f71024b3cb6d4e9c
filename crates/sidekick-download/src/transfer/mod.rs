//! Resumable HTTP transfers.
//!
//! A transfer stages bytes in `<destination>.partial` and only renames it
//! into place once the body has been fully written. Interrupted or cancelled
//! transfers leave the partial file behind, and the next call for the same
//! destination resumes from its length with a byte-range request.
//!
//! # Server range semantics
//!
//! - `206 Partial Content` on a resumed request: append, totals include the
//!   resumed bytes
//! - `200 OK` on a resumed request: the server ignored the range, so the
//!   partial file is truncated and accounting restarts from zero
//! - `416 Range Not Satisfiable`: the partial file is stale, it is discarded
//!   and the transfer is retried once from scratch

mod error;
mod progress;
mod request;

pub use error::TransferError;
pub use progress::{DEFAULT_PROGRESS_INTERVAL, TransferProgress};

use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use progress::ProgressSampler;

/// Maximum number of redirect hops followed per request.
pub const MAX_REDIRECTS: usize = 5;

/// Suffix appended to the destination file name while a transfer is staged.
pub const PARTIAL_SUFFIX: &str = ".partial";

/// Progress callback for transfers.
pub type ProgressCallback<'a> = &'a (dyn Fn(TransferProgress) + Send + Sync);

/// Path of the staging file for `destination`.
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = OsString::from(destination.as_os_str());
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Per-transfer bookkeeping. Lives only for the duration of one `download`.
struct TransferState {
    destination: PathBuf,
    partial: PathBuf,
    resumed_from: u64,
    downloaded: u64,
    total: Option<u64>,
    sampler: ProgressSampler,
}

/// Resumable downloader.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    client: Client,
    max_redirects: usize,
    progress_interval: Duration,
}

impl TransferEngine {
    /// Create an engine with default settings.
    pub fn new() -> Result<Self, TransferError> {
        Self::builder().build()
    }

    pub fn builder() -> TransferEngineBuilder {
        TransferEngineBuilder::default()
    }

    /// Download `url` to `destination`.
    ///
    /// Returns the destination path once the file is in place. Cancelling
    /// `cancel` aborts the connection and returns [`TransferError::Cancelled`]
    /// with the partial file left on disk.
    ///
    /// Concurrent transfers to the same destination are not supported and
    /// must be serialized by the caller.
    pub async fn download(
        &self,
        url: &str,
        destination: &Path,
        cancel: &CancellationToken,
        on_progress: ProgressCallback<'_>,
    ) -> Result<PathBuf, TransferError> {
        let partial = partial_path(destination);

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| TransferError::io(parent, e))?;
            }
        }

        let mut resume_from = existing_len(&partial).await;
        if resume_from > 0 {
            info!(url, resume_from, "Resuming download");
        }

        let mut retried = false;
        let response = loop {
            let response =
                request::open(&self.client, url, resume_from, self.max_redirects, cancel).await?;
            let status = response.status();

            if status == StatusCode::RANGE_NOT_SATISFIABLE && resume_from > 0 && !retried {
                warn!(url, resume_from, "Server rejected resume range, restarting download");
                discard_partial(&partial).await?;
                resume_from = 0;
                retried = true;
                continue;
            }

            if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
                return Err(TransferError::HttpStatus(status.as_u16()));
            }

            break response;
        };

        let resuming = resume_from > 0 && response.status() == StatusCode::PARTIAL_CONTENT;
        if resume_from > 0 && !resuming {
            debug!(url, "Server ignored range request, restarting from zero");
            resume_from = 0;
        }

        let mut state = TransferState {
            destination: destination.to_path_buf(),
            total: response.content_length().map(|len| len + resume_from),
            resumed_from: resume_from,
            downloaded: resume_from,
            sampler: ProgressSampler::new(self.progress_interval, resume_from),
            partial,
        };

        let mut file = open_partial(&state.partial, resuming).await?;
        let mut body = response.bytes_stream();

        loop {
            let next = tokio::select! {
                () = cancel.cancelled() => None,
                next = body.next() => Some(next),
            };
            let Some(next) = next else {
                flush(&mut file, &state.partial).await?;
                info!(
                    url,
                    downloaded = state.downloaded,
                    "Download cancelled, partial file kept for resume"
                );
                return Err(TransferError::Cancelled);
            };

            match next {
                Some(Ok(chunk)) => {
                    file.write_all(&chunk)
                        .await
                        .map_err(|e| TransferError::io(&state.partial, e))?;
                    state.downloaded += chunk.len() as u64;

                    if let Some(update) = state.sampler.sample(state.downloaded, state.total) {
                        flush(&mut file, &state.partial).await?;
                        on_progress(update);
                    }
                }
                Some(Err(e)) => {
                    let _ = file.flush().await;
                    return Err(TransferError::Transport(e));
                }
                None => break,
            }
        }

        flush(&mut file, &state.partial).await?;
        file.sync_all()
            .await
            .map_err(|e| TransferError::io(&state.partial, e))?;
        drop(file);

        finalize(&state.partial, &state.destination).await?;
        info!(
            url,
            path = %state.destination.display(),
            bytes = state.downloaded,
            resumed_from = state.resumed_from,
            "Download complete"
        );
        Ok(state.destination)
    }
}

/// Builder for [`TransferEngine`].
#[derive(Debug, Clone)]
pub struct TransferEngineBuilder {
    user_agent: String,
    connect_timeout: Duration,
    max_redirects: usize,
    progress_interval: Duration,
}

impl Default for TransferEngineBuilder {
    fn default() -> Self {
        Self {
            user_agent: format!("sidekick/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(15),
            max_redirects: MAX_REDIRECTS,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl TransferEngineBuilder {
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Minimum spacing between progress callbacks.
    #[must_use]
    pub const fn progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn build(self) -> Result<TransferEngine, TransferError> {
        let client = Client::builder()
            .user_agent(self.user_agent)
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(self.connect_timeout)
            .build()?;

        Ok(TransferEngine {
            client,
            max_redirects: self.max_redirects,
            progress_interval: self.progress_interval,
        })
    }
}

async fn existing_len(partial: &Path) -> u64 {
    fs::metadata(partial).await.map(|m| m.len()).unwrap_or(0)
}

async fn discard_partial(partial: &Path) -> Result<(), TransferError> {
    match fs::remove_file(partial).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(TransferError::io(partial, e)),
    }
}

async fn open_partial(partial: &Path, append: bool) -> Result<File, TransferError> {
    let result = if append {
        OpenOptions::new().append(true).open(partial).await
    } else {
        File::create(partial).await
    };
    result.map_err(|e| TransferError::io(partial, e))
}

async fn flush(file: &mut File, partial: &Path) -> Result<(), TransferError> {
    file.flush()
        .await
        .map_err(|e| TransferError::io(partial, e))
}

/// Replace any existing destination with the completed partial file.
async fn finalize(partial: &Path, destination: &Path) -> Result<(), TransferError> {
    match fs::remove_file(destination).await {
        Ok(()) => debug!(path = %destination.display(), "Replaced existing file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(TransferError::io(destination, e)),
    }

    fs::rename(partial, destination)
        .await
        .map_err(|source| TransferError::RenameFailed {
            from: partial.to_path_buf(),
            to: destination.to_path_buf(),
            source,
        })
}
