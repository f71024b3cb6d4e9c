//! Transfer error types.

use sidekick_core::ErrorCategory;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for a single transfer.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The starting URL could not be parsed.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The redirect chain exceeded the hop limit.
    #[error("Too many redirects (limit is {limit})")]
    TooManyRedirects { limit: usize },

    /// A redirect response carried a missing or unusable `Location`.
    #[error("Invalid redirect target: {0}")]
    InvalidRedirectUrl(String),

    /// The server answered with a status other than 200/206.
    #[error("Download failed: HTTP {0}")]
    HttpStatus(u16),

    /// Connection, DNS, TLS or body read failure.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Local file operation failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The completed partial file could not be moved into place.
    #[error("Failed to move {from} to {to}: {source}")]
    RenameFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The transfer was cancelled. The partial file is kept for resuming.
    #[error("Download cancelled")]
    Cancelled,
}

impl TransferError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl { .. }
            | Self::TooManyRedirects { .. }
            | Self::InvalidRedirectUrl(_)
            | Self::Transport(_) => ErrorCategory::Transport,
            Self::HttpStatus(_) => ErrorCategory::Protocol,
            Self::Io { .. } | Self::RenameFailed { .. } => ErrorCategory::FileSystem,
            Self::Cancelled => ErrorCategory::Cancelled,
        }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
