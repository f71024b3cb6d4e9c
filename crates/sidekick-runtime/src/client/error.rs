use sidekick_core::ErrorCategory;
use thiserror::Error;

/// Errors from single-shot engine requests.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Engine is not running")]
    NotRunning,

    #[error("Engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Engine returned HTTP {0}")]
    Status(u16),

    /// The body did not have the expected shape.
    #[error("Unexpected engine response: {0}")]
    Protocol(String),
}

impl ClientError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotRunning => ErrorCategory::Process,
            Self::Transport(_) => ErrorCategory::Transport,
            Self::Status(_) | Self::Protocol(_) => ErrorCategory::Protocol,
        }
    }
}
