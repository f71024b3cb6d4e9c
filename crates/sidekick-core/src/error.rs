//! Error taxonomy shared across crates.
//!
//! Each crate defines its own `thiserror` enum; every one of them maps onto
//! an [`ErrorCategory`] so adapters can decide how to present a failure
//! without matching on crate-specific variants.

use serde::Serialize;
use std::fmt;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection, DNS, redirect or timeout failure.
    Transport,
    /// Malformed payload or unexpected status from a peer.
    Protocol,
    /// Spawn failure, early crash or health-check timeout of the engine.
    Process,
    /// Permission, space or rename failures on local disk.
    FileSystem,
    /// The operation was cancelled on request.
    Cancelled,
    /// Invalid configuration or arguments.
    Config,
    /// A requested entity does not exist.
    NotFound,
}

impl ErrorCategory {
    /// Stable lowercase label, used in logs and CLI output.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Protocol => "protocol",
            Self::Process => "process",
            Self::FileSystem => "filesystem",
            Self::Cancelled => "cancelled",
            Self::Config => "config",
            Self::NotFound => "not_found",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
