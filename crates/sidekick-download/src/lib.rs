//! Downloads for sidekick.
//!
//! - [`transfer`] - resumable HTTP transfers with manual redirect following,
//!   byte-range resume and throttled progress reporting
//! - [`acquire`] - fetching, unpacking and locating the engine binary from a
//!   release archive

#![deny(unused_crate_dependencies)]

// Only the integration tests serve fake peers.
#[cfg(test)]
use axum as _;

pub mod acquire;
pub mod transfer;

pub use acquire::{
    AcquireCallback, AcquireError, AcquireProgress, DEFAULT_RELEASE_TIMEOUT, ENGINE_SUBDIR,
    EngineInstaller, EngineInstallerBuilder, platform_asset_patterns,
};
pub use transfer::{
    MAX_REDIRECTS, PARTIAL_SUFFIX, ProgressCallback, TransferEngine, TransferEngineBuilder,
    TransferError, TransferProgress, partial_path,
};
