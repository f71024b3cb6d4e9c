//! Command-line adapter for sidekick.
//!
//! [`bootstrap`] is the composition root; [`handlers`] hold one module per
//! command group.

#![deny(unused_crate_dependencies)]

// Used by the binary only.
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod presentation;

pub use bootstrap::{CliContext, CliOverrides, bootstrap};
pub use commands::{Commands, EngineArgs, EngineCommand, ModelsCommand};
pub use parser::Cli;
