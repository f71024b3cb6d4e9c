//! Command handlers.
//!
//! Handlers are thin: resolve CLI input against the [`CliContext`], call
//! into the library crates and format the result for the terminal.
//!
//! [`CliContext`]: crate::bootstrap::CliContext

pub mod chat;
pub mod embed;
pub mod engine;
pub mod models;
pub mod paths;
pub mod serve;
