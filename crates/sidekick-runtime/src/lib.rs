//! Engine runtime for sidekick.
//!
//! - [`supervisor`] - owns the engine child process: spawn, health check,
//!   crash capture and shutdown
//! - [`client`] - embedding and chat-completion requests against the running
//!   engine, including cancellable streamed completions
//!
//! [`remove_artifact`] ties the two halves of the system together for
//! deletes: the engine is stopped before its loaded model is removed.

#![deny(unused_crate_dependencies)]

// Only the integration tests serve fake engines.
#[cfg(test)]
use axum as _;

mod artifacts;
pub mod client;
pub mod supervisor;

pub use artifacts::remove_artifact;
pub use client::{
    ChatStream, ClientError, EngineClient, EngineEndpoint, FixedEndpoint, SseDecoder, SseEvent,
    StreamEnd, StreamEvent,
};
pub use supervisor::{
    EngineConfig, EngineState, EngineStatus, EngineSupervisor, ProcessError, SupervisorOptions,
};
