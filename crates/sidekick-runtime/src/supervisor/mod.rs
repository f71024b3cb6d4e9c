//! Engine process supervision.
//!
//! One [`EngineSupervisor`] owns at most one engine process. The process
//! handle lives inside a dedicated task; [`EngineSupervisor`] is a cheap
//! cloneable handle that sends it commands.
//!
//! # States
//!
//! `Stopped -> Starting -> Running -> Stopping -> Stopped`, with
//! `Starting -> Stopped` when startup fails and `Running -> Stopped` when
//! the process dies on its own.
//!
//! Commands are handled in order. A `stop` sent while a start is still
//! waiting for the health check runs once that start has resolved.

mod actor;
mod config;
mod diagnostics;
mod error;
mod health;
mod shutdown;
mod types;

pub use config::{ENGINE_HOST, EngineConfig, SupervisorOptions};
pub use diagnostics::{DIAGNOSTIC_CAPACITY, DIAGNOSTIC_LINES};
pub use error::ProcessError;
pub use health::HEALTH_PATH;
pub use types::{EngineState, EngineStatus};

use tokio::sync::{mpsc, oneshot, watch};

use actor::{Request, Supervisor};

const COMMAND_BUFFER: usize = 16;

/// Handle to the engine supervisor task.
///
/// Dropping the last handle stops the engine and ends the task.
#[derive(Debug, Clone)]
pub struct EngineSupervisor {
    requests: mpsc::Sender<Request>,
    status: watch::Receiver<EngineStatus>,
}

impl EngineSupervisor {
    /// Start the supervisor task. Must be called inside a tokio runtime.
    pub fn spawn(options: SupervisorOptions) -> Self {
        let (requests, inbox) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status) = watch::channel(EngineStatus::stopped());
        tokio::spawn(Supervisor::new(options, status_tx).run(inbox));
        Self { requests, status }
    }

    /// Start the engine and wait until it is healthy.
    ///
    /// Returns the bound port. Succeeds without spawning anything if an
    /// engine is already running.
    pub async fn start(&self, config: EngineConfig) -> Result<u16, ProcessError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Request::Start { config, reply })
            .await
            .map_err(|_| ProcessError::SupervisorGone)?;
        response.await.map_err(|_| ProcessError::SupervisorGone)?
    }

    /// Stop the engine, if one is running, and wait until it has exited.
    pub async fn stop(&self) {
        let (reply, done) = oneshot::channel();
        if self.requests.send(Request::Stop { reply }).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Stop the engine and end the supervisor task.
    pub async fn shutdown(&self) {
        let (reply, done) = oneshot::channel();
        if self.requests.send(Request::Shutdown { reply }).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Current state. Never blocks on I/O.
    pub fn status(&self) -> EngineStatus {
        self.status.borrow().clone()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initial_status_is_stopped() {
        let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());
        let status = supervisor.status();
        assert_eq!(status.state, EngineState::Stopped);
        assert!(!status.running());
        assert_eq!(status.running_port(), None);
    }

    #[tokio::test]
    async fn test_stop_when_stopped_is_noop() {
        let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());
        supervisor.stop().await;
        assert_eq!(supervisor.status().state, EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());
        let config = EngineConfig::new(dir.path().join("missing"), dir.path().join("m.gguf"));

        let err = supervisor.start(config).await.unwrap_err();
        assert!(matches!(err, ProcessError::InvalidConfig(_)));
        assert_eq!(supervisor.status().state, EngineState::Stopped);
    }

    #[tokio::test]
    async fn test_handles_after_shutdown_report_gone() {
        let dir = tempfile::tempdir().unwrap();
        let supervisor = EngineSupervisor::spawn(SupervisorOptions::default());
        supervisor.shutdown().await;

        let config = EngineConfig::new(dir.path().join("engine"), dir.path().join("m.gguf"));
        let err = supervisor.start(config).await.unwrap_err();
        assert!(matches!(err, ProcessError::SupervisorGone));
    }
}
