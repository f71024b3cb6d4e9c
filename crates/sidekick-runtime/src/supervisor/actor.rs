//! The task that owns the engine process.
//!
//! Every mutation of the process handle happens here, one command at a
//! time. Handles talk to it over an mpsc channel and read state from a
//! watch channel.

use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use reqwest::Client;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use super::config::{EngineConfig, SupervisorOptions};
use super::diagnostics::{
    DIAGNOSTIC_CAPACITY, DIAGNOSTIC_LINES, DiagnosticTail, spawn_stderr_reader,
};
use super::error::ProcessError;
use super::health;
use super::shutdown::{force_stop, shutdown_child};
use super::types::{EngineState, EngineStatus};

/// How long to wait for stderr to drain after the process died.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

pub(crate) enum Request {
    Start {
        config: EngineConfig,
        reply: oneshot::Sender<Result<u16, ProcessError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// The live engine process.
struct EngineProcess {
    child: Child,
    port: u16,
    model_path: PathBuf,
    diagnostics: DiagnosticTail,
    stderr_reader: Option<JoinHandle<()>>,
}

pub(crate) struct Supervisor {
    options: SupervisorOptions,
    status: watch::Sender<EngineStatus>,
    http: Client,
    process: Option<EngineProcess>,
}

impl Supervisor {
    pub(crate) fn new(options: SupervisorOptions, status: watch::Sender<EngineStatus>) -> Self {
        let http = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();
        Self {
            options,
            status,
            http,
            process: None,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Request>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Request::Start { config, reply }) => {
                        let result = self.start(config).await;
                        let _ = reply.send(result);
                    }
                    Some(Request::Stop { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                    }
                    Some(Request::Shutdown { reply }) => {
                        self.stop().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        debug!("All supervisor handles dropped");
                        self.stop().await;
                        break;
                    }
                },
                exit = wait_for_exit(&mut self.process) => self.on_unexpected_exit(exit).await,
            }
        }
        debug!("Supervisor task exiting");
    }

    fn publish(&self, state: EngineState, port: Option<u16>, model_path: Option<PathBuf>) {
        self.status.send_replace(EngineStatus {
            state,
            port,
            model_path,
        });
    }

    async fn start(&mut self, config: EngineConfig) -> Result<u16, ProcessError> {
        if let Some(process) = &self.process {
            if process.model_path != config.model_path {
                debug!(
                    running = %process.model_path.display(),
                    requested = %config.model_path.display(),
                    "Engine already running with another model, stop it first"
                );
            }
            return Ok(process.port);
        }

        config.validate()?;
        let port = config.port;
        self.publish(EngineState::Starting, Some(port), Some(config.model_path.clone()));

        match self.launch(&config).await {
            Ok(process) => {
                info!(port, pid = ?process.child.id(), model = %config.model_path.display(), "Engine running");
                self.process = Some(process);
                self.publish(EngineState::Running, Some(port), Some(config.model_path));
                Ok(port)
            }
            Err(e) => {
                warn!(port, error = %e, "Engine failed to start");
                self.publish(EngineState::Stopped, None, None);
                Err(e)
            }
        }
    }

    /// Spawn the engine and wait until it answers health checks.
    async fn launch(&self, config: &EngineConfig) -> Result<EngineProcess, ProcessError> {
        let port = config.port;
        let mut child = Command::new(&config.binary_path)
            .args(config.args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ProcessError::Spawn)?;
        info!(port, pid = ?child.id(), binary = %config.binary_path.display(), "Spawned engine");

        let diagnostics = DiagnosticTail::new(DIAGNOSTIC_CAPACITY);
        let mut stderr_reader = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_reader(stderr, port, diagnostics.clone()));

        let deadline = Instant::now() + self.options.startup_timeout;
        loop {
            tokio::select! {
                exit = child.wait() => {
                    let status = exit?;
                    drain(&mut stderr_reader).await;
                    return Err(ProcessError::ExitedDuringStartup {
                        code: status.code(),
                        diagnostics: diagnostics.last_lines(DIAGNOSTIC_LINES),
                    });
                }
                () = sleep(self.options.health_interval) => {}
            }

            if health::check(&self.http, port).await {
                break;
            }

            if Instant::now() >= deadline {
                warn!(port, "Engine startup timed out, killing process");
                if let Err(e) = force_stop(&mut child).await {
                    warn!(port, error = %e, "Failed to stop engine after timeout");
                }
                drain(&mut stderr_reader).await;
                return Err(ProcessError::StartupTimeout {
                    secs: self.options.startup_timeout.as_secs(),
                });
            }
        }

        Ok(EngineProcess {
            child,
            port,
            model_path: config.model_path.clone(),
            diagnostics,
            stderr_reader,
        })
    }

    async fn stop(&mut self) {
        let Some(mut process) = self.process.take() else {
            return;
        };

        let port = process.port;
        self.publish(EngineState::Stopping, Some(port), Some(process.model_path.clone()));
        info!(port, pid = ?process.child.id(), "Stopping engine");

        match shutdown_child(&mut process.child, self.options.stop_grace).await {
            Ok(status) => debug!(port, ?status, "Engine exited"),
            Err(e) => warn!(port, error = %e, "Error while stopping engine"),
        }
        drain(&mut process.stderr_reader).await;

        self.publish(EngineState::Stopped, None, None);
    }

    async fn on_unexpected_exit(&mut self, exit: io::Result<ExitStatus>) {
        let Some(mut process) = self.process.take() else {
            return;
        };
        drain(&mut process.stderr_reader).await;

        let diagnostics = process.diagnostics.last_lines(DIAGNOSTIC_LINES);
        match exit {
            Ok(status) => warn!(
                port = process.port,
                code = ?status.code(),
                %diagnostics,
                "Engine exited unexpectedly"
            ),
            Err(e) => warn!(port = process.port, error = %e, "Lost track of engine process"),
        }

        self.publish(EngineState::Stopped, None, None);
    }
}

async fn wait_for_exit(process: &mut Option<EngineProcess>) -> io::Result<ExitStatus> {
    match process {
        Some(process) => process.child.wait().await,
        None => std::future::pending().await,
    }
}

async fn drain(reader: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = reader.take() {
        if tokio::time::timeout(DRAIN_TIMEOUT, handle).await.is_err() {
            debug!("stderr still open after exit, not waiting for it");
        }
    }
}
