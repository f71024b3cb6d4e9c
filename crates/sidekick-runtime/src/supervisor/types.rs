use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Lifecycle state of the supervised engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        };
        f.write_str(s)
    }
}

/// Snapshot of the supervisor, published on every transition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    /// Bound port while a process exists.
    pub port: Option<u16>,
    /// Model the current process was started with.
    pub model_path: Option<PathBuf>,
}

impl EngineStatus {
    pub(crate) const fn stopped() -> Self {
        Self {
            state: EngineState::Stopped,
            port: None,
            model_path: None,
        }
    }

    pub fn running(&self) -> bool {
        self.state == EngineState::Running
    }

    /// Port to talk to, only while the engine is ready.
    pub fn running_port(&self) -> Option<u16> {
        if self.running() { self.port } else { None }
    }
}
