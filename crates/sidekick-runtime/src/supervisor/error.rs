use sidekick_core::ErrorCategory;
use std::io;
use thiserror::Error;

/// Errors from engine process supervision.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] io::Error),

    /// The process died before it became healthy.
    #[error("Engine exited during startup ({}){}", exit_label(.code), diagnostics_suffix(.diagnostics))]
    ExitedDuringStartup {
        code: Option<i32>,
        diagnostics: String,
    },

    #[error("Engine did not become healthy within {secs}s")]
    StartupTimeout { secs: u64 },

    #[error("Engine process I/O error: {0}")]
    Io(#[from] io::Error),

    /// The supervisor task is no longer running.
    #[error("Engine supervisor is not running")]
    SupervisorGone,
}

impl ProcessError {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidConfig(_) => ErrorCategory::Config,
            Self::Spawn(_)
            | Self::ExitedDuringStartup { .. }
            | Self::StartupTimeout { .. }
            | Self::Io(_)
            | Self::SupervisorGone => ErrorCategory::Process,
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(
        || "terminated by signal".to_string(),
        |c| format!("exit code {c}"),
    )
}

fn diagnostics_suffix(diagnostics: &str) -> String {
    if diagnostics.is_empty() {
        String::new()
    } else {
        format!(":\n{diagnostics}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_message_carries_code_and_diagnostics() {
        let err = ProcessError::ExitedDuringStartup {
            code: Some(1),
            diagnostics: "error: failed to load model".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("exit code 1"));
        assert!(msg.ends_with("error: failed to load model"));
        assert_eq!(err.category(), ErrorCategory::Process);
    }

    #[test]
    fn test_signal_exit_without_diagnostics() {
        let err = ProcessError::ExitedDuringStartup {
            code: None,
            diagnostics: String::new(),
        };
        assert_eq!(err.to_string(), "Engine exited during startup (terminated by signal)");
    }
}
