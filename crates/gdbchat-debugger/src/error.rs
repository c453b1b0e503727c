//! Error types for the debugger crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while driving the debugger subprocess.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// The debugger binary could not be resolved.
    #[error("debugger not found: {0}")]
    DebuggerNotFound(String),

    /// The executable to debug does not exist.
    #[error("executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    /// Spawning the subprocess failed.
    #[error("failed to spawn debugger: {0}")]
    Spawn(#[source] std::io::Error),

    /// A stdio pipe was not available after spawn.
    #[error("debugger pipe unavailable: {0}")]
    Pipe(&'static str),

    /// No debugger is running.
    #[error("debugger is not running")]
    NotRunning,

    /// Capture wait expired without any output.
    #[error("no output from '{command}' within {}ms", .timeout.as_millis())]
    CaptureTimeout {
        /// Command that was issued.
        command: String,
        /// Wait that expired.
        timeout: Duration,
    },

    /// The operation was cancelled.
    #[error("debugger operation cancelled")]
    Cancelled,

    /// Writing to the debugger failed.
    #[error("debugger io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for debugger operations.
pub type Result<T> = std::result::Result<T, DebuggerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DebuggerError::CaptureTimeout {
            command: "info registers".into(),
            timeout: Duration::from_millis(2000),
        };
        assert_eq!(
            err.to_string(),
            "no output from 'info registers' within 2000ms"
        );

        let err = DebuggerError::ExecutableNotFound(PathBuf::from("/tmp/missing"));
        assert_eq!(err.to_string(), "executable not found: /tmp/missing");
    }
}
