//! Debugger engine configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{DebuggerError, Result};

/// Configuration for the debugger engine.
#[derive(Debug, Clone)]
pub struct DebuggerConfig {
    /// Debugger binary, resolved through `PATH` when not absolute.
    pub debugger: PathBuf,
    /// Arguments placed before the executable path.
    pub args: Vec<String>,
    /// Default wait for `execute_with_capture`.
    pub capture_timeout: Duration,
    /// How long `stop` waits after the quit command before killing.
    pub stop_grace: Duration,
    /// Capacity of the live output broadcast channel.
    pub channel_capacity: usize,
    /// Line written to ask the debugger to exit.
    pub quit_command: String,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            debugger: PathBuf::from("gdb"),
            args: [
                "-q",
                "-ex",
                "set confirm off",
                "-ex",
                "set pagination off",
                "-ex",
                "set width 0",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            capture_timeout: Duration::from_secs(2),
            stop_grace: Duration::from_millis(1500),
            channel_capacity: 1024,
            quit_command: "quit".to_string(),
        }
    }
}

impl DebuggerConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the debugger binary.
    pub fn with_debugger(mut self, debugger: impl Into<PathBuf>) -> Self {
        self.debugger = debugger.into();
        self
    }

    /// Sets the leading arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the default capture timeout.
    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }

    /// Sets the stop grace period.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Sets the broadcast channel capacity (minimum 1).
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Resolves the debugger binary to an absolute path.
    pub fn resolve_debugger(&self) -> Result<PathBuf> {
        which::which(&self.debugger).map_err(|e| {
            DebuggerError::DebuggerNotFound(format!("{}: {}", self.debugger.display(), e))
        })
    }
}
