//! The debugger seam used by the orchestrator.

use std::time::Duration;

use async_trait::async_trait;
use gdbchat_debugger::{DebuggerEngine, DebuggerError};
use tokio_util::sync::CancellationToken;

/// What the orchestrator needs from a debugger.
#[async_trait]
pub trait DebuggerControl: Send + Sync {
    /// Whether commands can be issued.
    fn is_running(&self) -> bool;

    /// Issue one command and return its captured output.
    async fn execute_with_capture(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<String, DebuggerError>;
}

#[async_trait]
impl DebuggerControl for DebuggerEngine {
    fn is_running(&self) -> bool {
        DebuggerEngine::is_running(self)
    }

    async fn execute_with_capture(
        &self,
        command: &str,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<String, DebuggerError> {
        DebuggerEngine::execute_with_capture(self, command, timeout, cancel).await
    }
}
