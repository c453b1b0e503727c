//! Error types for the orchestrator.

use std::time::Duration;

use gdbchat_llm::{ErrorKind, LlmError};
use thiserror::Error;

/// Orchestration failures. Everything else is recovered locally.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The primary provider turn failed after retries.
    #[error("provider error: {0}")]
    Provider(LlmError),

    /// The overall deadline elapsed.
    #[error("chat request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The caller cancelled the request.
    #[error("chat request cancelled")]
    Cancelled,
}

impl From<LlmError> for OrchestratorError {
    fn from(err: LlmError) -> Self {
        match err.kind {
            ErrorKind::Cancelled => Self::Cancelled,
            _ => Self::Provider(err),
        }
    }
}

impl OrchestratorError {
    /// True when the provider's circuit refused the call.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::Provider(e) if e.kind == ErrorKind::CircuitOpen)
    }

    /// The provider error kind, if any.
    pub fn provider_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Provider(e) => Some(e.kind),
            _ => None,
        }
    }
}

/// Result type for orchestrator operations.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
