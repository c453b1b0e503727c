//! Startup errors.

use thiserror::Error;

/// Result type for server startup and shutdown.
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence error: {0}")]
    Persistence(#[from] gdbchat_persistence::PersistenceError),

    #[error("provider client error: {0}")]
    Provider(#[from] gdbchat_llm::LlmError),

    #[error("debugger error: {0}")]
    Debugger(#[from] gdbchat_debugger::DebuggerError),
}
