//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gdbchat_debugger::DebuggerError;
use gdbchat_llm::ErrorKind;
use gdbchat_orchestrator::OrchestratorError;
use gdbchat_persistence::PersistenceError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type for consistent `{"error": ...}` responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Operation conflicts with current state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Upstream provider failed.
    #[error("provider error: {0}")]
    BadGateway(String),

    /// Service unavailable (circuit open, debugger missing).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Upstream or debugger deadline exceeded.
    #[error("timed out: {0}")]
    GatewayTimeout(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            // Details go to the session log; the client gets the class only.
            OrchestratorError::Provider(e) => match e.kind {
                ErrorKind::CircuitOpen => ApiError::ServiceUnavailable(
                    "provider temporarily disabled after repeated failures".into(),
                ),
                ErrorKind::Timeout => {
                    ApiError::GatewayTimeout("provider did not respond in time".into())
                }
                ErrorKind::Auth => ApiError::BadGateway("provider rejected the API key".into()),
                ErrorKind::RateLimit => ApiError::BadGateway("provider rate limit reached".into()),
                kind => ApiError::BadGateway(format!("provider request failed ({})", kind)),
            },
            OrchestratorError::Timeout(d) => {
                ApiError::GatewayTimeout(format!("chat request exceeded {}s", d.as_secs()))
            }
            OrchestratorError::Cancelled => {
                ApiError::ServiceUnavailable("request cancelled".into())
            }
        }
    }
}

impl From<DebuggerError> for ApiError {
    fn from(err: DebuggerError) -> Self {
        match err {
            DebuggerError::NotRunning => ApiError::Conflict(err.to_string()),
            DebuggerError::ExecutableNotFound(_) => ApiError::NotFound(err.to_string()),
            DebuggerError::DebuggerNotFound(_) => ApiError::ServiceUnavailable(err.to_string()),
            DebuggerError::CaptureTimeout { .. } => ApiError::GatewayTimeout(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<PersistenceError> for ApiError {
    fn from(err: PersistenceError) -> Self {
        ApiError::Internal(err.to_string())
    }
}
