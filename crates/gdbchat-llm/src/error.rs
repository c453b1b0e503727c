//! Error types for provider calls.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid or missing credentials.
    Auth,
    /// 429 or an explicit rate-limit message.
    RateLimit,
    /// Connect/reset failures and 5xx responses.
    Network,
    /// 2xx response with unusable content.
    Model,
    /// Bad request payload or unsupported provider.
    Validation,
    /// Per-call deadline exceeded.
    Timeout,
    /// Serialization or anything unexpected.
    Internal,
    /// The provider's circuit breaker refused the call.
    CircuitOpen,
    /// The caller cancelled the operation.
    Cancelled,
}

impl ErrorKind {
    /// Short, stable name used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Network => "network",
            Self::Model => "model",
            Self::Validation => "validation",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
            Self::CircuitOpen => "circuit_open",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified provider error.
#[derive(Error, Debug, Clone)]
#[error("{kind} error: {message}")]
pub struct LlmError {
    /// Failure class.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
    /// HTTP status, when the failure came from a response.
    pub status: Option<u16>,
}

/// Matches error text from the known transient classes.
fn is_transient(message: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?i)timeout|timed out|connection|network|service unavailable|rate limit")
                .ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(message))
}

impl LlmError {
    /// Create an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Attach an HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Model, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn circuit_open(provider: &str) -> Self {
        Self::new(
            ErrorKind::CircuitOpen,
            format!("circuit open for provider {}", provider),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "operation cancelled")
    }

    /// Classify a non-2xx HTTP response.
    pub fn from_status(status: u16, body: &str) -> Self {
        let detail = summarize_body(body);
        let kind = match status {
            401 | 403 => ErrorKind::Auth,
            429 => ErrorKind::RateLimit,
            408 => ErrorKind::Timeout,
            500..=599 => ErrorKind::Network,
            _ => ErrorKind::Validation,
        };
        Self::new(kind, format!("HTTP {}: {}", status, detail)).with_status(status)
    }

    /// Classify a transport failure.
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(format!("request timed out: {}", err))
        } else if err.is_connect() || err.is_request() {
            Self::network(format!("connection failed: {}", err))
        } else if err.is_decode() {
            Self::model(format!("unreadable response: {}", err))
        } else {
            Self::network(err.to_string())
        }
    }

    /// Whether a retry may succeed.
    pub fn retryable(&self) -> bool {
        match self.kind {
            ErrorKind::RateLimit | ErrorKind::Network | ErrorKind::Timeout => true,
            ErrorKind::Auth
            | ErrorKind::Validation
            | ErrorKind::CircuitOpen
            | ErrorKind::Cancelled => false,
            ErrorKind::Model | ErrorKind::Internal => {
                matches!(self.status, Some(502..=504)) || is_transient(&self.message)
            }
        }
    }

    /// Whether this failure counts against the provider's circuit.
    pub fn trips_circuit(&self) -> bool {
        !matches!(
            self.kind,
            ErrorKind::Cancelled | ErrorKind::Validation | ErrorKind::CircuitOpen
        )
    }
}

/// Trim a response body to a loggable snippet, preferring an `error.message` field.
fn summarize_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let message = value
            .pointer("/error/message")
            .or_else(|| value.get("message"))
            .and_then(|m| m.as_str());
        if let Some(m) = message {
            return m.to_string();
        }
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(200) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

/// Result type for provider operations.
pub type Result<T> = std::result::Result<T, LlmError>;
