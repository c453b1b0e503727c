//! Request DTOs for the API.

use serde::Deserialize;

/// Settings update. An omitted `apiKey` keeps the stored key.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    /// Provider id (`anthropic`, `openai`, `openrouter`).
    pub provider: String,
    /// Model id; the provider default when omitted or empty.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Upload query parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadQuery {
    /// File name for the stored executable.
    pub name: String,
}

/// Debugger start request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartDebuggerRequest {
    /// Executable to debug; the last upload when omitted.
    #[serde(default)]
    pub path: Option<String>,
}

/// Free-form debugger command.
#[derive(Debug, Clone, Deserialize)]
pub struct DebuggerCommandRequest {
    pub command: String,
}
