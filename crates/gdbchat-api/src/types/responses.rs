//! Response DTOs for the API.

use std::collections::BTreeMap;

use gdbchat_llm::{CacheStats, CircuitState, ProviderMetrics};
use gdbchat_models::{ChatOutcome, ProviderId, Settings};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub debugger_running: bool,
}

/// Chat response. `response` is the final text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: String,
    pub executed_commands: Vec<String>,
    pub from_cache: bool,
}

impl From<ChatOutcome> for ChatResponse {
    fn from(outcome: ChatOutcome) -> Self {
        Self {
            response: outcome.final_text,
            executed_commands: outcome.executed_commands,
            from_cache: outcome.from_cache,
        }
    }
}

/// Settings as shown to the UI. The key itself is never returned.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsResponse {
    pub provider: ProviderId,
    pub model: String,
    pub has_api_key: bool,
}

impl From<&Settings> for SettingsResponse {
    fn from(settings: &Settings) -> Self {
        Self {
            provider: settings.provider,
            model: settings.model.clone(),
            has_api_key: settings.has_api_key(),
        }
    }
}

/// Upload result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub path: String,
    pub size: usize,
    pub session_id: String,
}

/// Generic success response.
#[derive(Debug, Clone, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

impl SuccessResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Metrics response.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    pub providers: BTreeMap<String, ProviderMetrics>,
    pub cache: CacheStats,
    pub circuits: BTreeMap<String, CircuitState>,
}
