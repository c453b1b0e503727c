//! Settings handlers.

use axum::{extract::State, Json};
use gdbchat_models::{ProviderId, Settings};
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{SettingsResponse, UpdateSettingsRequest};

/// GET /api/settings - Current provider and model; never the key.
pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse::from(&state.settings.snapshot()))
}

/// POST /api/settings - Validate, persist, re-read, and swap settings.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>> {
    let provider: ProviderId = req
        .provider
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("{}", e)))?;

    let current = state.settings.snapshot();
    let model = req
        .model
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| provider.default_model().to_string());
    let api_key = match req.api_key {
        Some(key) => key.trim().to_string(),
        None => current.api_key,
    };

    let next = Settings::for_provider(provider)
        .with_model(model)
        .with_api_key(api_key);
    let saved = state.settings.update(next)?;

    info!(provider = %saved.provider, model = %saved.model, "settings updated");
    state.logs.current().info(
        "settings_updated",
        "provider settings changed",
        json!({ "provider": saved.provider.as_str(), "model": saved.model }),
    );

    Ok(Json(SettingsResponse::from(&saved)))
}
