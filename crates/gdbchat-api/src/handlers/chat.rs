//! Chat handler.

use axum::{extract::State, Json};
use gdbchat_models::ChatRequest;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::ChatResponse;

/// POST /api/chat - Run one chat turn through the orchestrator.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    if req.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".into()));
    }

    let settings = state.settings.snapshot();
    if !settings.has_api_key() {
        return Err(ApiError::BadRequest(format!(
            "no API key configured for {}",
            settings.provider
        )));
    }

    info!(
        provider = %settings.provider,
        model = %settings.model,
        history = req.history.len(),
        context_items = req.context.len(),
        "chat request"
    );

    let log = state.logs.current();
    let cancel = state.shutdown.child_token();
    let outcome = state
        .orchestrator
        .handle(&settings, req, &log, &cancel)
        .await?;

    Ok(Json(ChatResponse::from(outcome)))
}
