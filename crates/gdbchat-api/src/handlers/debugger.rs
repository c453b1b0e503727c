//! Debugger control handlers.

use std::path::PathBuf;

use axum::{extract::State, Json};
use gdbchat_debugger::DebuggerStatus;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{DebuggerCommandRequest, StartDebuggerRequest, SuccessResponse};

/// POST /api/debugger/start - Start GDB on the given path or the last upload.
pub async fn start_debugger(
    State(state): State<AppState>,
    body: Option<Json<StartDebuggerRequest>>,
) -> Result<Json<DebuggerStatus>> {
    let requested = body.and_then(|Json(req)| req.path).map(PathBuf::from);
    let path = match requested {
        Some(path) => path,
        None => state
            .last_upload()
            .await
            .ok_or_else(|| ApiError::BadRequest("no executable uploaded".into()))?,
    };

    state.engine.start(&path).await?;

    let status = state.engine.status().await;
    state.logs.current().info(
        "debugger_started",
        &path.display().to_string(),
        json!({ "pid": status.pid }),
    );
    info!(path = %path.display(), "debugger started via API");
    Ok(Json(status))
}

/// POST /api/debugger/stop - Stop GDB.
pub async fn stop_debugger(State(state): State<AppState>) -> Result<Json<SuccessResponse>> {
    let was_running = state.engine.is_running();
    state.engine.stop().await?;
    if was_running {
        state
            .logs
            .current()
            .info("debugger_stopped", "stopped via API", json!({}));
    }
    Ok(Json(SuccessResponse::ok("debugger stopped")))
}

/// POST /api/debugger/command - Send one line to GDB.
pub async fn send_command(
    State(state): State<AppState>,
    Json(req): Json<DebuggerCommandRequest>,
) -> Result<Json<SuccessResponse>> {
    if req.command.contains('\n') {
        return Err(ApiError::BadRequest("command must be a single line".into()));
    }
    state.engine.send_line(&req.command).await?;
    state
        .logs
        .current()
        .info("terminal_command", &req.command, json!({}));
    Ok(Json(SuccessResponse::ok("command sent")))
}

/// GET /api/debugger/status - Engine status.
pub async fn debugger_status(State(state): State<AppState>) -> Json<DebuggerStatus> {
    Json(state.engine.status().await)
}
