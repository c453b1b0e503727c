//! Executable upload handler.

use std::path::Path;

use axum::{
    body::Bytes,
    extract::{Query, State},
    Json,
};
use gdbchat_persistence::atomic::atomic_write;
use serde_json::json;
use tracing::info;

use crate::error::{ApiError, Result};
use crate::state::AppState;
use crate::types::{UploadQuery, UploadResponse};

/// Mode for stored executables.
const EXECUTABLE_MODE: u32 = 0o755;

/// Reduce a client-supplied name to its final path component.
pub fn sanitize_file_name(name: &str) -> Option<String> {
    let candidate = Path::new(name.trim()).file_name()?.to_str()?.trim();
    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return None;
    }
    Some(candidate.to_string())
}

/// POST /api/upload?name=<file> - Store the body as an executable and start a
/// new session log for it.
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<UploadResponse>> {
    let name = sanitize_file_name(&query.name)
        .ok_or_else(|| ApiError::BadRequest(format!("invalid file name: {}", query.name)))?;
    if body.is_empty() {
        return Err(ApiError::BadRequest("empty upload".into()));
    }

    std::fs::create_dir_all(state.uploads_dir.as_path()).map_err(|e| {
        ApiError::Internal(format!(
            "failed to create {}: {}",
            state.uploads_dir.display(),
            e
        ))
    })?;
    let path = state.uploads_dir.join(&name);
    atomic_write(&path, &body, Some(EXECUTABLE_MODE))?;

    let log = state.logs.rotate(&path)?;
    log.info(
        "executable_uploaded",
        &name,
        json!({ "path": path.display().to_string(), "size": body.len() }),
    );
    state.set_last_upload(path.clone()).await;

    info!(path = %path.display(), size = body.len(), "executable uploaded");
    Ok(Json(UploadResponse {
        path: path.display().to_string(),
        size: body.len(),
        session_id: log.session_id().to_string(),
    }))
}
