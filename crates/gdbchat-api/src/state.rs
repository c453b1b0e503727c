//! Application state shared across handlers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use gdbchat_debugger::DebuggerEngine;
use gdbchat_orchestrator::ChatOrchestrator;
use gdbchat_persistence::{SessionLogs, SettingsStore};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ApiConfig;

/// Composition root: every process-wide component, built once and shared.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: Arc<ApiConfig>,
    /// Persisted provider settings.
    pub settings: Arc<SettingsStore>,
    /// The single debugger engine.
    pub engine: Arc<DebuggerEngine>,
    /// Chat orchestrator.
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Current session log.
    pub logs: Arc<SessionLogs>,
    /// Where uploads are stored.
    pub uploads_dir: Arc<PathBuf>,
    /// Most recent upload, the default executable for `start`.
    pub last_upload: Arc<RwLock<Option<PathBuf>>>,
    /// Cancelled on shutdown; in-flight chats and sockets end with it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(
        config: ApiConfig,
        settings: Arc<SettingsStore>,
        engine: Arc<DebuggerEngine>,
        orchestrator: Arc<ChatOrchestrator>,
        logs: Arc<SessionLogs>,
        uploads_dir: impl AsRef<Path>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            settings,
            engine,
            orchestrator,
            logs,
            uploads_dir: Arc::new(uploads_dir.as_ref().to_path_buf()),
            last_upload: Arc::new(RwLock::new(None)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses an externally owned shutdown token.
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Records the most recent upload.
    pub async fn set_last_upload(&self, path: PathBuf) {
        *self.last_upload.write().await = Some(path);
    }

    /// The most recent upload, if any.
    pub async fn last_upload(&self) -> Option<PathBuf> {
        self.last_upload.read().await.clone()
    }
}
