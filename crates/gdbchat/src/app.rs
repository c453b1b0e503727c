//! Composition root: builds every component once and runs the server.

use std::path::PathBuf;
use std::sync::Arc;

use gdbchat_api::AppState;
use gdbchat_debugger::DebuggerEngine;
use gdbchat_llm::{
    CircuitRegistry, ClientConfig, ContextManager, Metrics, ProviderClient, Resilience,
    ResponseCache,
};
use gdbchat_orchestrator::ChatOrchestrator;
use gdbchat_persistence::{SessionLogs, SettingsStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::Cli;
use crate::error::Result;

/// Where persistent state lives.
#[derive(Debug, Clone)]
pub struct Paths {
    pub settings_file: PathBuf,
    pub logs_dir: PathBuf,
    pub uploads_dir: PathBuf,
}

impl Paths {
    /// Paths resolved from the environment, directories created.
    pub fn resolve() -> Result<Self> {
        gdbchat_core::ensure_all_dirs()?;
        Ok(Self {
            settings_file: gdbchat_core::settings_file(),
            logs_dir: gdbchat_core::logs_dir(),
            uploads_dir: gdbchat_core::uploads_dir(),
        })
    }
}

/// A fully wired server.
pub struct App {
    pub state: AppState,
    sweeper: Option<JoinHandle<()>>,
}

impl App {
    /// Wires settings, session logs, the debugger engine, the provider client
    /// and the orchestrator together.
    pub fn build(cli: &Cli, paths: &Paths, shutdown: CancellationToken) -> Result<Self> {
        let settings = Arc::new(SettingsStore::open(&paths.settings_file)?);
        let logs = Arc::new(SessionLogs::new(&paths.logs_dir)?);
        let engine = Arc::new(DebuggerEngine::new(cli.debugger_config()));

        if let Err(e) = engine.config().resolve_debugger() {
            warn!(error = %e, "debugger not found; chat will run without GDB");
        }

        let provider = Arc::new(ProviderClient::new(ClientConfig::default())?);
        let resilience = Resilience::new(
            cli.retry_policy(),
            Arc::new(CircuitRegistry::new(cli.circuit_config())),
            Arc::new(Metrics::new()),
        );
        let cache = Arc::new(ResponseCache::new(cli.cache_config()));
        let sweeper = cache.spawn_sweeper(shutdown.child_token());

        let orchestrator = ChatOrchestrator::new(provider, engine.clone(), cli.orchestrator_config())
            .with_resilience(resilience)
            .with_cache(cache)
            .with_context_manager(ContextManager::new(cli.context_config()));

        let state = AppState::new(
            cli.api_config(),
            settings,
            engine,
            Arc::new(orchestrator),
            logs,
            &paths.uploads_dir,
        )
        .with_shutdown(shutdown);

        Ok(Self { state, sweeper })
    }

    /// Serves until the shutdown token is cancelled, then stops the debugger
    /// and closes the session log. Open connections get the configured grace
    /// window, no more.
    pub async fn run(self) -> Result<()> {
        let config = (*self.state.config).clone();
        let shutdown = self.state.shutdown.clone();

        let served = gdbchat_api::serve(config, self.state.clone()).await;

        // Bind failures return before any signal arrives.
        shutdown.cancel();
        self.shutdown().await;
        served?;
        Ok(())
    }

    async fn shutdown(self) {
        info!("shutting down");
        if let Err(e) = self.state.engine.stop().await {
            warn!(error = %e, "failed to stop debugger");
        }
        if let Some(sweeper) = self.sweeper {
            let _ = sweeper.await;
        }
        self.state.logs.close();
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> Paths {
        Paths {
            settings_file: dir.path().join("settings.json"),
            logs_dir: dir.path().join("logs"),
            uploads_dir: dir.path().join("uploads"),
        }
    }

    #[tokio::test]
    async fn test_build_wires_configuration() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::parse_from(["gdbchat", "--cache", "--cache-size", "7", "--port", "0"]);
        let app = App::build(&cli, &paths(&dir), CancellationToken::new()).unwrap();

        let orchestrator = &app.state.orchestrator;
        assert!(orchestrator.cache().is_enabled());
        assert_eq!(orchestrator.cache().config().max_size, 7);
        assert!(!app.state.engine.is_running());
        assert!(app.sweeper.is_some());
        assert!(dir.path().join("logs").is_dir());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::parse_from(["gdbchat", "--port", "0"]);
        let shutdown = CancellationToken::new();
        let app = App::build(&cli, &paths(&dir), shutdown.clone()).unwrap();
        let logs = app.state.logs.clone();

        let handle = tokio::spawn(app.run());
        shutdown.cancel();
        handle.await.unwrap().unwrap();
        assert!(logs.current().is_closed());
    }
}
