//! Router configuration and server setup.

use std::future::IntoFuture;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let upload_limit = state.config.upload_limit;

    Router::new()
        // Health
        .route("/api/health", get(handlers::health))
        .route("/api/metrics", get(handlers::metrics))
        // Chat
        .route("/api/chat", post(handlers::chat))
        // Settings
        .route(
            "/api/settings",
            get(handlers::get_settings).post(handlers::update_settings),
        )
        // Upload
        .route(
            "/api/upload",
            post(handlers::upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        // Debugger
        .route("/api/debugger/start", post(handlers::start_debugger))
        .route("/api/debugger/stop", post(handlers::stop_debugger))
        .route("/api/debugger/command", post(handlers::send_command))
        .route("/api/debugger/status", get(handlers::debugger_status))
        .route("/api/debugger/ws", get(handlers::terminal_ws))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Starts the API server and runs until `state.shutdown` is cancelled.
pub async fn serve(config: ApiConfig, state: AppState) -> std::io::Result<()> {
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);
    let shutdown = state.shutdown.clone();
    serve_until(listener, create_router(state), shutdown, config.shutdown_grace).await
}

/// Serves `router` until `shutdown` fires, then lets open connections finish
/// for at most `grace`.
pub async fn serve_until(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let drain = shutdown.clone();
    let server = axum::serve(listener, router)
        .with_graceful_shutdown(async move { drain.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        served = &mut server => served,
        _ = shutdown.cancelled() => match tokio::time::timeout(grace, &mut server).await {
            Ok(served) => served,
            Err(_) => {
                warn!(
                    grace_ms = grace.as_millis() as u64,
                    "connections still open after shutdown grace, closing"
                );
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use gdbchat_debugger::{DebuggerConfig, DebuggerEngine};
    use gdbchat_llm::{ChatProvider, LlmError, ProviderReply, ProviderRequest};
    use gdbchat_orchestrator::{ChatOrchestrator, OrchestratorConfig};
    use gdbchat_persistence::{SessionLogs, SettingsStore};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FixedProvider(&'static str);

    #[async_trait]
    impl ChatProvider for FixedProvider {
        async fn send(
            &self,
            _request: &ProviderRequest,
            _cancel: &CancellationToken,
        ) -> gdbchat_llm::Result<ProviderReply> {
            Ok(ProviderReply::text(self.0))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl ChatProvider for FailingProvider {
        async fn send(
            &self,
            _request: &ProviderRequest,
            _cancel: &CancellationToken,
        ) -> gdbchat_llm::Result<ProviderReply> {
            Err(LlmError::auth("invalid x-api-key"))
        }
    }

    fn make_test_state(dir: &TempDir, provider: Arc<dyn ChatProvider>) -> AppState {
        let settings =
            Arc::new(SettingsStore::open(dir.path().join("settings.json")).unwrap());
        let engine = Arc::new(DebuggerEngine::new(
            DebuggerConfig::new()
                .with_debugger("sh")
                .with_args(["-c", r#"while IFS= read -r l; do echo "out:$l"; done"#])
                .with_capture_timeout(Duration::from_millis(200))
                .with_stop_grace(Duration::from_millis(500)),
        ));
        let orchestrator = Arc::new(ChatOrchestrator::new(
            provider,
            engine.clone(),
            OrchestratorConfig::default(),
        ));
        let logs = Arc::new(SessionLogs::new(dir.path().join("logs")).unwrap());

        AppState::new(
            ApiConfig::default(),
            settings,
            engine,
            orchestrator,
            logs,
            dir.path().join("uploads"),
        )
    }

    fn server(state: AppState) -> TestServer {
        TestServer::new(create_router(state)).unwrap()
    }

    const REPLY: &str = r#"{"text":"Set a breakpoint first.","gdbCommands":[],"waitForOutput":false}"#;

    #[tokio::test]
    async fn test_health_endpoint() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server.get("/api/health").await;
        response.assert_status_ok();

        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["debuggerRunning"], false);
        assert!(!body["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let body: serde_json::Value = server.get("/api/settings").await.json();
        assert_eq!(body["provider"], "anthropic");
        assert_eq!(body["hasApiKey"], false);

        let response = server
            .post("/api/settings")
            .json(&json!({"provider": "openai", "model": "gpt-4o-mini", "apiKey": "sk-1"}))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["provider"], "openai");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["hasApiKey"], true);
        assert!(body.get("apiKey").is_none());

        // Omitted key keeps the stored one.
        let body: serde_json::Value = server
            .post("/api/settings")
            .json(&json!({"provider": "openrouter"}))
            .await
            .json();
        assert_eq!(body["hasApiKey"], true);
        assert_eq!(body["model"], "anthropic/claude-sonnet-4");

        let stored = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        assert!(stored.contains("\"apiKey\": \"sk-1\"") || stored.contains("\"apiKey\":\"sk-1\""));
    }

    #[tokio::test]
    async fn test_settings_rejects_unknown_provider() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server
            .post("/api/settings")
            .json(&json!({"provider": "bard"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("bard"));
    }

    #[tokio::test]
    async fn test_chat_requires_api_key() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server
            .post("/api/chat")
            .json(&json!({"message": "hi", "history": [], "sentContext": []}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_returns_response_text() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));
        server
            .post("/api/settings")
            .json(&json!({"provider": "anthropic", "apiKey": "sk-test"}))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/chat")
            .json(&json!({
                "message": "where do I start?",
                "history": [{"role": "user", "content": "hello"}],
                "sentContext": [{"type": "file", "description": "main.c"}]
            }))
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["response"], "Set a breakpoint first.");
    }

    #[tokio::test]
    async fn test_chat_provider_failure_is_5xx() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FailingProvider)));
        server
            .post("/api/settings")
            .json(&json!({"provider": "anthropic", "apiKey": "sk-bad"}))
            .await
            .assert_status_ok();

        let response = server
            .post("/api/chat")
            .json(&json!({"message": "hi"}))
            .await;
        response.assert_status(StatusCode::BAD_GATEWAY);
        let body: serde_json::Value = response.json();
        assert!(!body["error"].as_str().unwrap().contains("x-api-key"));
    }

    #[tokio::test]
    async fn test_upload_and_debugger_lifecycle() {
        let dir = TempDir::new().unwrap();
        let state = make_test_state(&dir, Arc::new(FixedProvider(REPLY)));
        let logs = state.logs.clone();
        let server = server(state);

        let response = server
            .post("/api/upload")
            .add_query_param("name", "../prog")
            .bytes(vec![0x7f, b'E', b'L', b'F'].into())
            .await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        let path = body["path"].as_str().unwrap().to_string();
        assert!(path.ends_with("uploads/prog"));
        assert_eq!(body["size"], 4);
        assert_eq!(
            logs.current().executable(),
            Some(std::path::Path::new(&path))
        );

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }

        let response = server.post("/api/debugger/start").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["running"], true);

        server
            .post("/api/debugger/command")
            .json(&json!({"command": "info frame"}))
            .await
            .assert_status_ok();

        let status: serde_json::Value = server.get("/api/debugger/status").await.json();
        assert_eq!(status["running"], true);

        server.post("/api/debugger/stop").await.assert_status_ok();
        let status: serde_json::Value = server.get("/api/debugger/status").await.json();
        assert_eq!(status["running"], false);
    }

    #[tokio::test]
    async fn test_start_without_upload() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server.post("/api/debugger/start").await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/debugger/start")
            .json(&json!({"path": "/no/such/binary"}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_command_when_not_running() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server
            .post("/api/debugger/command")
            .json(&json!({"command": "bt"}))
            .await;
        response.assert_status(StatusCode::CONFLICT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["error"], "conflict: debugger is not running");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server.get("/api/metrics").await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["providers"]["anthropic"]["requests"], 0);
        assert_eq!(body["circuits"]["openai"], "closed");
        assert_eq!(body["cache"]["enabled"], false);
    }

    #[tokio::test]
    async fn test_shutdown_does_not_wait_for_stalled_request() {
        use tokio::io::AsyncWriteExt;

        async fn stalled() -> &'static str {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            "late"
        }

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let server = tokio::spawn(serve_until(
            listener,
            Router::new().route("/stalled", get(stalled)),
            shutdown.clone(),
            Duration::from_millis(200),
        ));

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET /stalled HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        shutdown.cancel();
        let finished = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server outlived the shutdown grace");
        finished.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let dir = TempDir::new().unwrap();
        let server = server(make_test_state(&dir, Arc::new(FixedProvider(REPLY))));

        let response = server
            .get("/api/health")
            .add_header(
                axum::http::header::ORIGIN,
                axum::http::HeaderValue::from_static("http://localhost:3000"),
            )
            .await;
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
