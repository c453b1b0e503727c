//! HTTP and WebSocket API for GDB Chat.
//!
//! Routes:
//! - `POST /api/chat` - one chat turn through the orchestrator
//! - `GET|POST /api/settings` - provider, model and key
//! - `POST /api/upload?name=` - store an executable, rotate the session log
//! - `POST /api/debugger/{start,stop,command}`, `GET /api/debugger/status`
//! - `GET /api/debugger/ws` - live terminal
//! - `GET /api/health`, `GET /api/metrics`
//!
//! # Example
//!
//! ```ignore
//! use gdbchat_api::{serve, ApiConfig, AppState};
//!
//! let state = AppState::new(config.clone(), settings, engine, orchestrator, logs, uploads_dir)
//!     .with_shutdown(shutdown.clone());
//! serve(config, state).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, Result};
pub use router::{create_router, serve, serve_until};
pub use state::AppState;
