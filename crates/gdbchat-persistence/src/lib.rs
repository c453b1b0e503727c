//! Persistence layer for GDB Chat.
//!
//! This crate provides:
//! - crash-safe file writes (write to temp file, then rename)
//! - the persisted [`SettingsStore`] (`{provider, model, apiKey}`, mode 0600)
//! - the append-only JSON-lines [`SessionLogger`] and its rotation holder
//!
//! # Example
//!
//! ```no_run
//! use gdbchat_persistence::{SettingsStore, SessionLogs};
//!
//! let store = SettingsStore::open("/home/user/.gdbchat_settings.json").unwrap();
//! println!("provider: {}", store.snapshot().provider);
//!
//! let logs = SessionLogs::new("/home/user/.gdbchat/logs").unwrap();
//! logs.current().info("server_started", "listening", serde_json::json!({}));
//! ```

pub mod atomic;
pub mod error;
pub mod session_log;
pub mod settings_store;

pub use error::{PersistenceError, Result};
pub use session_log::{LogEvent, LogLevel, SessionLogger, SessionLogs};
pub use settings_store::SettingsStore;
