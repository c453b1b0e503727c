//! GDB subprocess engine for GDB Chat.
//!
//! This crate owns the single debugger subprocess:
//! - `DebuggerEngine` - start/stop, send-line, live output, scoped capture
//! - `CaptureWindow` - the accumulator behind `execute_with_capture`
//! - `DebuggerConfig` - binary, arguments and timeouts
//!
//! # Example
//!
//! ```ignore
//! use gdbchat_debugger::{DebuggerConfig, DebuggerEngine};
//! use tokio_util::sync::CancellationToken;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = DebuggerEngine::new(DebuggerConfig::default());
//!     engine.start(Path::new("./a.out")).await?;
//!
//!     let mut live = engine.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(line) = live.recv().await {
//!             println!("gdb: {}", line);
//!         }
//!     });
//!
//!     let cancel = CancellationToken::new();
//!     let out = engine.execute_with_capture("info functions", None, &cancel).await?;
//!     println!("{}", out);
//!
//!     engine.stop().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Capture
//!
//! GDB has no reliable end-of-output marker on its console interface, so a
//! capture lasts for a fixed wait (2s by default). Long-running commands
//! return what they printed so far.

pub mod capture;
pub mod config;
pub mod engine;
pub mod error;

pub use capture::CaptureWindow;
pub use config::DebuggerConfig;
pub use engine::{DebuggerEngine, DebuggerStatus, EXIT_LINE_PREFIX};
pub use error::{DebuggerError, Result};
