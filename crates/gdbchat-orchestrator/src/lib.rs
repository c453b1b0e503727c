//! Chat-debugger orchestration for GDB Chat.
//!
//! This crate provides the `ChatOrchestrator`, which turns one user message
//! into a final answer:
//!
//! 1. build a prompt (system prompt, history, bracketed context block)
//! 2. call the provider through retries and the circuit breaker
//! 3. parse the action block, with at most one reformat turn
//! 4. run the requested GDB commands with output capture
//! 5. optionally re-ask the provider with the captured output
//!
//! # Example
//!
//! ```ignore
//! use gdbchat_orchestrator::{ChatOrchestrator, OrchestratorConfig};
//!
//! let orchestrator = ChatOrchestrator::new(provider, engine, OrchestratorConfig::default());
//! let outcome = orchestrator
//!     .handle(&settings, ChatRequest::new("why did it crash?"), &log, &cancel)
//!     .await?;
//! println!("{}", outcome.final_text);
//! ```

mod debugger;
mod error;
mod orchestrator;
pub mod prompt;

pub use debugger::DebuggerControl;
pub use error::{OrchestratorError, Result};
pub use orchestrator::{ChatOrchestrator, OrchestratorConfig};
