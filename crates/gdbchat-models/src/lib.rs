//! Core data models for GDB Chat.
//!
//! This crate provides the fundamental data types shared by the debugger
//! engine, the LLM layer, the orchestrator and the HTTP surface: provider
//! identifiers, session settings, chat requests and the action block the
//! model is contracted to return.

pub mod action;
pub mod chat;
pub mod provider;
pub mod settings;

// Re-export main types
pub use action::ActionBlock;
pub use chat::{ChatOutcome, ChatRequest, ContextItem, HistoryMessage, Role, SessionId};
pub use provider::{ParseProviderError, ProviderId};
pub use settings::Settings;
