//! LLM access for GDB Chat.
//!
//! This crate provides:
//! - [`ProviderClient`]: HTTP clients for Anthropic, OpenAI and OpenRouter behind
//!   the [`ChatProvider`] trait
//! - [`parse_reply`]: tolerant extraction of the `{text, gdbCommands, waitForOutput}`
//!   action block from a model reply
//! - [`Resilience`]: exponential-backoff retries gated by per-provider circuit breakers
//! - [`ResponseCache`]: TTL + LRU cache keyed by request fingerprint
//! - [`ContextManager`]: keeps requests under a token budget
//! - [`Metrics`]: per-provider counters
//!
//! # Example
//!
//! ```ignore
//! use gdbchat_llm::{ChatMessage, ChatProvider, ClientConfig, ProviderClient, ProviderRequest};
//! use gdbchat_models::ProviderId;
//! use tokio_util::sync::CancellationToken;
//!
//! let client = ProviderClient::new(ClientConfig::default())?;
//! let request = ProviderRequest::new(ProviderId::Anthropic, "claude-sonnet-4-20250514", key)
//!     .with_system("Answer in JSON.")
//!     .with_messages(vec![ChatMessage::user("What does `bt` do?")]);
//! let reply = client.send(&request, &CancellationToken::new()).await?;
//! ```

pub mod cache;
pub mod circuit;
pub mod client;
pub mod context_manager;
pub mod error;
pub mod metrics;
pub mod parser;
pub mod resilience;
pub mod retry;

pub use cache::{fingerprint, CacheConfig, CacheStats, ResponseCache};
pub use circuit::{CircuitBreaker, CircuitConfig, CircuitPermit, CircuitRegistry, CircuitState};
pub use client::{
    ChatMessage, ChatProvider, ClientConfig, ProviderClient, ProviderEndpoints, ProviderReply,
    ProviderRequest, Usage, ANTHROPIC_VERSION,
};
pub use context_manager::{estimate_tokens, ContextConfig, ContextManager, TrimReport};
pub use error::{ErrorKind, LlmError, Result};
pub use metrics::{Metrics, ProviderMetrics};
pub use parser::{parse_reply, ParseStrategy, ParsedReply};
pub use resilience::Resilience;
pub use retry::RetryPolicy;
