//! Chat request and outcome types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Synthetic system note (history summaries).
    System,
    /// Operator message.
    User,
    /// Model reply.
    Assistant,
}

impl Role {
    /// Wire string for the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prior turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Who produced the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl HistoryMessage {
    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// An item of context the operator attached to a request
/// (source listing, register dump, previous command output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    /// Kind of the item, e.g. `"command_output"`.
    #[serde(rename = "type")]
    pub item_type: String,
    /// Human readable label.
    pub description: String,
    /// Item body, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ContextItem {
    /// Creates a context item.
    pub fn new(
        item_type: impl Into<String>,
        description: impl Into<String>,
        content: Option<String>,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            description: description.into(),
            content,
        }
    }

    /// The item carrying captured debugger output into a follow-up turn.
    pub fn command_output(output: impl Into<String>) -> Self {
        Self::new("command_output", "GDB Command Output", Some(output.into()))
    }

    /// Length of the item body in bytes.
    pub fn content_len(&self) -> usize {
        self.content.as_ref().map_or(0, String::len)
    }
}

/// One operator submission.
///
/// Wire shape: `{message, history:[{role,content}], sentContext:[...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Current user message.
    pub message: String,
    /// Prior turns, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryMessage>,
    /// Attached context items.
    #[serde(rename = "sentContext", default)]
    pub context: Vec<ContextItem>,
}

impl ChatRequest {
    /// Creates a request with no history or context.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            history: Vec::new(),
            context: Vec::new(),
        }
    }

    /// Sets the history.
    pub fn with_history(mut self, history: Vec<HistoryMessage>) -> Self {
        self.history = history;
        self
    }

    /// Appends a context item.
    pub fn with_context_item(mut self, item: ContextItem) -> Self {
        self.context.push(item);
        self
    }
}

/// Identifier of one debugging session (one uploaded executable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an existing identifier.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrows the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of one orchestration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatOutcome {
    /// Text shown to the operator.
    pub final_text: String,
    /// Debugger commands that were issued, in order.
    pub executed_commands: Vec<String>,
    /// Captured output of those commands, newline separated.
    pub combined_output: String,
    /// True when the answer was served from the response cache.
    #[serde(default)]
    pub from_cache: bool,
}

impl ChatOutcome {
    /// An outcome that carries text only.
    pub fn text(final_text: impl Into<String>) -> Self {
        Self {
            final_text: final_text.into(),
            ..Default::default()
        }
    }
}
