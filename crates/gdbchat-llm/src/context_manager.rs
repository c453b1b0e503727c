//! Keeps a chat request under a token budget.
//!
//! Token counts are estimated at four characters per token. When a request
//! is over budget the manager applies, in order and only while still over:
//!
//! 1. **Summarize**: if history is longer than the compression threshold,
//!    replace all but the most recent `priority_recent` entries with one
//!    system-role summary.
//! 2. **Drop**: remove history from the oldest end until only
//!    `priority_recent` entries remain.
//! 3. **Truncate items**: cut context items above `item_token_limit` down to
//!    a short prefix ending in `[truncated]`, largest first.
//! 4. **Hard bound**: truncate the user message to the remaining budget,
//!    dropping leftover history and attachments if even that is not enough.
//!
//! # Example
//!
//! ```
//! use gdbchat_llm::context_manager::{ContextConfig, ContextManager};
//! use gdbchat_models::ChatRequest;
//!
//! let manager = ContextManager::new(ContextConfig::enabled().with_max_tokens(10));
//! let mut request = ChatRequest::new("x".repeat(400));
//! let report = manager.fit(&mut request);
//! assert!(report.trimmed());
//! assert!(report.after_tokens <= 10);
//! ```

use gdbchat_models::{ChatRequest, HistoryMessage, Role};
use tracing::debug;

/// Characters per estimated token.
pub const CHARS_PER_TOKEN: usize = 4;

const TRUNCATED_MARKER: &str = "... [truncated]";

/// Context trimming settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextConfig {
    pub enabled: bool,
    /// Token cap for the whole request.
    pub max_tokens: usize,
    /// History longer than this is summarized.
    pub compression_threshold: usize,
    /// Most recent history entries that survive summarizing and dropping.
    pub priority_recent: usize,
    /// Context items above this estimate are truncated.
    pub item_token_limit: usize,
    /// Tokens kept from a truncated item.
    pub item_prefix_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_tokens: 8000,
            compression_threshold: 10,
            priority_recent: 4,
            item_token_limit: 500,
            item_prefix_tokens: 100,
        }
    }
}

impl ContextConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    pub fn with_priority_recent(mut self, recent: usize) -> Self {
        self.priority_recent = recent;
        self
    }
}

/// Estimated tokens for a piece of text.
pub fn estimate_text(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

fn request_chars(request: &ChatRequest) -> usize {
    let history: usize = request
        .history
        .iter()
        .map(|m| m.content.chars().count())
        .sum();
    let items: usize = request
        .context
        .iter()
        .map(|i| {
            i.item_type.chars().count()
                + i.description.chars().count()
                + i.content.as_deref().map_or(0, |c| c.chars().count())
        })
        .sum();
    request.message.chars().count() + history + items
}

/// Estimated tokens for a whole request.
pub fn estimate_tokens(request: &ChatRequest) -> usize {
    request_chars(request) / CHARS_PER_TOKEN
}

/// What [`ContextManager::fit`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrimReport {
    pub before_tokens: usize,
    pub after_tokens: usize,
    pub summarized: bool,
    pub dropped_history: bool,
    pub truncated_items: bool,
    pub truncated_message: bool,
}

impl TrimReport {
    pub fn trimmed(&self) -> bool {
        self.summarized || self.dropped_history || self.truncated_items || self.truncated_message
    }
}

/// Applies the trimming steps to a request.
#[derive(Debug, Clone)]
pub struct ContextManager {
    config: ContextConfig,
}

impl ContextManager {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }

    fn over(&self, request: &ChatRequest) -> bool {
        estimate_tokens(request) > self.config.max_tokens
    }

    /// Trim `request` in place until its estimate is within `max_tokens`.
    /// Does nothing when disabled.
    pub fn fit(&self, request: &mut ChatRequest) -> TrimReport {
        let before = estimate_tokens(request);
        let mut report = TrimReport {
            before_tokens: before,
            after_tokens: before,
            ..TrimReport::default()
        };
        if !self.config.enabled || before <= self.config.max_tokens {
            return report;
        }

        report.summarized = self.summarize_history(request);
        if self.over(request) {
            report.dropped_history = self.drop_history(request);
        }
        if self.over(request) {
            report.truncated_items = self.truncate_items(request);
        }
        if self.over(request) {
            report.truncated_message = self.enforce_bound(request);
        }

        report.after_tokens = estimate_tokens(request);
        debug!(
            before = report.before_tokens,
            after = report.after_tokens,
            max = self.config.max_tokens,
            summarized = report.summarized,
            dropped_history = report.dropped_history,
            truncated_items = report.truncated_items,
            truncated_message = report.truncated_message,
            "context trimmed"
        );
        report
    }

    /// Step 1.
    pub fn summarize_history(&self, request: &mut ChatRequest) -> bool {
        let len = request.history.len();
        if len <= self.config.compression_threshold || len <= self.config.priority_recent {
            return false;
        }
        let cut = len - self.config.priority_recent;
        let older: Vec<HistoryMessage> = request.history.drain(..cut).collect();
        request.history.insert(0, summary_message(&older));
        true
    }

    /// Step 2.
    pub fn drop_history(&self, request: &mut ChatRequest) -> bool {
        let keep = self.config.priority_recent;
        let len = request.history.len();
        if len <= keep {
            return false;
        }
        let mut dropped = false;
        while request.history.len() > keep && self.over(request) {
            request.history.remove(0);
            dropped = true;
        }
        dropped
    }

    /// Step 3.
    pub fn truncate_items(&self, request: &mut ChatRequest) -> bool {
        let limit = self.config.item_token_limit;
        let prefix_chars = self.config.item_prefix_tokens * CHARS_PER_TOKEN;

        let mut oversized: Vec<usize> = request
            .context
            .iter()
            .enumerate()
            .filter(|(_, item)| estimate_text(item.content.as_deref().unwrap_or("")) > limit)
            .map(|(idx, _)| idx)
            .collect();
        oversized.sort_by_key(|&idx| std::cmp::Reverse(request.context[idx].content_len()));

        let mut truncated = false;
        for idx in oversized {
            if !self.over(request) {
                break;
            }
            if let Some(content) = request.context[idx].content.as_mut() {
                *content = truncate_at_word(content, prefix_chars);
                truncated = true;
            }
        }
        truncated
    }

    /// Step 4: guarantee the bound.
    fn enforce_bound(&self, request: &mut ChatRequest) -> bool {
        let budget_chars = self.config.max_tokens * CHARS_PER_TOKEN;

        loop {
            let others = request_chars(request) - request.message.chars().count();
            if others <= budget_chars {
                let room = budget_chars - others;
                if request.message.chars().count() > room {
                    request.message = clip(&request.message, room);
                }
                return true;
            }
            // The rest alone is over budget: shed history, then attachments.
            if !request.history.is_empty() {
                request.history.remove(0);
            } else if !request.context.is_empty() {
                let largest = request
                    .context
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, item)| item.content_len())
                    .map(|(idx, _)| idx)
                    .unwrap_or(0);
                request.context.remove(largest);
            } else {
                request.message.clear();
                return true;
            }
        }
    }
}

fn summary_message(older: &[HistoryMessage]) -> HistoryMessage {
    let users = older.iter().filter(|m| m.role == Role::User).count();
    let assistants = older.iter().filter(|m| m.role == Role::Assistant).count();
    let topic = older
        .last()
        .map(|m| truncate_at_word(m.content.trim(), 100))
        .unwrap_or_default();
    HistoryMessage::system(format!(
        "[Summary of {} earlier messages ({} user, {} assistant). Last topic: {}]",
        older.len(),
        users,
        assistants,
        topic
    ))
}

/// Keep at most `max_chars` characters, cutting at a word boundary when one
/// is reasonably close, and append the truncation marker.
fn truncate_at_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let end = text
        .char_indices()
        .nth(max_chars)
        .map_or(text.len(), |(idx, _)| idx);
    let head = &text[..end];
    let head = match head.rfind(char::is_whitespace) {
        Some(ws) if ws >= end / 2 => &head[..ws],
        _ => head,
    };
    format!("{}{}", head.trim_end(), TRUNCATED_MARKER)
}

/// Fit into exactly `room` characters, marker included when it fits.
fn clip(text: &str, room: usize) -> String {
    let marker = TRUNCATED_MARKER.chars().count();
    if room > marker * 2 {
        let out = truncate_at_word(text, room - marker);
        if out.chars().count() <= room {
            return out;
        }
    }
    text.chars().take(room).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdbchat_models::ContextItem;

    fn history(n: usize) -> Vec<HistoryMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    HistoryMessage::user(format!("question {} {}", i, "q".repeat(100)))
                } else {
                    HistoryMessage::assistant(format!("answer {} {}", i, "a".repeat(100)))
                }
            })
            .collect()
    }

    #[test]
    fn test_estimate() {
        assert_eq!(estimate_text("abcdefgh"), 2);
        let req = ChatRequest::new("abcd").with_history(vec![HistoryMessage::user("efgh")]);
        assert_eq!(estimate_tokens(&req), 2);
    }

    #[test]
    fn test_disabled_is_noop() {
        let manager = ContextManager::new(ContextConfig::default().with_max_tokens(1));
        let mut req = ChatRequest::new("long message here").with_history(history(20));
        let report = manager.fit(&mut req);
        assert!(!report.trimmed());
        assert_eq!(req.history.len(), 20);
    }

    #[test]
    fn test_under_budget_untouched() {
        let manager = ContextManager::new(ContextConfig::enabled());
        let mut req = ChatRequest::new("hi").with_history(history(20));
        let report = manager.fit(&mut req);
        assert!(!report.trimmed());
    }

    #[test]
    fn test_summarize_keeps_recent() {
        let manager = ContextManager::new(
            ContextConfig::enabled()
                .with_compression_threshold(6)
                .with_priority_recent(2),
        );
        let mut req = ChatRequest::new("now").with_history(history(10));
        assert!(manager.summarize_history(&mut req));
        assert_eq!(req.history.len(), 3);
        assert_eq!(req.history[0].role, Role::System);
        assert!(req.history[0].content.contains("8 earlier messages"));
        assert!(req.history[0].content.contains("4 user, 4 assistant"));
        assert!(req.history[2].content.starts_with("answer 9"));
    }

    #[test]
    fn test_drop_history_to_recent() {
        let manager = ContextManager::new(
            ContextConfig::enabled()
                .with_max_tokens(60)
                .with_compression_threshold(100)
                .with_priority_recent(2),
        );
        let mut req = ChatRequest::new("now").with_history(history(6));
        let report = manager.fit(&mut req);
        assert!(!report.summarized);
        assert!(report.dropped_history);
        assert_eq!(req.history.len(), 2);
        assert!(req.history[1].content.starts_with("answer 5"));
    }

    #[test]
    fn test_truncate_large_items() {
        let manager = ContextManager::new(ContextConfig::enabled().with_max_tokens(600));
        let big = "word ".repeat(1000);
        let mut req = ChatRequest::new("why")
            .with_context_item(ContextItem::command_output(big))
            .with_context_item(ContextItem::command_output("small"));
        let report = manager.fit(&mut req);
        assert!(report.truncated_items);
        assert!(!report.truncated_message);
        let content = req.context[0].content.as_deref().unwrap();
        assert!(content.ends_with("[truncated]"));
        assert!(content.len() < 500);
        assert_eq!(req.context[1].content.as_deref(), Some("small"));
    }

    #[test]
    fn test_bound_always_holds() {
        let manager = ContextManager::new(
            ContextConfig::enabled()
                .with_max_tokens(50)
                .with_priority_recent(4),
        );
        let mut req = ChatRequest::new("m".repeat(2000))
            .with_history(history(4))
            .with_context_item(ContextItem::new("note", "d".repeat(300), None));
        let report = manager.fit(&mut req);
        assert!(report.truncated_message);
        assert!(estimate_tokens(&req) <= 50);
        assert_eq!(report.after_tokens, estimate_tokens(&req));
    }

    #[test]
    fn test_truncate_at_word() {
        let out = truncate_at_word("alpha beta gamma delta", 12);
        assert_eq!(out, "alpha beta... [truncated]");
        assert_eq!(truncate_at_word("short", 10), "short");
    }
}
