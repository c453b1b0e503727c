//! Extracts an [`ActionBlock`] from a model reply.
//!
//! Replies are supposed to be a bare JSON object, but models wrap them in
//! code fences or prose often enough that the parser tries, in order:
//!
//! 1. the whole reply as JSON
//! 2. the reply with a leading ```` ```json ```` fence and trailing fence removed
//! 3. every balanced `{...}` slice, left to right
//! 4. the raw reply as plain text

use gdbchat_models::ActionBlock;

/// Text returned when the model sent nothing at all.
pub const EMPTY_REPLY_TEXT: &str = "The model returned an empty response.";

/// Which strategy produced the block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStrategy {
    Direct,
    Fenced,
    Embedded,
    Fallback,
}

/// Parser output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReply {
    pub block: ActionBlock,
    pub strategy: ParseStrategy,
}

impl ParsedReply {
    /// True when no JSON block was found.
    pub fn is_fallback(&self) -> bool {
        self.strategy == ParseStrategy::Fallback
    }
}

/// Parse a raw model reply. Always yields non-empty text.
pub fn parse_reply(raw: &str) -> ParsedReply {
    let trimmed = raw.trim();

    if let Some(block) = parse_block(trimmed) {
        return ParsedReply {
            block,
            strategy: ParseStrategy::Direct,
        };
    }

    if let Some(inner) = strip_fence(trimmed) {
        if let Some(block) = parse_block(inner) {
            return ParsedReply {
                block,
                strategy: ParseStrategy::Fenced,
            };
        }
    }

    for (start, _) in trimmed.match_indices('{') {
        let Some(slice) = balanced_object(&trimmed[start..]) else {
            continue;
        };
        if let Some(block) = parse_block(slice) {
            return ParsedReply {
                block,
                strategy: ParseStrategy::Embedded,
            };
        }
    }

    let text = if trimmed.is_empty() {
        EMPTY_REPLY_TEXT.to_string()
    } else {
        trimmed.to_string()
    };
    ParsedReply {
        block: ActionBlock::text(text),
        strategy: ParseStrategy::Fallback,
    }
}

/// Strict parse: JSON object of the action-block shape with non-empty text.
fn parse_block(candidate: &str) -> Option<ActionBlock> {
    // Derived struct deserializers also accept the sequence form.
    let value: serde_json::Value = serde_json::from_str(candidate).ok()?;
    if !value.is_object() {
        return None;
    }
    let mut block: ActionBlock = serde_json::from_value(value).ok()?;
    if !block.is_valid() {
        return None;
    }
    block.commands.retain(|c| !c.trim().is_empty());
    Some(block)
}

fn strip_fence(s: &str) -> Option<&str> {
    let rest = s
        .strip_prefix("```json")
        .or_else(|| s.strip_prefix("```JSON"))
        .or_else(|| s.strip_prefix("```"))?;
    let rest = rest.trim_end();
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    Some(rest.trim())
}

/// Returns the slice from the opening `{` to its matching `}`.
/// Braces inside JSON string literals are ignored.
fn balanced_object(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct() {
        let raw = r#"{"text":"Let's look at main.","gdbCommands":["break main","run"],"waitForOutput":false}"#;
        let parsed = parse_reply(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Direct);
        assert_eq!(parsed.block.text, "Let's look at main.");
        assert_eq!(parsed.block.commands, vec!["break main", "run"]);
        assert!(!parsed.block.wait_for_output);
    }

    #[test]
    fn test_direct_round_trips_serialized_block() {
        let block = ActionBlock::text("T")
            .with_commands(["info registers", "bt"])
            .waiting(true);
        let raw = serde_json::to_string(&block).unwrap();
        let parsed = parse_reply(&raw);
        assert_eq!(parsed.strategy, ParseStrategy::Direct);
        assert_eq!(parsed.block, block);
    }

    #[test]
    fn test_fenced() {
        let raw = "```json\n{\"text\":\"fenced\",\"gdbCommands\":[],\"waitForOutput\":true}\n```";
        let parsed = parse_reply(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Fenced);
        assert_eq!(parsed.block.text, "fenced");
        assert!(parsed.block.wait_for_output);
    }

    #[test]
    fn test_embedded() {
        let raw = "Sure! Here is the plan:\n{\"text\":\"ok\",\"gdbCommands\":[],\"waitForOutput\":false}\nThanks";
        let parsed = parse_reply(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Embedded);
        assert_eq!(parsed.block.text, "ok");
    }

    #[test]
    fn test_embedded_skips_non_matching_objects() {
        let raw = "Use {braces} carefully. {\"text\":\"second {one}\",\"gdbCommands\":[\"p x\"]}";
        let parsed = parse_reply(raw);
        assert_eq!(parsed.strategy, ParseStrategy::Embedded);
        assert_eq!(parsed.block.text, "second {one}");
        assert_eq!(parsed.block.commands, vec!["p x"]);
        assert!(!parsed.block.wait_for_output);
    }

    #[test]
    fn test_empty_text_is_invalid() {
        let raw = r#"{"text":"   ","gdbCommands":["run"],"waitForOutput":true}"#;
        let parsed = parse_reply(raw);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.block.text, raw);
        assert!(parsed.block.commands.is_empty());
    }

    #[test]
    fn test_blank_commands_dropped() {
        let raw = r#"{"text":"t","gdbCommands":["bt","  ",""],"waitForOutput":false}"#;
        let parsed = parse_reply(raw);
        assert_eq!(parsed.block.commands, vec!["bt"]);
    }

    #[test]
    fn test_fallback_plain_text() {
        let parsed = parse_reply("I'll run `info breakpoints`.");
        assert!(parsed.is_fallback());
        assert_eq!(parsed.block.text, "I'll run `info breakpoints`.");
        assert!(!parsed.block.wait_for_output);
    }

    #[test]
    fn test_array_reply_is_not_an_action_block() {
        let raw = r#"["hello", ["run"], true]"#;
        let parsed = parse_reply(raw);
        assert!(parsed.is_fallback());
        assert_eq!(parsed.block.text, raw);
        assert!(parsed.block.commands.is_empty());
        assert!(!parsed.block.wait_for_output);

        let fenced = parse_reply("```json\n[\"hi\", [\"kill\"], false]\n```");
        assert!(fenced.is_fallback());
        assert!(fenced.block.commands.is_empty());
    }

    #[test]
    fn test_text_always_non_empty() {
        for raw in ["", "   ", "{", "}", "{\"text\":\"\"}", "```json\n```", "\"\\{"] {
            let parsed = parse_reply(raw);
            assert!(!parsed.block.text.trim().is_empty(), "empty text for {:?}", raw);
        }
    }

    #[test]
    fn test_balanced_object_ignores_string_braces() {
        let s = r#"{"a":"}{","b":{"c":1}} trailing"#;
        assert_eq!(balanced_object(s), Some(r#"{"a":"}{","b":{"c":1}}"#));
        assert_eq!(balanced_object("{unclosed"), None);
        assert_eq!(balanced_object(r#"{"esc":"\"}"}"#), Some(r#"{"esc":"\"}"}"#));
    }
}
