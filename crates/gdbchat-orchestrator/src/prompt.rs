//! Prompt construction.

use gdbchat_llm::ChatMessage;
use gdbchat_models::{ChatRequest, ContextItem};

/// System prompt for every turn.
pub const SYSTEM_PROMPT: &str = r#"You are an expert GDB assistant embedded in a web-based debugging session. The user is debugging a native executable through GDB and can see a live GDB terminal.

Your response MUST be a single JSON object with exactly these fields and no surrounding text, markdown, or code fences:

{"text": "<your explanation for the user, never empty>", "gdbCommands": ["<gdb command>", ...], "waitForOutput": true|false}

Rules:
- "text" is always a non-empty natural-language answer.
- "gdbCommands" lists GDB console commands to run, in order. Use [] when no command is needed.
- Set "waitForOutput" to true only when you need to see the commands' output to finish answering; you will then receive it as context and must answer again in the same JSON format.
- Never issue commands that quit GDB or kill the debugged program unless the user asks for it."#;

/// User turn asking the model to restate its previous reply as JSON.
pub const REFORMAT_INSTRUCTION: &str = r#"Your previous reply was not valid. Re-emit your previous answer strictly as a single JSON object of the form {"text": string, "gdbCommands": [string], "waitForOutput": boolean}. The "text" field must not be empty. Output only the JSON object with no prose, markdown, or code fences."#;

/// Suffix appended when the model asked for commands but GDB is not running.
pub const NOT_RUNNING_NOTE: &str = " (Note: GDB is not running, cannot execute commands)";

/// Render context items as a bracketed block.
pub fn format_context_block(items: &[ContextItem]) -> String {
    let mut block = String::from("[Context]\n");
    for (i, item) in items.iter().enumerate() {
        block.push_str(&format!(
            "[{}] type: {} | description: {}\n",
            i + 1,
            item.item_type,
            item.description
        ));
        if let Some(content) = item.content.as_deref() {
            block.push_str(content.trim_end());
            block.push('\n');
        }
    }
    block.push_str("[/Context]");
    block
}

/// The user turn: context block (if any) followed by the message.
pub fn user_content(request: &ChatRequest) -> String {
    if request.context.is_empty() {
        request.message.clone()
    } else {
        format!(
            "{}\n\n{}",
            format_context_block(&request.context),
            request.message
        )
    }
}

/// History followed by the user turn.
pub fn build_messages(request: &ChatRequest) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = request
        .history
        .iter()
        .map(ChatMessage::from_history)
        .collect();
    messages.push(ChatMessage::user(user_content(request)));
    messages
}

/// The primary turn's messages plus the bad reply and the reformat request.
pub fn build_reformat_messages(request: &ChatRequest, previous_reply: &str) -> Vec<ChatMessage> {
    let mut messages = build_messages(request);
    messages.push(ChatMessage::assistant(previous_reply));
    messages.push(ChatMessage::user(REFORMAT_INSTRUCTION));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use gdbchat_models::HistoryMessage;

    #[test]
    fn test_user_content_without_context() {
        let req = ChatRequest::new("inspect main");
        assert_eq!(user_content(&req), "inspect main");
    }

    #[test]
    fn test_context_block_labels_items() {
        let req = ChatRequest::new("what happened?")
            .with_context_item(ContextItem::command_output("Breakpoint 1 at 0x401000\n"))
            .with_context_item(ContextItem::new("file", "main.c", None));
        let content = user_content(&req);
        assert!(content.starts_with("[Context]\n[1] type: command_output | description: GDB Command Output\nBreakpoint 1 at 0x401000\n"));
        assert!(content.contains("[2] type: file | description: main.c\n[/Context]"));
        assert!(content.ends_with("\n\nwhat happened?"));
    }

    #[test]
    fn test_build_messages_order() {
        let req = ChatRequest::new("now").with_history(vec![
            HistoryMessage::user("before"),
            HistoryMessage::assistant("reply"),
        ]);
        let messages = build_messages(&req);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user"]);
        assert_eq!(messages[2].content, "now");
    }

    #[test]
    fn test_reformat_messages() {
        let messages = build_reformat_messages(&ChatRequest::new("q"), "not json");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], ChatMessage::assistant("not json"));
        assert_eq!(messages[2].content, REFORMAT_INSTRUCTION);
    }
}
