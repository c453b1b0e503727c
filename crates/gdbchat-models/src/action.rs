//! The action block the model is contracted to return.

use serde::{Deserialize, Serialize};

/// `{"text": ..., "gdbCommands": [...], "waitForOutput": bool}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionBlock {
    /// Prose answer. Must be non-empty to be valid.
    pub text: String,
    /// Debugger command lines, executed in order.
    #[serde(rename = "gdbCommands", default)]
    pub commands: Vec<String>,
    /// Whether the model wants a follow-up turn with the command output.
    #[serde(rename = "waitForOutput", default)]
    pub wait_for_output: bool,
}

impl ActionBlock {
    /// Creates a block with text only.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            commands: Vec::new(),
            wait_for_output: false,
        }
    }

    /// Sets the commands.
    pub fn with_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.commands = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the wait-for-output flag.
    pub fn waiting(mut self, wait: bool) -> Self {
        self.wait_for_output = wait;
        self
    }

    /// True when the text is non-empty after trimming.
    pub fn is_valid(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// True when there is at least one command to run.
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_block_wire_names() {
        let block = ActionBlock::text("Let's look at main.")
            .with_commands(["break main", "run"])
            .waiting(true);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["gdbCommands"][1], "run");
        assert_eq!(json["waitForOutput"], true);
    }

    #[test]
    fn test_empty_text_invalid() {
        assert!(!ActionBlock::text("   ").is_valid());
        assert!(ActionBlock::text("ok").is_valid());
    }
}
