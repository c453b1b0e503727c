//! Provider identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One of the supported chat completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderId {
    /// Anthropic Messages API.
    #[serde(rename = "anthropic")]
    Anthropic,
    /// OpenAI Chat Completions API.
    #[serde(rename = "openai")]
    OpenAi,
    /// OpenRouter (OpenAI-compatible) Chat Completions API.
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl ProviderId {
    /// All providers, in a stable order.
    pub const ALL: [ProviderId; 3] = [
        ProviderId::Anthropic,
        ProviderId::OpenAi,
        ProviderId::OpenRouter,
    ];

    /// Stable string identifier used in settings and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "anthropic",
            ProviderId::OpenAi => "openai",
            ProviderId::OpenRouter => "openrouter",
        }
    }

    /// Default model for a freshly configured provider.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderId::Anthropic => "claude-sonnet-4-20250514",
            ProviderId::OpenAi => "gpt-4o",
            ProviderId::OpenRouter => "anthropic/claude-sonnet-4",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a provider string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseProviderError(pub String);

impl fmt::Display for ParseProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported provider: {}", self.0)
    }
}

impl std::error::Error for ParseProviderError {}

impl FromStr for ProviderId {
    type Err = ParseProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ProviderId::Anthropic),
            "openai" | "gpt" => Ok(ProviderId::OpenAi),
            "openrouter" => Ok(ProviderId::OpenRouter),
            other => Err(ParseProviderError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_roundtrip_str() {
        for provider in ProviderId::ALL {
            assert_eq!(provider.as_str().parse::<ProviderId>().unwrap(), provider);
        }
    }

    #[test]
    fn test_provider_aliases() {
        assert_eq!("Claude".parse::<ProviderId>().unwrap(), ProviderId::Anthropic);
        assert_eq!(" OPENAI ".parse::<ProviderId>().unwrap(), ProviderId::OpenAi);
    }

    #[test]
    fn test_provider_unknown() {
        let err = "gemini".parse::<ProviderId>().unwrap_err();
        assert_eq!(err.to_string(), "unsupported provider: gemini");
    }

    #[test]
    fn test_provider_serde() {
        let json = serde_json::to_string(&ProviderId::OpenRouter).unwrap();
        assert_eq!(json, "\"openrouter\"");
        let parsed: ProviderId = serde_json::from_str("\"openai\"").unwrap();
        assert_eq!(parsed, ProviderId::OpenAi);
    }
}
