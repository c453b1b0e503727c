//! Session settings persisted between runs.

use serde::{Deserialize, Serialize};

use crate::provider::ProviderId;

/// Provider selection and credentials.
///
/// Serialized as `{provider, model, apiKey}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Selected provider.
    pub provider: ProviderId,
    /// Model identifier sent to the provider.
    pub model: String,
    /// Provider credential.
    #[serde(default)]
    pub api_key: String,
}

impl Settings {
    /// Creates settings for a provider using its default model.
    pub fn for_provider(provider: ProviderId) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: String::new(),
        }
    }

    /// Sets the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Returns true if a credential is configured.
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_provider(ProviderId::Anthropic)
    }
}

// The credential never reaches logs.
impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &if self.has_api_key() { "<set>" } else { "<unset>" })
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_wire_shape() {
        let settings = Settings::for_provider(ProviderId::OpenAi)
            .with_model("gpt-4o-mini")
            .with_api_key("sk-test");
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["provider"], "openai");
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["apiKey"], "sk-test");
    }

    #[test]
    fn test_settings_missing_key_defaults_empty() {
        let settings: Settings =
            serde_json::from_str(r#"{"provider":"anthropic","model":"m"}"#).unwrap();
        assert!(!settings.has_api_key());
    }

    #[test]
    fn test_settings_debug_hides_key() {
        let settings = Settings::default().with_api_key("secret-value");
        let debug = format!("{:?}", settings);
        assert!(!debug.contains("secret-value"));
        assert!(debug.contains("<set>"));
    }
}
