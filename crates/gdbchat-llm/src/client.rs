//! HTTP clients for the Anthropic, OpenAI and OpenRouter chat APIs.
//!
//! All three sit behind one operation, [`ChatProvider::send`]. Each provider
//! has its own endpoint, auth headers, and request/response shape:
//!
//! | Provider   | Endpoint                   | Auth                                    |
//! |------------|----------------------------|-----------------------------------------|
//! | Anthropic  | `/v1/messages`             | `x-api-key`, `anthropic-version`        |
//! | OpenAI     | `/v1/chat/completions`     | `Authorization: Bearer`                 |
//! | OpenRouter | `/v1/chat/completions`     | `Authorization: Bearer`, `HTTP-Referer` |

use std::time::Duration;

use async_trait::async_trait;
use gdbchat_models::{HistoryMessage, ProviderId, Role};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{LlmError, Result};

/// Value of the `anthropic-version` header.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default per-call HTTP deadline.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default `max_tokens` for providers that require it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Base URLs for each provider. Paths are appended per provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub anthropic: String,
    pub openai: String,
    pub openrouter: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            anthropic: "https://api.anthropic.com".to_string(),
            openai: "https://api.openai.com".to_string(),
            openrouter: "https://openrouter.ai/api".to_string(),
        }
    }
}

impl ProviderEndpoints {
    /// Points every provider at one base URL (mock servers).
    pub fn all(base: impl Into<String>) -> Self {
        let base = base.into();
        Self {
            anthropic: base.clone(),
            openai: base.clone(),
            openrouter: base,
        }
    }

    /// Full request URL for `provider`.
    pub fn url(&self, provider: ProviderId) -> String {
        match provider {
            ProviderId::Anthropic => {
                format!("{}/v1/messages", self.anthropic.trim_end_matches('/'))
            }
            ProviderId::OpenAi => {
                format!("{}/v1/chat/completions", self.openai.trim_end_matches('/'))
            }
            ProviderId::OpenRouter => {
                format!("{}/v1/chat/completions", self.openrouter.trim_end_matches('/'))
            }
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Provider base URLs.
    pub endpoints: ProviderEndpoints,
    /// Per-call HTTP deadline.
    pub request_timeout: Duration,
    /// `max_tokens` sent when a request does not set one.
    pub default_max_tokens: u32,
    /// `HTTP-Referer` sent to OpenRouter.
    pub referer: String,
    /// `X-Title` sent to OpenRouter.
    pub title: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoints: ProviderEndpoints::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            default_max_tokens: DEFAULT_MAX_TOKENS,
            referer: "https://github.com/gdbchat/gdbchat".to_string(),
            title: "GDB Chat".to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_endpoints(mut self, endpoints: ProviderEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// A message on the wire: `{role, content}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }

    /// Convert from a history entry.
    pub fn from_history(msg: &HistoryMessage) -> Self {
        Self {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        }
    }

    fn is_system(&self) -> bool {
        self.role == Role::System.as_str()
    }
}

/// One provider call.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub provider: ProviderId,
    pub model: String,
    pub api_key: String,
    /// System prompt; Anthropic gets it as `system`, others as a leading message.
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    /// Ask OpenAI-compatible providers for `response_format: json_object`.
    pub json_mode: bool,
}

impl ProviderRequest {
    pub fn new(provider: ProviderId, model: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            api_key: api_key.into(),
            system: None,
            messages: Vec::new(),
            max_tokens: None,
            json_mode: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Token usage reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Text and usage extracted from a provider response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    pub text: String,
    pub usage: Option<Usage>,
}

impl ProviderReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

/// Anything that can answer a chat request.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Send one request. Cancelling `cancel` aborts the in-flight call.
    async fn send(&self, request: &ProviderRequest, cancel: &CancellationToken)
        -> Result<ProviderReply>;
}

/// reqwest-backed client for all three providers.
#[derive(Debug, Clone)]
pub struct ProviderClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ProviderClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LlmError::internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn build_body(&self, request: &ProviderRequest) -> Value {
        match request.provider {
            ProviderId::Anthropic => {
                // Anthropic rejects system-role messages; fold them into `system`.
                let mut system: Vec<&str> = request.system.iter().map(String::as_str).collect();
                let mut messages = Vec::with_capacity(request.messages.len());
                for m in &request.messages {
                    if m.is_system() {
                        system.push(&m.content);
                    } else {
                        messages.push(m);
                    }
                }
                let mut body = json!({
                    "model": request.model,
                    "messages": messages,
                    "max_tokens": request.max_tokens.unwrap_or(self.config.default_max_tokens),
                });
                if !system.is_empty() {
                    body["system"] = Value::String(system.join("\n\n"));
                }
                body
            }
            ProviderId::OpenAi | ProviderId::OpenRouter => {
                let mut messages = Vec::with_capacity(request.messages.len() + 1);
                if let Some(system) = &request.system {
                    messages.push(ChatMessage::system(system.clone()));
                }
                messages.extend(request.messages.iter().cloned());
                let mut body = json!({
                    "model": request.model,
                    "messages": messages,
                });
                if let Some(max_tokens) = request.max_tokens {
                    body["max_tokens"] = json!(max_tokens);
                }
                if request.json_mode {
                    body["response_format"] = json!({ "type": "json_object" });
                }
                body
            }
        }
    }

    fn build_request(&self, request: &ProviderRequest) -> reqwest::RequestBuilder {
        let url = self.config.endpoints.url(request.provider);
        let builder = self
            .http
            .post(url)
            .header("Content-Type", "application/json");
        match request.provider {
            ProviderId::Anthropic => builder
                .header("x-api-key", &request.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION),
            ProviderId::OpenAi => {
                builder.header("Authorization", format!("Bearer {}", request.api_key))
            }
            ProviderId::OpenRouter => builder
                .header("Authorization", format!("Bearer {}", request.api_key))
                .header("HTTP-Referer", &self.config.referer)
                .header("X-Title", &self.config.title),
        }
    }

    async fn round_trip(&self, request: &ProviderRequest) -> Result<ProviderReply> {
        let body = self.build_body(request);
        trace!(provider = %request.provider, body = %body, "sending provider request");

        let response = self
            .build_request(request)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::from_reqwest(&e))?;

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), &text));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| LlmError::model(format!("response is not JSON: {}", e)))?;
        let reply = extract_reply(request.provider, &value)?;

        debug!(
            provider = %request.provider,
            model = %request.model,
            chars = reply.text.len(),
            input_tokens = reply.usage.map_or(0, |u| u.input_tokens),
            output_tokens = reply.usage.map_or(0, |u| u.output_tokens),
            "provider reply received"
        );
        Ok(reply)
    }
}

#[async_trait]
impl ChatProvider for ProviderClient {
    async fn send(
        &self,
        request: &ProviderRequest,
        cancel: &CancellationToken,
    ) -> Result<ProviderReply> {
        if request.api_key.trim().is_empty() {
            return Err(LlmError::auth(format!(
                "no API key configured for {}",
                request.provider
            )));
        }
        if request.model.trim().is_empty() {
            return Err(LlmError::validation("model must not be empty"));
        }

        // Dropping the request future aborts the HTTP exchange.
        tokio::select! {
            result = self.round_trip(request) => result,
            _ = cancel.cancelled() => Err(LlmError::cancelled()),
        }
    }
}

/// Pull the reply text and usage out of a provider response body.
pub fn extract_reply(provider: ProviderId, value: &Value) -> Result<ProviderReply> {
    match provider {
        ProviderId::Anthropic => {
            let text = value
                .get("content")
                .and_then(Value::as_array)
                .and_then(|blocks| {
                    blocks.iter().find_map(|b| {
                        (b.get("type").and_then(Value::as_str) == Some("text"))
                            .then(|| b.get("text").and_then(Value::as_str))
                            .flatten()
                    })
                })
                .ok_or_else(|| LlmError::model("no text block in response"))?;
            let usage = value.get("usage").map(|u| Usage {
                input_tokens: u.get("input_tokens").and_then(Value::as_u64).unwrap_or(0),
                output_tokens: u.get("output_tokens").and_then(Value::as_u64).unwrap_or(0),
            });
            Ok(ProviderReply {
                text: text.to_string(),
                usage,
            })
        }
        ProviderId::OpenAi | ProviderId::OpenRouter => {
            let message = value
                .pointer("/choices/0/message")
                .ok_or_else(|| LlmError::model("no choices in response"))?;
            let text = match message.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let usage = value.get("usage").map(|u| Usage {
                input_tokens: u.get("prompt_tokens").and_then(Value::as_u64).unwrap_or(0),
                output_tokens: u
                    .get("completion_tokens")
                    .and_then(Value::as_u64)
                    .unwrap_or(0),
            });
            Ok(ProviderReply { text, usage })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> ProviderClient {
        ProviderClient::new(
            ClientConfig::default().with_endpoints(ProviderEndpoints::all(server.uri())),
        )
        .unwrap()
    }

    fn request(provider: ProviderId) -> ProviderRequest {
        ProviderRequest::new(provider, "test-model", "sk-test")
            .with_system("be terse")
            .with_messages(vec![ChatMessage::user("hello")])
    }

    #[test]
    fn test_endpoint_urls() {
        let e = ProviderEndpoints::default();
        assert_eq!(
            e.url(ProviderId::Anthropic),
            "https://api.anthropic.com/v1/messages"
        );
        assert_eq!(
            e.url(ProviderId::OpenAi),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            e.url(ProviderId::OpenRouter),
            "https://openrouter.ai/api/v1/chat/completions"
        );
    }

    #[test]
    fn test_anthropic_body_folds_system() {
        let client = ProviderClient::new(ClientConfig::default()).unwrap();
        let req = ProviderRequest::new(ProviderId::Anthropic, "m", "k")
            .with_system("rules")
            .with_messages(vec![
                ChatMessage::system("earlier summary"),
                ChatMessage::user("hi"),
            ]);
        let body = client.build_body(&req);
        assert_eq!(body["system"], "rules\n\nearlier summary");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_openai_body_leading_system() {
        let client = ProviderClient::new(ClientConfig::default()).unwrap();
        let req = request(ProviderId::OpenAi).with_json_mode(true);
        let body = client.build_body(&req);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!(body.get("system").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_extract_anthropic_skips_non_text_blocks() {
        let value = json!({
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "answer"}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 3}
        });
        let reply = extract_reply(ProviderId::Anthropic, &value).unwrap();
        assert_eq!(reply.text, "answer");
        assert_eq!(
            reply.usage,
            Some(Usage {
                input_tokens: 10,
                output_tokens: 3
            })
        );
    }

    #[test]
    fn test_extract_missing_content_is_model_error() {
        let err = extract_reply(ProviderId::Anthropic, &json!({"content": []})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Model);
        let err = extract_reply(ProviderId::OpenAi, &json!({"choices": []})).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Model);
    }

    #[tokio::test]
    async fn test_anthropic_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "system": "be terse",
                "messages": [{"role": "user", "content": "hello"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "hi there"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send(&request(ProviderId::Anthropic), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.text, "hi there");
    }

    #[tokio::test]
    async fn test_openai_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "test-model",
                "messages": [
                    {"role": "system", "content": "be terse"},
                    {"role": "user", "content": "hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "yo"}}],
                "usage": {"prompt_tokens": 5, "completion_tokens": 1}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send(&request(ProviderId::OpenAi), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.text, "yo");
        assert_eq!(reply.usage.unwrap().input_tokens, 5);
    }

    #[tokio::test]
    async fn test_openrouter_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("HTTP-Referer", "https://github.com/gdbchat/gdbchat"))
            .and(header("X-Title", "GDB Chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "routed"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send(&request(ProviderId::OpenRouter), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(reply.text, "routed");
    }

    #[tokio::test]
    async fn test_error_status_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send(&request(ProviderId::OpenAi), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.status, Some(429));
        assert!(err.retryable());
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = ProviderClient::new(ClientConfig::default()).unwrap();
        let req = ProviderRequest::new(ProviderId::Anthropic, "m", "");
        let err = client
            .send(&req, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Auth);
    }

    #[tokio::test]
    async fn test_cancel_aborts_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = client_for(&server)
            .send(&request(ProviderId::OpenAi), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }
}
