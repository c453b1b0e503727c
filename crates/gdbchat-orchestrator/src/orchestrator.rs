//! The chat-debugger orchestration loop.

use std::sync::Arc;
use std::time::Duration;

use gdbchat_debugger::DebuggerError;
use gdbchat_llm::{
    fingerprint, parse_reply, CacheConfig, ChatMessage, ChatProvider, CircuitConfig,
    CircuitRegistry, ContextConfig, ContextManager, ErrorKind, LlmError, Metrics, ParsedReply,
    ProviderReply, ProviderRequest, Resilience, ResponseCache, RetryPolicy,
};
use gdbchat_models::{ChatOutcome, ChatRequest, ContextItem, Settings};
use gdbchat_persistence::SessionLogger;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::debugger::DebuggerControl;
use crate::error::{OrchestratorError, Result};
use crate::prompt::{build_messages, build_reformat_messages, NOT_RUNNING_NOTE, SYSTEM_PROMPT};

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Deadline for one whole chat request.
    pub overall_timeout: Duration,
    /// Capture wait per command; `None` uses the engine's default.
    pub command_timeout: Option<Duration>,
    /// Issue one reformat turn when the reply has no valid action block.
    pub reformat: bool,
    /// Request `response_format: json_object` from OpenAI-compatible providers.
    pub json_mode: bool,
    /// `max_tokens` for provider calls; `None` uses the client default.
    pub max_tokens: Option<u32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            overall_timeout: Duration::from_secs(120),
            command_timeout: None,
            reformat: true,
            json_mode: true,
            max_tokens: None,
        }
    }
}

impl OrchestratorConfig {
    /// Sets the deadline for a whole chat request.
    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    /// Sets the capture wait per debugger command.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    /// Enables or disables the reformat turn.
    pub fn with_reformat(mut self, reformat: bool) -> Self {
        self.reformat = reformat;
        self
    }

    /// Enables or disables JSON response mode.
    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }
}

/// Which provider call a log line is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Primary,
    Reformat,
    FollowUp,
}

impl Turn {
    fn as_str(&self) -> &'static str {
        match self {
            Turn::Primary => "primary",
            Turn::Reformat => "reformat",
            Turn::FollowUp => "follow_up",
        }
    }
}

/// Commands run for one action block.
#[derive(Debug, Default)]
struct Execution {
    executed: Vec<String>,
    combined: String,
}

/// Drives one user submission from prompt to final answer.
///
/// The flow is strictly sequential:
///
/// ```text
/// prepare -> primary turn -> parse [-> reformat turn]
///         -> execute commands [-> follow-up turn] -> done
/// ```
///
/// Only a failed primary turn fails the request. Parse failures fall back to
/// the raw reply, per-command failures become part of the combined output,
/// and follow-up failures keep the primary text.
pub struct ChatOrchestrator {
    provider: Arc<dyn ChatProvider>,
    debugger: Arc<dyn DebuggerControl>,
    resilience: Resilience,
    cache: Arc<ResponseCache>,
    context: ContextManager,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    /// Create an orchestrator with default retry, circuit, cache (disabled)
    /// and context (disabled) settings.
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        debugger: Arc<dyn DebuggerControl>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            provider,
            debugger,
            resilience: Resilience::new(
                RetryPolicy::default(),
                Arc::new(CircuitRegistry::new(CircuitConfig::default())),
                Arc::new(Metrics::new()),
            ),
            cache: Arc::new(ResponseCache::new(CacheConfig::default())),
            context: ContextManager::new(ContextConfig::default()),
            config,
        }
    }

    /// Replaces the retry and circuit-breaker layer.
    pub fn with_resilience(mut self, resilience: Resilience) -> Self {
        self.resilience = resilience;
        self
    }

    /// Uses a shared response cache.
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the context trimming policy.
    pub fn with_context_manager(mut self, context: ContextManager) -> Self {
        self.context = context;
        self
    }

    /// Returns the orchestrator settings.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the retry and circuit-breaker layer.
    pub fn resilience(&self) -> &Resilience {
        &self.resilience
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// Returns the per-provider counters.
    pub fn metrics(&self) -> &Arc<Metrics> {
        self.resilience.metrics()
    }

    /// Handle one chat submission under the overall deadline.
    ///
    /// `settings` is a snapshot taken by the caller; `log` receives the
    /// request, provider usage, command results and the final answer.
    pub async fn handle(
        &self,
        settings: &Settings,
        request: ChatRequest,
        log: &SessionLogger,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome> {
        let cancel = cancel.child_token();
        let deadline = self.config.overall_timeout;

        let result = tokio::select! {
            r = self.run(settings, request, log, &cancel) => r,
            _ = tokio::time::sleep(deadline) => {
                cancel.cancel();
                Err(OrchestratorError::Timeout(deadline))
            }
        };

        if let Err(e) = &result {
            warn!(error = %e, "chat request failed");
            log.error(
                "chat_error",
                &e.to_string(),
                json!({ "provider": settings.provider.as_str(), "model": settings.model }),
            );
        }
        result
    }

    async fn run(
        &self,
        settings: &Settings,
        request: ChatRequest,
        log: &SessionLogger,
        cancel: &CancellationToken,
    ) -> Result<ChatOutcome> {
        log.info(
            "chat_request",
            &request.message,
            json!({
                "provider": settings.provider.as_str(),
                "model": settings.model,
                "historyLength": request.history.len(),
                "contextItems": request.context.len(),
            }),
        );

        // Prepare.
        let cache_key = fingerprint(settings.provider, &settings.model, &request);
        if self.cache.is_enabled() {
            if let Some(hit) = self.cache.get(&cache_key) {
                self.metrics().record_cache_hit(settings.provider);
                info!(provider = %settings.provider, "chat served from cache");
                log.info("chat_cache_hit", &hit.final_text, json!({ "key": cache_key }));
                return Ok(hit);
            }
            self.metrics().record_cache_miss(settings.provider);
        }

        // Primary turn.
        let mut primary_request = request.clone();
        self.fit_context(&mut primary_request, log);
        let provider_request = self.provider_request(settings, build_messages(&primary_request));
        let reply = self
            .call(
                settings,
                &provider_request,
                Turn::Primary,
                self.resilience.policy(),
                log,
                cancel,
            )
            .await?;

        // Parse, with at most one reformat turn.
        let mut parsed = parse_reply(&reply.text);
        debug!(strategy = ?parsed.strategy, "primary reply parsed");
        if parsed.is_fallback() && self.config.reformat && !reply.text.trim().is_empty() {
            parsed = self
                .reformat(settings, &primary_request, &reply.text, parsed, log, cancel)
                .await?;
        }

        let block = parsed.block;
        let mut final_text = block.text.clone();
        let mut execution = Execution::default();

        // Execute commands.
        if block.has_commands() {
            if self.debugger.is_running() {
                execution = self.execute_commands(&block.commands, log, cancel).await?;
            } else {
                info!(
                    commands = block.commands.len(),
                    "commands requested but debugger is not running"
                );
                log.warn(
                    "commands_skipped",
                    "GDB is not running",
                    json!({ "commands": block.commands }),
                );
                final_text.push_str(NOT_RUNNING_NOTE);
            }
        }

        // Follow-up turn.
        if block.wait_for_output && !execution.combined.trim().is_empty() {
            if let Some(text) = self
                .follow_up(settings, &request, &execution.combined, log, cancel)
                .await?
            {
                final_text = text;
            }
        }

        let outcome = ChatOutcome {
            final_text,
            executed_commands: execution.executed,
            combined_output: execution.combined,
            from_cache: false,
        };

        log.info(
            "chat_response",
            &outcome.final_text,
            json!({
                "executedCommands": outcome.executed_commands,
                "outputLength": outcome.combined_output.len(),
            }),
        );
        self.cache.insert(cache_key, outcome.clone());
        Ok(outcome)
    }

    fn provider_request(
        &self,
        settings: &Settings,
        messages: Vec<ChatMessage>,
    ) -> ProviderRequest {
        let mut request =
            ProviderRequest::new(settings.provider, &settings.model, &settings.api_key)
                .with_system(SYSTEM_PROMPT)
                .with_messages(messages)
                .with_json_mode(self.config.json_mode);
        if let Some(max_tokens) = self.config.max_tokens {
            request = request.with_max_tokens(max_tokens);
        }
        request
    }

    fn fit_context(&self, request: &mut ChatRequest, log: &SessionLogger) {
        let report = self.context.fit(request);
        if report.trimmed() {
            log.info(
                "context_trimmed",
                "request trimmed to token budget",
                json!({
                    "beforeTokens": report.before_tokens,
                    "afterTokens": report.after_tokens,
                    "summarized": report.summarized,
                    "droppedHistory": report.dropped_history,
                    "truncatedItems": report.truncated_items,
                    "truncatedMessage": report.truncated_message,
                }),
            );
        }
    }

    async fn call(
        &self,
        settings: &Settings,
        request: &ProviderRequest,
        turn: Turn,
        policy: &RetryPolicy,
        log: &SessionLogger,
        cancel: &CancellationToken,
    ) -> std::result::Result<ProviderReply, LlmError> {
        let result = self
            .resilience
            .execute_with_policy(settings.provider, policy, cancel, || {
                self.provider.send(request, cancel)
            })
            .await;

        match &result {
            Ok(reply) => {
                if let Some(usage) = reply.usage {
                    log.info(
                        "provider_usage",
                        turn.as_str(),
                        json!({
                            "provider": settings.provider.as_str(),
                            "model": settings.model,
                            "turn": turn.as_str(),
                            "inputTokens": usage.input_tokens,
                            "outputTokens": usage.output_tokens,
                        }),
                    );
                }
            }
            Err(e) => {
                log.error(
                    "provider_error",
                    &e.to_string(),
                    json!({
                        "provider": settings.provider.as_str(),
                        "turn": turn.as_str(),
                        "kind": e.kind.as_str(),
                        "status": e.status,
                    }),
                );
            }
        }
        result
    }

    async fn reformat(
        &self,
        settings: &Settings,
        request: &ChatRequest,
        previous: &str,
        fallback: ParsedReply,
        log: &SessionLogger,
        cancel: &CancellationToken,
    ) -> Result<ParsedReply> {
        let provider_request =
            self.provider_request(settings, build_reformat_messages(request, previous));
        let reply = self
            .call(
                settings,
                &provider_request,
                Turn::Reformat,
                &RetryPolicy::single_attempt(),
                log,
                cancel,
            )
            .await;

        match reply {
            Ok(reply) => {
                let parsed = parse_reply(&reply.text);
                if parsed.is_fallback() {
                    debug!("reformat turn did not yield an action block");
                    Ok(fallback)
                } else {
                    debug!(strategy = ?parsed.strategy, "reformat turn parsed");
                    Ok(parsed)
                }
            }
            Err(e) if e.kind == ErrorKind::Cancelled => Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(error = %e, "reformat turn failed, keeping raw reply");
                Ok(fallback)
            }
        }
    }

    async fn execute_commands(
        &self,
        commands: &[String],
        log: &SessionLogger,
        cancel: &CancellationToken,
    ) -> Result<Execution> {
        let mut execution = Execution::default();
        let mut outputs = Vec::with_capacity(commands.len());

        for command in commands {
            let result = self
                .debugger
                .execute_with_capture(command, self.config.command_timeout, cancel)
                .await;
            execution.executed.push(command.clone());

            match result {
                Ok(output) => {
                    log.info("gdb_command", command, json!({ "output": output }));
                    outputs.push(output);
                }
                Err(DebuggerError::Cancelled) => return Err(OrchestratorError::Cancelled),
                Err(e) => {
                    warn!(command = %command, error = %e, "debugger command failed");
                    log.warn(
                        "gdb_command_failed",
                        command,
                        json!({ "error": e.to_string() }),
                    );
                    outputs.push(format!("[{}] {}", command, e));
                }
            }
        }

        execution.combined = outputs.join("\n");
        Ok(execution)
    }

    /// Returns the follow-up text, or `None` to keep the primary text.
    async fn follow_up(
        &self,
        settings: &Settings,
        request: &ChatRequest,
        combined: &str,
        log: &SessionLogger,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let mut follow_request = request
            .clone()
            .with_context_item(ContextItem::command_output(combined));
        self.fit_context(&mut follow_request, log);

        let provider_request = self.provider_request(settings, build_messages(&follow_request));
        match self
            .call(
                settings,
                &provider_request,
                Turn::FollowUp,
                self.resilience.policy(),
                log,
                cancel,
            )
            .await
        {
            Ok(reply) if !reply.text.trim().is_empty() => {
                let parsed = parse_reply(&reply.text);
                debug!(strategy = ?parsed.strategy, "follow-up reply parsed");
                Ok(Some(parsed.block.text))
            }
            Ok(_) => {
                warn!("follow-up reply was empty, keeping primary text");
                Ok(None)
            }
            Err(e) if e.kind == ErrorKind::Cancelled => Err(OrchestratorError::Cancelled),
            Err(e) => {
                warn!(error = %e, "follow-up turn failed, keeping primary text");
                Ok(None)
            }
        }
    }
}
