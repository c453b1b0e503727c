//! Command-line interface definition using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use gdbchat_api::ApiConfig;
use gdbchat_debugger::DebuggerConfig;
use gdbchat_llm::{CacheConfig, CircuitConfig, ContextConfig, RetryPolicy};
use gdbchat_orchestrator::OrchestratorConfig;

/// GDB Chat - talk to an LLM that drives GDB for you
#[derive(Parser, Debug)]
#[command(name = "gdbchat")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Address to bind the HTTP server to
    #[arg(long, env = "GDBCHAT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(short, long, env = "GDBCHAT_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Debugger binary (resolved through PATH)
    #[arg(long, env = "GDBCHAT_GDB", default_value = "gdb")]
    pub gdb: PathBuf,

    /// Milliseconds to collect output after each debugger command
    #[arg(long, env = "GDBCHAT_CAPTURE_TIMEOUT_MS", default_value_t = 2000)]
    pub capture_timeout_ms: u64,

    /// Deadline for one whole chat request, in seconds
    #[arg(long, env = "GDBCHAT_CHAT_TIMEOUT_SECS", default_value_t = 120)]
    pub chat_timeout_secs: u64,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "GDBCHAT_UPLOAD_LIMIT_MB", default_value_t = 100)]
    pub upload_limit_mb: usize,

    /// Seconds open connections may finish after a shutdown signal
    #[arg(long, env = "GDBCHAT_SHUTDOWN_GRACE_SECS", default_value_t = 5)]
    pub shutdown_grace_secs: u64,

    /// Provider attempts per call, including the first
    #[arg(long, env = "GDBCHAT_RETRY_ATTEMPTS", default_value_t = 3)]
    pub retry_attempts: u32,

    /// First retry delay in milliseconds
    #[arg(long, env = "GDBCHAT_RETRY_BASE_MS", default_value_t = 1000)]
    pub retry_base_ms: u64,

    /// Retry delay ceiling in milliseconds
    #[arg(long, env = "GDBCHAT_RETRY_MAX_MS", default_value_t = 10_000)]
    pub retry_max_ms: u64,

    /// Consecutive provider failures that open the circuit
    #[arg(long, env = "GDBCHAT_CIRCUIT_THRESHOLD", default_value_t = 5)]
    pub circuit_threshold: u32,

    /// Seconds an open circuit waits before a trial call
    #[arg(long, env = "GDBCHAT_CIRCUIT_TIMEOUT_SECS", default_value_t = 30)]
    pub circuit_timeout_secs: u64,

    /// Cache chat responses
    #[arg(long, env = "GDBCHAT_CACHE")]
    pub cache: bool,

    /// Cache entry lifetime in seconds
    #[arg(long, env = "GDBCHAT_CACHE_TTL_SECS", default_value_t = 300)]
    pub cache_ttl_secs: u64,

    /// Most cached responses kept
    #[arg(long, env = "GDBCHAT_CACHE_SIZE", default_value_t = 100)]
    pub cache_size: usize,

    /// Trim oversized requests before sending them
    #[arg(long, env = "GDBCHAT_CONTEXT")]
    pub context: bool,

    /// Token cap for one request when trimming is on
    #[arg(long, env = "GDBCHAT_CONTEXT_MAX_TOKENS", default_value_t = 8000)]
    pub context_max_tokens: usize,

    /// History length above which older turns are summarized
    #[arg(long, env = "GDBCHAT_CONTEXT_COMPRESSION_THRESHOLD", default_value_t = 10)]
    pub context_compression_threshold: usize,

    /// Recent history entries that are never summarized or dropped
    #[arg(long, env = "GDBCHAT_CONTEXT_PRIORITY_RECENT", default_value_t = 4)]
    pub context_priority_recent: usize,

    /// Ask the model to reformat replies that carry no action block
    #[arg(
        long,
        env = "GDBCHAT_REFORMAT",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub reformat: bool,
}

impl Cli {
    /// Returns the log level based on verbosity.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.host.clone(), self.port)
            .with_upload_limit(self.upload_limit_mb.saturating_mul(1024 * 1024))
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
    }

    pub fn debugger_config(&self) -> DebuggerConfig {
        DebuggerConfig::new()
            .with_debugger(self.gdb.clone())
            .with_capture_timeout(Duration::from_millis(self.capture_timeout_ms))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.retry_attempts)
            .with_base_delay(Duration::from_millis(self.retry_base_ms))
            .with_max_delay(Duration::from_millis(self.retry_max_ms))
    }

    pub fn circuit_config(&self) -> CircuitConfig {
        CircuitConfig::default()
            .with_threshold(self.circuit_threshold)
            .with_timeout(Duration::from_secs(self.circuit_timeout_secs))
    }

    pub fn cache_config(&self) -> CacheConfig {
        let base = if self.cache {
            CacheConfig::enabled()
        } else {
            CacheConfig::default()
        };
        base.with_ttl(Duration::from_secs(self.cache_ttl_secs))
            .with_max_size(self.cache_size)
    }

    pub fn context_config(&self) -> ContextConfig {
        let base = if self.context {
            ContextConfig::enabled()
        } else {
            ContextConfig::default()
        };
        base.with_max_tokens(self.context_max_tokens)
            .with_compression_threshold(self.context_compression_threshold)
            .with_priority_recent(self.context_priority_recent)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig::default()
            .with_overall_timeout(Duration::from_secs(self.chat_timeout_secs))
            .with_reformat(self.reformat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["gdbchat"]);
        assert_eq!(cli.log_level(), "info");
        assert_eq!(cli.api_config().bind_address(), "127.0.0.1:8080");
        assert_eq!(cli.api_config().upload_limit, 100 * 1024 * 1024);
        assert_eq!(cli.api_config().shutdown_grace, Duration::from_secs(5));
        assert!(!cli.cache_config().enabled);
        assert!(!cli.context_config().enabled);
        assert!(cli.orchestrator_config().reformat);
        assert_eq!(
            cli.debugger_config().capture_timeout,
            Duration::from_secs(2)
        );
        assert_eq!(cli.retry_policy(), RetryPolicy::default());
        assert_eq!(cli.circuit_config(), CircuitConfig::default());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "gdbchat",
            "-vv",
            "--port",
            "9000",
            "--shutdown-grace-secs",
            "1",
            "--cache",
            "--cache-ttl-secs",
            "60",
            "--context",
            "--context-max-tokens",
            "2000",
            "--reformat",
            "false",
            "--retry-attempts",
            "1",
            "--circuit-threshold",
            "2",
            "--gdb",
            "/usr/local/bin/gdb",
        ]);
        assert_eq!(cli.log_level(), "trace");
        assert_eq!(cli.api_config().port, 9000);
        assert_eq!(cli.api_config().shutdown_grace, Duration::from_secs(1));

        let cache = cli.cache_config();
        assert!(cache.enabled);
        assert_eq!(cache.ttl, Duration::from_secs(60));

        let context = cli.context_config();
        assert!(context.enabled);
        assert_eq!(context.max_tokens, 2000);

        assert!(!cli.orchestrator_config().reformat);
        assert_eq!(cli.retry_policy().max_attempts, 1);
        assert_eq!(cli.circuit_config().threshold, 2);
        assert_eq!(
            cli.debugger_config().debugger,
            PathBuf::from("/usr/local/bin/gdb")
        );
    }
}
