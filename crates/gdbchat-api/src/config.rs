//! API configuration.

use std::time::{Duration, Instant};

/// Default cap on upload size.
pub const DEFAULT_UPLOAD_LIMIT: usize = 100 * 1024 * 1024;

/// Default wait for open connections after shutdown is requested.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to bind to.
    pub port: u16,
    /// Largest accepted upload body in bytes.
    pub upload_limit: usize,
    /// How long open connections may finish after shutdown is requested.
    pub shutdown_grace: Duration,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl ApiConfig {
    /// Creates a new API configuration with the given host and port.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Sets the upload size limit.
    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.upload_limit = limit;
        self
    }

    /// Sets the shutdown grace window.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Returns the bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            upload_limit: DEFAULT_UPLOAD_LIMIT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            start_time: Instant::now(),
        }
    }
}
