//! Response cache keyed by request fingerprint.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gdbchat_models::{ChatOutcome, ChatRequest, ProviderId};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub max_size: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(300),
            max_size: 100,
        }
    }
}

impl CacheConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }
}

/// SHA-256 over provider, model, message, history and context items.
pub fn fingerprint(provider: ProviderId, model: &str, request: &ChatRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(provider.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(model.as_bytes());
    hasher.update([0u8]);
    hasher.update(request.message.as_bytes());
    hasher.update([0u8]);
    // Vec serialization of plain structs cannot fail.
    hasher.update(serde_json::to_vec(&request.history).unwrap_or_default());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(&request.context).unwrap_or_default());

    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ChatOutcome,
    created_at: Instant,
    expires_at: Instant,
    access_count: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    /// Least recently used at the front.
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        self.order.retain(|k| k != key);
    }
}

/// Cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

/// TTL + LRU cache of final chat outcomes.
#[derive(Debug)]
pub struct ResponseCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

impl ResponseCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A copy of the cached outcome, marked `from_cache`.
    pub fn get(&self, key: &str) -> Option<ChatOutcome> {
        if !self.config.enabled {
            return None;
        }
        let mut inner = self.lock();
        let now = Instant::now();

        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.expires_at <= now,
        };
        if expired {
            inner.remove(key);
            inner.misses += 1;
            return None;
        }

        inner.hits += 1;
        inner.touch(key);
        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        debug!(
            age_ms = now.duration_since(entry.created_at).as_millis() as u64,
            access_count = entry.access_count,
            "cache hit"
        );
        let mut value = entry.value.clone();
        value.from_cache = true;
        Some(value)
    }

    /// Insert, evicting the least recently used entry when full.
    pub fn insert(&self, key: impl Into<String>, value: ChatOutcome) {
        if !self.config.enabled {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let mut inner = self.lock();

        if inner.entries.contains_key(&key) {
            inner.remove(&key);
        }
        while inner.entries.len() >= self.config.max_size.max(1) {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            inner.entries.remove(&oldest);
            debug!(key = %oldest, "cache entry evicted");
        }

        let mut value = value;
        value.from_cache = false;
        inner.entries.insert(
            key.clone(),
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + self.config.ttl,
                access_count: 0,
            },
        );
        inner.order.push_back(key);
    }

    /// Drop expired entries; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            inner.remove(key);
        }
        expired.len()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            enabled: self.config.enabled,
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    /// Sweep every quarter TTL until `cancel` fires. `None` when disabled.
    pub fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.enabled {
            return None;
        }
        let period = (self.config.ttl / 4).max(Duration::from_millis(10));
        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!(removed, "cache sweep");
                        }
                    }
                    _ = cancel.cancelled() => break,
                }
            }
        }))
    }
}
