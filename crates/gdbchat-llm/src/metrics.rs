//! Per-provider counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use gdbchat_models::ProviderId;
use serde::Serialize;

#[derive(Debug, Default)]
struct Counters {
    requests: AtomicU64,
    errors: AtomicU64,
    retries: AtomicU64,
    circuit_rejections: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    latency_total_ms: AtomicU64,
    latency_samples: AtomicU64,
}

/// Serializable view of one provider's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetrics {
    pub requests: u64,
    pub errors: u64,
    pub retries: u64,
    pub circuit_rejections: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub avg_latency_ms: f64,
}

/// Lock-free counters for every provider.
#[derive(Debug, Default)]
pub struct Metrics {
    providers: [Counters; 3],
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, provider: ProviderId) -> &Counters {
        let idx = match provider {
            ProviderId::Anthropic => 0,
            ProviderId::OpenAi => 1,
            ProviderId::OpenRouter => 2,
        };
        &self.providers[idx]
    }

    /// One provider invocation was attempted.
    pub fn record_request(&self, provider: ProviderId) {
        self.slot(provider).requests.fetch_add(1, Ordering::Relaxed);
    }

    /// An invocation succeeded after `latency`.
    pub fn record_latency(&self, provider: ProviderId, latency: Duration) {
        let c = self.slot(provider);
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        c.latency_total_ms.fetch_add(ms, Ordering::Relaxed);
        c.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, provider: ProviderId) {
        self.slot(provider).errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self, provider: ProviderId) {
        self.slot(provider).retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_circuit_rejection(&self, provider: ProviderId) {
        self.slot(provider)
            .circuit_rejections
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self, provider: ProviderId) {
        self.slot(provider).cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self, provider: ProviderId) {
        self.slot(provider).cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Counters for one provider.
    pub fn provider(&self, provider: ProviderId) -> ProviderMetrics {
        let c = self.slot(provider);
        let samples = c.latency_samples.load(Ordering::Relaxed);
        let total = c.latency_total_ms.load(Ordering::Relaxed);
        ProviderMetrics {
            requests: c.requests.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
            retries: c.retries.load(Ordering::Relaxed),
            circuit_rejections: c.circuit_rejections.load(Ordering::Relaxed),
            cache_hits: c.cache_hits.load(Ordering::Relaxed),
            cache_misses: c.cache_misses.load(Ordering::Relaxed),
            avg_latency_ms: if samples == 0 {
                0.0
            } else {
                total as f64 / samples as f64
            },
        }
    }

    /// Counters for every provider, keyed by provider id.
    pub fn snapshot(&self) -> BTreeMap<String, ProviderMetrics> {
        ProviderId::ALL
            .iter()
            .map(|p| (p.as_str().to_string(), self.provider(*p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_provider() {
        let m = Metrics::new();
        m.record_request(ProviderId::Anthropic);
        m.record_request(ProviderId::Anthropic);
        m.record_error(ProviderId::Anthropic);
        m.record_retry(ProviderId::OpenAi);
        m.record_cache_hit(ProviderId::OpenRouter);
        m.record_cache_miss(ProviderId::OpenRouter);

        let a = m.provider(ProviderId::Anthropic);
        assert_eq!(a.requests, 2);
        assert_eq!(a.errors, 1);
        assert_eq!(a.retries, 0);
        assert_eq!(m.provider(ProviderId::OpenAi).retries, 1);

        let snap = m.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap["openrouter"].cache_hits, 1);
        assert_eq!(snap["openrouter"].cache_misses, 1);
    }

    #[test]
    fn test_latency_average() {
        let m = Metrics::new();
        assert_eq!(m.provider(ProviderId::OpenAi).avg_latency_ms, 0.0);
        m.record_latency(ProviderId::OpenAi, Duration::from_millis(100));
        m.record_latency(ProviderId::OpenAi, Duration::from_millis(300));
        assert_eq!(m.provider(ProviderId::OpenAi).avg_latency_ms, 200.0);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let m = Metrics::new();
        let value = serde_json::to_value(m.snapshot()).unwrap();
        assert!(value["anthropic"].get("avgLatencyMs").is_some());
        assert!(value["anthropic"].get("cacheHits").is_some());
    }
}
