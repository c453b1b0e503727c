//! Per-provider circuit breakers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use gdbchat_models::ProviderId;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitConfig {
    /// Consecutive failures that open the circuit.
    pub threshold: u32,
    /// Time after the last failure before a trial call is allowed.
    pub timeout: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitConfig {
    pub fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

/// Closed/open/half-open breaker for one provider.
///
/// In half-open state exactly one trial call is admitted; others are refused
/// until it resolves.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current state, applying the open → half-open transition if due.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Consecutive failures recorded.
    pub fn failures(&self) -> u32 {
        self.lock().failures
    }

    fn refresh(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .last_failure
            .map_or(true, |at| at.elapsed() >= self.config.timeout);
        if elapsed {
            info!(circuit = %self.name, "circuit half-open");
            inner.state = CircuitState::HalfOpen;
            inner.trial_in_flight = false;
        }
    }

    /// Ask to make a call. `false` means refuse without calling.
    ///
    /// A granted half-open trial stays claimed until a verdict or
    /// [`release`](Self::release); prefer [`acquire`](Self::acquire) where the
    /// caller may be dropped mid-call.
    pub fn try_acquire(&self) -> bool {
        self.admit().is_some()
    }

    /// Ask to make a call, returning a permit that frees an unresolved
    /// half-open trial when dropped.
    pub fn acquire(&self) -> Option<CircuitPermit<'_>> {
        self.admit().map(|trial| CircuitPermit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    /// `Some(true)` when the admitted call is the half-open trial.
    fn admit(&self) -> Option<bool> {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        match inner.state {
            CircuitState::Closed => Some(false),
            CircuitState::Open => None,
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    None
                } else {
                    inner.trial_in_flight = true;
                    Some(true)
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(circuit = %self.name, "circuit closed");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.trial_in_flight = false;
    }

    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        inner.trial_in_flight = false;

        let reopen = inner.state == CircuitState::HalfOpen;
        if reopen || inner.failures >= self.config.threshold {
            if inner.state != CircuitState::Open {
                warn!(
                    circuit = %self.name,
                    failures = inner.failures,
                    "circuit opened"
                );
            }
            inner.state = CircuitState::Open;
        }
    }

    /// Release a half-open trial that ended without a verdict (e.g. cancelled).
    pub fn release(&self) {
        self.lock().trial_in_flight = false;
    }
}

/// One admitted call. Settle it with [`success`](Self::success),
/// [`failure`](Self::failure) or [`release`](Self::release); dropping it
/// unsettled releases the half-open trial it holds.
#[derive(Debug)]
#[must_use = "dropping the permit releases it without a verdict"]
pub struct CircuitPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl CircuitPermit<'_> {
    /// Whether this call is the half-open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// End without a verdict.
    pub fn release(mut self) {
        self.settled = true;
        if self.trial {
            self.breaker.release();
        }
    }
}

impl Drop for CircuitPermit<'_> {
    fn drop(&mut self) {
        if !self.settled && self.trial {
            debug!(circuit = %self.breaker.name, "half-open trial dropped without a verdict");
            self.breaker.release();
        }
    }
}

/// Lazily created breakers, one per provider, never removed.
#[derive(Debug)]
pub struct CircuitRegistry {
    config: CircuitConfig,
    breakers: Mutex<HashMap<ProviderId, Arc<CircuitBreaker>>>,
}

impl CircuitRegistry {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    /// The breaker for `provider`, created on first use.
    pub fn breaker(&self, provider: ProviderId) -> Arc<CircuitBreaker> {
        let mut breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(
            breakers
                .entry(provider)
                .or_insert_with(|| Arc::new(CircuitBreaker::new(provider.as_str(), self.config.clone()))),
        )
    }

    /// States of every provider; providers never called report closed.
    pub fn states(&self) -> Vec<(ProviderId, CircuitState)> {
        let breakers = self
            .breakers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        ProviderId::ALL
            .iter()
            .map(|p| {
                let state = breakers
                    .get(p)
                    .map_or(CircuitState::Closed, |b| b.state());
                (*p, state)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitConfig::default()
                .with_threshold(3)
                .with_timeout(Duration::from_secs(30)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_at_threshold() {
        let cb = breaker();
        assert!(cb.try_acquire());
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_count() {
        let cb = breaker();
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_after_timeout() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(!cb.try_acquire());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire());
        // Single flight.
        assert!(!cb.try_acquire());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_failure_reopens() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.try_acquire());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        // Timer restarts from the trial failure.
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!cb.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_frees_trial() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(cb.try_acquire());
        cb.release();
        assert!(cb.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_permit_frees_trial() {
        let cb = breaker();
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        let permit = cb.acquire().unwrap();
        assert!(permit.is_trial());
        assert!(cb.acquire().is_none());
        drop(permit);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        let permit = cb.acquire().unwrap();
        permit.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_permit_drop_keeps_trial() {
        let cb = breaker();
        let stale = cb.acquire().unwrap();
        assert!(!stale.is_trial());
        for _ in 0..3 {
            cb.record_failure();
        }
        tokio::time::advance(Duration::from_secs(31)).await;

        let trial = cb.acquire().unwrap();
        drop(stale);
        // The trial is still claimed.
        assert!(cb.acquire().is_none());
        trial.failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_per_provider() {
        let registry = CircuitRegistry::new(CircuitConfig::default().with_threshold(1));
        registry.breaker(ProviderId::Anthropic).record_failure();

        let a = registry.breaker(ProviderId::Anthropic);
        assert_eq!(a.state(), CircuitState::Open);
        assert!(registry.breaker(ProviderId::OpenAi).try_acquire());

        let states = registry.states();
        assert_eq!(states.len(), 3);
        assert!(states.contains(&(ProviderId::Anthropic, CircuitState::Open)));
        assert!(states.contains(&(ProviderId::OpenRouter, CircuitState::Closed)));
    }
}
