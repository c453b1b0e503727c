//! Retries gated by per-provider circuit breakers.

use std::future::Future;
use std::sync::Arc;

use gdbchat_models::ProviderId;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::circuit::CircuitRegistry;
use crate::error::{LlmError, Result};
use crate::metrics::Metrics;
use crate::retry::{cancellable_sleep, RetryPolicy};

/// Runs provider calls with retry, circuit breaking and metrics.
#[derive(Debug, Clone)]
pub struct Resilience {
    policy: RetryPolicy,
    circuits: Arc<CircuitRegistry>,
    metrics: Arc<Metrics>,
}

impl Resilience {
    pub fn new(policy: RetryPolicy, circuits: Arc<CircuitRegistry>, metrics: Arc<Metrics>) -> Self {
        Self {
            policy,
            circuits,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn circuits(&self) -> &Arc<CircuitRegistry> {
        &self.circuits
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Run `op` under the default policy.
    pub async fn execute<T, F, Fut>(
        &self,
        provider: ProviderId,
        cancel: &CancellationToken,
        op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with_policy(provider, &self.policy, cancel, op)
            .await
    }

    /// Run `op` under `policy`.
    ///
    /// Every attempt first asks the provider's breaker; a refusal returns
    /// [`ErrorKind::CircuitOpen`](crate::ErrorKind::CircuitOpen) without
    /// invoking `op`. Cancellation is honored before each attempt, during the
    /// call, and during every backoff sleep.
    pub async fn execute_with_policy<T, F, Fut>(
        &self,
        provider: ProviderId,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.circuits.breaker(provider);
        let attempts = policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            if cancel.is_cancelled() {
                return Err(LlmError::cancelled());
            }
            // Dropping this future mid-call drops the permit, which frees a
            // half-open trial.
            let Some(permit) = breaker.acquire() else {
                self.metrics.record_circuit_rejection(provider);
                warn!(provider = %provider, attempt, "call refused by open circuit");
                return Err(LlmError::circuit_open(provider.as_str()));
            };

            self.metrics.record_request(provider);
            let started = Instant::now();
            let result = tokio::select! {
                r = op() => r,
                _ = cancel.cancelled() => Err(LlmError::cancelled()),
            };

            let err = match result {
                Ok(value) => {
                    permit.success();
                    self.metrics.record_latency(provider, started.elapsed());
                    debug!(provider = %provider, attempt, "provider call succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };

            if err.trips_circuit() {
                permit.failure();
                self.metrics.record_error(provider);
            } else {
                permit.release();
            }

            if attempt >= attempts || !err.retryable() {
                debug!(provider = %provider, attempt, error = %err, "provider call failed");
                return Err(err);
            }

            let delay = policy.backoff(attempt);
            self.metrics.record_retry(provider);
            warn!(
                provider = %provider,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "provider call failed, retrying"
            );
            cancellable_sleep(delay, cancel).await?;
            attempt += 1;
        }
    }
}
