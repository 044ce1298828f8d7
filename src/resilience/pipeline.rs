//! Pipeline composition and caching.
//!
//! A pipeline is the long-lived execution unit for one target/method/policy
//! combination: retry around timeout around circuit breaker around the
//! transport call. Pipelines are built lazily, exactly once per key, and
//! live for the process lifetime.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::Method;

use crate::config::ServicePolicy;
use crate::resilience::backoff::retry_delay;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::retries::is_retryable;
use crate::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// Backoff delays stop growing past this point.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(10);

/// Result of one pipeline execution, propagated by value through the
/// stages. No stage signals failure by panicking or erroring out.
#[derive(Debug, Clone)]
pub enum CallOutcome {
    /// The transport produced a response; may still be a 4xx/5xx.
    Response(TransportResponse),

    /// The timeout stage tripped before the transport finished.
    TimedOut,

    /// The circuit breaker refused the call without reaching transport.
    CircuitOpen,

    /// Connection-level failure from the transport.
    Transport(TransportError),
}

/// What the circuit breaker counts as a failure: connection-level errors,
/// internal timeouts, and statuses strictly above 500. Deliberate 4xx
/// responses never trip the breaker.
fn is_breaker_failure(outcome: &CallOutcome) -> bool {
    match outcome {
        CallOutcome::Response(rsp) => rsp.status.as_u16() > 500,
        CallOutcome::TimedOut | CallOutcome::Transport(_) => true,
        CallOutcome::CircuitOpen => false,
    }
}

/// Identity of a cached pipeline.
///
/// The policy's own parameter values are part of the key, so a call passing
/// different inline parameters gets its own pipeline instead of corrupting a
/// shared breaker's statistics. A `policy_key` replaces the method component,
/// letting callers force several call shapes onto one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    target: String,
    method: Option<Method>,
    policy_key: Option<String>,
    params: PolicyParams,
}

impl PipelineKey {
    pub fn new(
        target: &str,
        method: &Method,
        policy_key: Option<&str>,
        policy: &ServicePolicy,
    ) -> Self {
        Self {
            target: target.to_string(),
            method: if policy_key.is_some() {
                None
            } else {
                Some(method.clone())
            },
            policy_key: policy_key.map(str::to_string),
            params: PolicyParams::from(policy),
        }
    }
}

/// Hashable mirror of the policy parameter values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PolicyParams {
    retry: Option<(u32, u64)>,
    timeout_ms: Option<u64>,
    breaker: Option<(u64, u32, u64, u64)>,
}

impl From<&ServicePolicy> for PolicyParams {
    fn from(policy: &ServicePolicy) -> Self {
        Self {
            retry: policy.retry.as_ref().map(|r| (r.retry_count, r.delay_ms)),
            timeout_ms: policy.timeout.as_ref().map(|t| t.timeout_ms),
            breaker: policy.circuit_breaker.as_ref().map(|cb| {
                (
                    cb.failure_ratio.to_bits(),
                    cb.minimum_throughput,
                    cb.sampling_secs,
                    cb.break_secs,
                )
            }),
        }
    }
}

/// Composed execution unit: retry ∘ timeout ∘ circuit breaker ∘ transport.
///
/// Absent sub-policies are compiled out at build time; an empty policy
/// degenerates to a bare transport call.
pub struct Pipeline {
    retry: Option<(u32, Duration)>,
    timeout: Option<Duration>,
    breaker: Option<CircuitBreaker>,
}

impl Pipeline {
    pub fn new(policy: &ServicePolicy) -> Self {
        Self {
            retry: policy
                .retry
                .as_ref()
                .map(|r| (r.retry_count, r.base_delay())),
            timeout: policy.timeout.as_ref().map(|t| t.duration()),
            breaker: policy
                .circuit_breaker
                .as_ref()
                .map(|cb| CircuitBreaker::new(cb.clone())),
        }
    }

    /// Run the full pipeline for one logical request.
    pub async fn execute<T: Transport>(
        &self,
        transport: &T,
        target: &str,
        request: &TransportRequest,
    ) -> CallOutcome {
        let (retries, base_delay) = self.retry.unwrap_or((0, Duration::ZERO));
        let max_attempts = retries + 1;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = self.execute_once(transport, target, request).await;

            if attempt < max_attempts && is_retryable(&outcome) {
                let delay = retry_delay(attempt, base_delay, MAX_RETRY_DELAY);
                tracing::debug!(
                    target_name = %target,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying after transient failure"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return outcome;
        }
    }

    /// One attempt: breaker admission, then the transport call under the
    /// configured deadline, then outcome reporting back to the breaker.
    async fn execute_once<T: Transport>(
        &self,
        transport: &T,
        target: &str,
        request: &TransportRequest,
    ) -> CallOutcome {
        let admission = match &self.breaker {
            Some(breaker) => match breaker.try_acquire() {
                Ok(admission) => Some(admission),
                Err(_) => {
                    tracing::warn!(target_name = %target, "call rejected by open circuit");
                    return CallOutcome::CircuitOpen;
                }
            },
            None => None,
        };

        let call = transport.send(target, request.clone());
        let outcome = match self.timeout {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(Ok(rsp)) => CallOutcome::Response(rsp),
                Ok(Err(e)) => CallOutcome::Transport(e),
                Err(_) => {
                    tracing::warn!(
                        target_name = %target,
                        timeout_ms = deadline.as_millis() as u64,
                        "attempt timed out"
                    );
                    CallOutcome::TimedOut
                }
            },
            None => match call.await {
                Ok(rsp) => CallOutcome::Response(rsp),
                Err(e) => CallOutcome::Transport(e),
            },
        };

        if let (Some(breaker), Some(admission)) = (&self.breaker, admission) {
            breaker.record(admission, !is_breaker_failure(&outcome));
        }

        outcome
    }
}

/// Process-wide pipeline cache: created with the client, read/write for the
/// process lifetime, entries never evicted (the key space is bounded by the
/// distinct target/method/policy combinations in use).
#[derive(Default)]
pub struct PipelineCache {
    inner: DashMap<PipelineKey, Arc<Pipeline>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the pipeline for `key`, building it on first use. The entry
    /// API serializes racing builders per key, so two racing callers can
    /// never publish two divergent breaker instances.
    pub fn get_or_build(&self, key: PipelineKey, policy: &ServicePolicy) -> Arc<Pipeline> {
        self.inner
            .entry(key)
            .or_insert_with(|| Arc::new(Pipeline::new(policy)))
            .clone()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }
}
