//! Configuration schema definitions.
//!
//! This module defines the target and policy structures for the client.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the outbound call layer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Downstream target definitions, looked up by name.
    pub targets: Vec<TargetConfig>,
}

impl RelayConfig {
    /// Add a target, builder style. Convenient for in-code wiring and tests.
    pub fn target(mut self, target: TargetConfig) -> Self {
        self.targets.push(target);
        self
    }
}

/// A named downstream service with its base URL and default policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetConfig {
    /// Unique target identifier.
    pub name: String,

    /// Base URL requests to this target are resolved against.
    pub base_url: String,

    /// Default resiliency policy. Absent means "call transport directly".
    #[serde(default)]
    pub policy: Option<ServicePolicy>,
}

impl TargetConfig {
    /// Create a target with no default policy.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            policy: None,
        }
    }

    /// Attach a default policy.
    pub fn policy(mut self, policy: ServicePolicy) -> Self {
        self.policy = Some(policy);
        self
    }
}

/// Resiliency policy: optional retry, timeout and circuit-breaker parts.
///
/// A policy with all parts absent means no resiliency wrapping at all.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServicePolicy {
    pub retry: Option<RetryPolicy>,
    pub timeout: Option<TimeoutPolicy>,
    pub circuit_breaker: Option<CircuitBreakerPolicy>,
}

impl ServicePolicy {
    /// True when no sub-policy is configured.
    pub fn is_empty(&self) -> bool {
        self.retry.is_none() && self.timeout.is_none() && self.circuit_breaker.is_none()
    }

    /// Merge a per-call override with a target default, override wins
    /// field-by-field. Both absent yields the empty policy.
    pub fn resolve(
        default: Option<&ServicePolicy>,
        override_: Option<&ServicePolicy>,
    ) -> ServicePolicy {
        ServicePolicy {
            retry: override_
                .and_then(|p| p.retry.clone())
                .or_else(|| default.and_then(|p| p.retry.clone())),
            timeout: override_
                .and_then(|p| p.timeout.clone())
                .or_else(|| default.and_then(|p| p.timeout.clone())),
            circuit_breaker: override_
                .and_then(|p| p.circuit_breaker.clone())
                .or_else(|| default.and_then(|p| p.circuit_breaker.clone())),
        }
    }
}

/// Retry with exponential backoff and jitter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryPolicy {
    /// Number of retries on top of the initial attempt.
    pub retry_count: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_count: 1,
            delay_ms: 100,
        }
    }
}

impl RetryPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Deadline for a single attempt.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutPolicy {
    /// Attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for TimeoutPolicy {
    fn default() -> Self {
        Self { timeout_ms: 1000 }
    }
}

impl TimeoutPolicy {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Circuit breaker parameters over a rolling sampling window.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerPolicy {
    /// Failure ratio in [0, 1] at which the circuit opens.
    pub failure_ratio: f64,

    /// Minimum number of samples in the window before the ratio is acted on.
    pub minimum_throughput: u32,

    /// Rolling window length in seconds.
    pub sampling_secs: u64,

    /// How long the circuit stays open before allowing a trial call.
    pub break_secs: u64,
}

impl Default for CircuitBreakerPolicy {
    fn default() -> Self {
        Self {
            failure_ratio: 0.1,
            minimum_throughput: 100,
            sampling_secs: 30,
            break_secs: 5,
        }
    }
}

impl CircuitBreakerPolicy {
    pub fn sampling_window(&self) -> Duration {
        Duration::from_secs(self.sampling_secs)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_secs(self.break_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_prefers_override_field_by_field() {
        let default = ServicePolicy {
            retry: Some(RetryPolicy {
                retry_count: 3,
                delay_ms: 200,
            }),
            timeout: Some(TimeoutPolicy { timeout_ms: 500 }),
            circuit_breaker: None,
        };
        let override_ = ServicePolicy {
            retry: Some(RetryPolicy {
                retry_count: 1,
                delay_ms: 50,
            }),
            timeout: None,
            circuit_breaker: Some(CircuitBreakerPolicy::default()),
        };

        let effective = ServicePolicy::resolve(Some(&default), Some(&override_));

        assert_eq!(effective.retry.as_ref().unwrap().retry_count, 1);
        assert_eq!(effective.timeout.as_ref().unwrap().timeout_ms, 500);
        assert!(effective.circuit_breaker.is_some());
    }

    #[test]
    fn resolve_without_either_side_is_empty() {
        let effective = ServicePolicy::resolve(None, None);
        assert!(effective.is_empty());
    }

    #[test]
    fn config_parses_from_toml() {
        let raw = r#"
            [[targets]]
            name = "books"
            base_url = "http://api-books/"

            [targets.policy.retry]
            retry_count = 2
            delay_ms = 100

            [targets.policy.timeout]
            timeout_ms = 50
        "#;

        let config: RelayConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.targets.len(), 1);

        let target = &config.targets[0];
        assert_eq!(target.name, "books");
        let policy = target.policy.as_ref().unwrap();
        assert_eq!(policy.retry.as_ref().unwrap().retry_count, 2);
        assert_eq!(policy.timeout.as_ref().unwrap().timeout_ms, 50);
        assert!(policy.circuit_breaker.is_none());
    }

    #[test]
    fn defaults_match_documented_values() {
        assert_eq!(RetryPolicy::default().retry_count, 1);
        assert_eq!(TimeoutPolicy::default().timeout_ms, 1000);
        let cb = CircuitBreakerPolicy::default();
        assert_eq!(cb.minimum_throughput, 100);
        assert_eq!(cb.break_secs, 5);
    }
}
