//! Retry classification.
//!
//! # Responsibilities
//! - Decide whether a call outcome justifies another attempt
//! - The retry loop itself lives in the pipeline
//!
//! # Design Decisions
//! - Transient upstream statuses and connection errors are retryable
//! - Internal timeouts are retryable; caller cancellation is not (the
//!   future is simply dropped)
//! - A circuit-open rejection is never retryable: it already means
//!   "don't call", and looping against the breaker's instantaneous
//!   rejections would spin without benefit
//! - Classification here is independent from what the circuit breaker
//!   counts as a failure

use reqwest::StatusCode;

use crate::resilience::pipeline::CallOutcome;

/// Upstream statuses worth another attempt.
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
            | StatusCode::REQUEST_TIMEOUT
            | StatusCode::FAILED_DEPENDENCY
            | StatusCode::TOO_MANY_REQUESTS
    )
}

/// Whether the outcome of one attempt should trigger a retry.
pub fn is_retryable(outcome: &CallOutcome) -> bool {
    match outcome {
        CallOutcome::Response(rsp) => is_retryable_status(rsp.status),
        CallOutcome::TimedOut => true,
        CallOutcome::Transport(_) => true,
        CallOutcome::CircuitOpen => false,
    }
}
