//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Compute the wait before retry attempt `attempt` (1-based).
///
/// Doubles from `base` per attempt, capped at `max`, then jittered into
/// `[delay/2, delay]` so concurrent callers retrying against the same
/// upstream spread out instead of arriving in lockstep.
pub fn retry_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis() as u64;
    let max_ms = max.as_millis() as u64;

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    if capped == 0 {
        return Duration::ZERO;
    }

    let half = capped / 2;
    let jittered = rand::thread_rng().gen_range(half..=capped);

    Duration::from_millis(jittered)
}
