//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: target assumed down, calls fail fast
//! - Half-Open: testing if the target recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure ratio >= threshold over >= minimum_throughput samples
//! Open → Half-Open: after break duration
//! Half-Open → Closed: trial call succeeds (window reset)
//! Half-Open → Open: trial call fails (timer restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per pipeline (never shared across distinct policy keys)
//! - Fail fast in Open state: rejection is immediate and observable
//! - Single trial call in Half-Open (prevents hammering a recovering target)
//! - Counters sit behind a mutex that is never held across an await
//! - Admissions carry an epoch token; an outcome recorded against a stale
//!   epoch is dropped, so a slow call admitted before a trip can never pose
//!   as the half-open trial

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::time::Instant;

use crate::config::CircuitBreakerPolicy;

/// Observable breaker state, mostly for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Returned when the breaker refuses to admit a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitRejected;

/// Proof of admission, handed back to [`CircuitBreaker::record`] with the
/// call's outcome. The epoch ties the outcome to the state the breaker was
/// in at admission time.
#[derive(Debug, Clone, Copy)]
pub struct Admission {
    epoch: u64,
}

enum State {
    Closed,
    Open { until: Instant },
    HalfOpen { trial_started: Option<Instant> },
}

struct Inner {
    state: State,
    /// Rolling window of (recorded-at, success) samples.
    samples: VecDeque<(Instant, bool)>,
    /// Bumped on every transition and trial admission; outcomes from an
    /// earlier epoch are ignored on arrival.
    epoch: u64,
}

/// Rolling-window circuit breaker.
pub struct CircuitBreaker {
    policy: CircuitBreakerPolicy,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(policy: CircuitBreakerPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::new(Inner {
                state: State::Closed,
                samples: VecDeque::new(),
                epoch: 0,
            }),
        }
    }

    /// Ask permission to place a call. `Err(CircuitRejected)` means the call
    /// must not happen; the rejection itself is the observable outcome.
    pub fn try_acquire(&self) -> Result<Admission, CircuitRejected> {
        let mut inner = self.lock();
        let now = Instant::now();

        match inner.state {
            State::Closed => Ok(Admission { epoch: inner.epoch }),
            State::Open { until } => {
                if now >= until {
                    tracing::info!("circuit breaker half-open, admitting trial call");
                    inner.epoch += 1;
                    inner.state = State::HalfOpen {
                        trial_started: Some(now),
                    };
                    Ok(Admission { epoch: inner.epoch })
                } else {
                    Err(CircuitRejected)
                }
            }
            State::HalfOpen { trial_started } => match trial_started {
                // A trial whose outcome never arrived (caller dropped the
                // future) releases its slot after one break duration.
                Some(started) if now < started + self.policy.break_duration() => {
                    Err(CircuitRejected)
                }
                _ => {
                    inner.epoch += 1;
                    inner.state = State::HalfOpen {
                        trial_started: Some(now),
                    };
                    Ok(Admission { epoch: inner.epoch })
                }
            },
        }
    }

    /// Record the outcome of an admitted call. An outcome whose admission
    /// predates the current epoch is discarded: the breaker has moved on
    /// since, and only the current trial may decide a half-open transition.
    pub fn record(&self, admission: Admission, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();

        if admission.epoch != inner.epoch {
            tracing::debug!("discarding outcome from a superseded admission");
            return;
        }

        match inner.state {
            State::HalfOpen { .. } => {
                inner.epoch += 1;
                if success {
                    tracing::info!("circuit breaker closing after successful trial");
                    inner.state = State::Closed;
                    inner.samples.clear();
                } else {
                    tracing::warn!(
                        break_secs = self.policy.break_secs,
                        "circuit breaker re-opening after failed trial"
                    );
                    inner.state = State::Open {
                        until: now + self.policy.break_duration(),
                    };
                }
            }
            State::Closed => {
                inner.samples.push_back((now, success));
                self.prune(&mut inner, now);

                let total = inner.samples.len() as u32;
                if total < self.policy.minimum_throughput {
                    return;
                }

                let failures = inner.samples.iter().filter(|(_, ok)| !ok).count();
                let ratio = failures as f64 / total as f64;
                if ratio >= self.policy.failure_ratio {
                    tracing::warn!(
                        failures,
                        total,
                        ratio,
                        break_secs = self.policy.break_secs,
                        "circuit breaker tripped open"
                    );
                    inner.epoch += 1;
                    inner.state = State::Open {
                        until: now + self.policy.break_duration(),
                    };
                    inner.samples.clear();
                }
            }
            // Outcome of a call admitted before the trip; nothing to update.
            State::Open { .. } => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        match self.lock().state {
            State::Closed => BreakerState::Closed,
            State::Open { .. } => BreakerState::Open,
            State::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        let window = self.policy.sampling_window();
        while let Some(&(at, _)) = inner.samples.front() {
            if now.duration_since(at) > window {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
