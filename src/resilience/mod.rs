//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to a target:
//!     → pipeline.rs (look up or build the cached pipeline for the key)
//!     → retry loop (retries.rs classification, backoff.rs delays)
//!     → timeout stage (deadline per attempt)
//!     → circuit_breaker.rs (admission + outcome recording)
//!     → transport call
//! ```
//!
//! # Design Decisions
//! - Pipelines are cached per target/method/policy-parameters key and are
//!   the only holders of breaker state
//! - Outcomes travel by value (CallOutcome), never as exceptions
//! - A rejection from an open breaker propagates; it is never retried

pub mod backoff;
pub mod circuit_breaker;
pub mod pipeline;
pub mod retries;

pub use circuit_breaker::{Admission, BreakerState, CircuitBreaker};
pub use pipeline::{CallOutcome, Pipeline, PipelineCache, PipelineKey};
