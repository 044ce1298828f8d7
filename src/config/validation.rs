//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check target names are unique and base URLs absolute
//! - Validate value ranges (timeouts > 0, ratio within [0, 1])
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function: RelayConfig -> Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the client

use thiserror::Error;
use url::Url;

use crate::config::schema::RelayConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("duplicate target name `{0}`")]
    DuplicateTarget(String),

    #[error("target `{name}` has an invalid base url `{base_url}`")]
    InvalidBaseUrl { name: String, base_url: String },

    #[error("target `{0}` has failure_ratio outside [0, 1]")]
    FailureRatioOutOfRange(String),

    #[error("target `{0}` has minimum_throughput of zero")]
    ZeroThroughput(String),

    #[error("target `{0}` has a zero-length sampling or break window")]
    ZeroWindow(String),

    #[error("target `{0}` has a zero timeout")]
    ZeroTimeout(String),
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for target in &config.targets {
        if !seen.insert(target.name.as_str()) {
            errors.push(ValidationError::DuplicateTarget(target.name.clone()));
        }

        if Url::parse(&target.base_url).is_err() {
            errors.push(ValidationError::InvalidBaseUrl {
                name: target.name.clone(),
                base_url: target.base_url.clone(),
            });
        }

        let Some(policy) = &target.policy else {
            continue;
        };

        if let Some(timeout) = &policy.timeout {
            if timeout.timeout_ms == 0 {
                errors.push(ValidationError::ZeroTimeout(target.name.clone()));
            }
        }

        if let Some(cb) = &policy.circuit_breaker {
            if !(0.0..=1.0).contains(&cb.failure_ratio) {
                errors.push(ValidationError::FailureRatioOutOfRange(target.name.clone()));
            }
            if cb.minimum_throughput == 0 {
                errors.push(ValidationError::ZeroThroughput(target.name.clone()));
            }
            if cb.sampling_secs == 0 || cb.break_secs == 0 {
                errors.push(ValidationError::ZeroWindow(target.name.clone()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
