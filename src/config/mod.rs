//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → handed to the client at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; targets never change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::CircuitBreakerPolicy;
pub use schema::RelayConfig;
pub use schema::RetryPolicy;
pub use schema::ServicePolicy;
pub use schema::TargetConfig;
pub use schema::TimeoutPolicy;
