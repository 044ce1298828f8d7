//! Caller-facing error type.
//!
//! Runtime failures (timeouts, open circuits, upstream errors) are never
//! surfaced here; they become synthetic responses in the envelope. `Error`
//! is reserved for programming and wiring mistakes.

use thiserror::Error;

/// Errors returned from the caller-facing send boundary.
#[derive(Debug, Error)]
pub enum Error {
    /// The request named a target that is not configured and carried no
    /// base URL of its own, so no absolute URL can be built.
    #[error("unknown target `{0}` and no base url on the request")]
    UnknownTarget(String),

    /// The request body could not be serialized.
    #[error("failed to serialize request body")]
    Serialize(#[source] serde_json::Error),

    /// A successful response body could not be decoded into the requested type.
    #[error("failed to decode response body")]
    Decode(#[source] serde_json::Error),

    /// The default transport could not be constructed.
    #[error("failed to build http transport")]
    TransportBuild(#[source] reqwest::Error),
}
