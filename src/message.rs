//! Request and response envelope types for the caller-facing boundary.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::ServicePolicy;
use crate::error::Error;

/// Header attached to synthetic responses produced inside the client,
/// distinguishing them from genuine upstream responses with the same status.
pub const FAILURE_DESC_HEADER: &str = "x-failure-desc";

/// Callback invoked with (status, raw body) on non-success responses.
pub type FailureHook = Arc<dyn Fn(StatusCode, &[u8]) + Send + Sync>;

/// A declarative outbound request.
///
/// `path` carries the query string already appended; the base URL comes from
/// target configuration unless overridden here.
#[derive(Clone)]
pub struct MsgRequest {
    /// Name of the configured target to call.
    pub service: String,

    /// Path (plus query string) relative to the target's base URL.
    pub path: String,

    pub method: Method,

    /// Header pairs; `None` values are skipped when the request is built.
    pub headers: Vec<(String, Option<String>)>,

    /// Serialized body, if any.
    pub body: Option<Bytes>,

    /// Opt out of single-flight deduplication for this request.
    pub skip_dedup: bool,

    /// Base URL override. Takes precedence over target configuration.
    pub base_url: Option<String>,

    /// Per-call policy override, merged field-wise over the target default.
    pub policy: Option<ServicePolicy>,

    /// Forces call shapes that would otherwise get distinct pipelines to
    /// share one circuit breaker and retry budget.
    pub policy_key: Option<String>,

    /// Invoked on non-success responses.
    pub on_failure: Option<FailureHook>,
}

impl MsgRequest {
    /// A request with everything optional left empty.
    pub fn new(service: impl Into<String>, method: Method, path: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            method,
            headers: Vec::new(),
            body: None,
            skip_dedup: false,
            base_url: None,
            policy: None,
            policy_key: None,
            on_failure: None,
        }
    }
}

impl std::fmt::Debug for MsgRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgRequest")
            .field("service", &self.service)
            .field("path", &self.path)
            .field("method", &self.method)
            .field("skip_dedup", &self.skip_dedup)
            .field("policy_key", &self.policy_key)
            .finish_non_exhaustive()
    }
}

/// Uniform response envelope. Timeouts, open circuits and transport errors
/// all arrive here as synthetic statuses, never as panics or `Err`.
#[derive(Debug, Clone)]
pub struct MsgResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl MsgResponse {
    /// Build a response generated inside the client rather than upstream.
    pub(crate) fn synthetic(status: StatusCode, cause: &'static str) -> Self {
        Self {
            status,
            headers: vec![(FAILURE_DESC_HEADER.to_string(), cause.to_string())],
            body: Bytes::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// First header with the given name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(Error::Decode)
    }
}

/// Envelope with the body decoded into a typed payload.
#[derive(Debug, Clone)]
pub struct TypedResponse<T> {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,

    /// Decoded body; present only for success statuses.
    pub content: Option<T>,

    /// Raw JSON of a non-success body, when no failure hook consumed it.
    pub problem_details: Option<serde_json::Value>,
}

impl<T> TypedResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
