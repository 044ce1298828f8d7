//! The caller-facing client.
//!
//! # Data Flow
//! ```text
//! MsgRequest
//!     → request filters (registration order)
//!     → policy resolution (per-call override over target default)
//!     → dedup cache (GET only, unless opted out)
//!     → pipeline cache (retry ∘ timeout ∘ circuit breaker ∘ transport)
//!     → outcome translation (synthetic 408/424/502 for internal failures)
//!     → MsgResponse envelope
//! ```
//!
//! # Design Decisions
//! - Callers always get an envelope; `Err` is reserved for wiring mistakes
//! - The pipeline and dedup maps are the only shared mutable state, both
//!   concurrent maps with per-key critical sections
//! - An empty effective policy skips the pipeline and calls transport
//!   directly

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::{RelayConfig, ServicePolicy, TargetConfig};
use crate::dedup::{DedupCache, DedupKey};
use crate::error::Error;
use crate::message::{MsgRequest, MsgResponse, TypedResponse};
use crate::resilience::pipeline::{CallOutcome, Pipeline, PipelineCache, PipelineKey};
use crate::transport::{ReqwestTransport, Transport, TransportRequest};

/// Rewrites outgoing requests before they reach the pipeline; useful for
/// ambient headers such as auth or correlation IDs.
pub trait RequestFilter: Send + Sync + 'static {
    fn filter(&self, request: MsgRequest) -> MsgRequest;
}

struct ClientInner<T> {
    transport: T,
    targets: HashMap<String, TargetConfig>,
    pipelines: PipelineCache,
    dedup: DedupCache,
    filters: Vec<Box<dyn RequestFilter>>,
}

/// Outbound HTTP call layer: declarative requests in, uniform envelopes out.
pub struct ServiceClient<T: Transport = ReqwestTransport> {
    inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for ServiceClient<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl ServiceClient<ReqwestTransport> {
    /// Client with the default `reqwest`-backed transport.
    pub fn new(config: RelayConfig) -> Result<Self, Error> {
        let transport = ReqwestTransport::new().map_err(Error::TransportBuild)?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T: Transport> ServiceClient<T> {
    /// Client over a caller-supplied transport.
    pub fn with_transport(config: RelayConfig, transport: T) -> Self {
        Self::assemble(config, transport, Vec::new())
    }

    /// Client over a caller-supplied transport plus request filters,
    /// applied to every request in registration order.
    pub fn with_transport_and_filters(
        config: RelayConfig,
        transport: T,
        filters: Vec<Box<dyn RequestFilter>>,
    ) -> Self {
        Self::assemble(config, transport, filters)
    }

    fn assemble(config: RelayConfig, transport: T, filters: Vec<Box<dyn RequestFilter>>) -> Self {
        let targets = config
            .targets
            .into_iter()
            .map(|t| (t.name.clone(), t))
            .collect();

        Self {
            inner: Arc::new(ClientInner {
                transport,
                targets,
                pipelines: PipelineCache::new(),
                dedup: DedupCache::new(),
                filters,
            }),
        }
    }

    /// Send a request with no body.
    pub async fn send(&self, request: MsgRequest) -> Result<MsgResponse, Error> {
        let (response, hook) = self.dispatch(request).await?;

        if !response.is_success() {
            if let Some(hook) = hook {
                hook(response.status, &response.body);
            }
        }

        Ok(response)
    }

    /// Send a request with a JSON body.
    pub async fn send_body<B: Serialize>(
        &self,
        mut request: MsgRequest,
        body: &B,
    ) -> Result<MsgResponse, Error> {
        request.body = Some(encode_body(body)?);
        push_json_content_type(&mut request);
        self.send(request).await
    }

    /// Send a request with no body, decoding a successful response as JSON.
    pub async fn send_typed<R: DeserializeOwned>(
        &self,
        request: MsgRequest,
    ) -> Result<TypedResponse<R>, Error> {
        let (response, hook) = self.dispatch(request).await?;
        translate_typed(response, hook)
    }

    /// Send a request with a JSON body, decoding a successful response as JSON.
    pub async fn send_body_typed<B: Serialize, R: DeserializeOwned>(
        &self,
        mut request: MsgRequest,
        body: &B,
    ) -> Result<TypedResponse<R>, Error> {
        request.body = Some(encode_body(body)?);
        push_json_content_type(&mut request);
        self.send_typed(request).await
    }

    /// Resolve, gate through dedup, execute and translate. Returns the
    /// envelope plus the caller's failure hook, which runs per caller
    /// rather than inside the shared call.
    async fn dispatch(
        &self,
        mut request: MsgRequest,
    ) -> Result<(MsgResponse, Option<crate::message::FailureHook>), Error> {
        for filter in &self.inner.filters {
            request = filter.filter(request);
        }
        let hook = request.on_failure.take();

        let target = self.inner.targets.get(&request.service);
        let policy = ServicePolicy::resolve(
            target.and_then(|t| t.policy.as_ref()),
            request.policy.as_ref(),
        );

        let base_url = request
            .base_url
            .as_deref()
            .or(target.map(|t| t.base_url.as_str()))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::UnknownTarget(request.service.clone()))?;

        let transport_request = TransportRequest {
            method: request.method.clone(),
            url: join_url(base_url, &request.path),
            headers: request
                .headers
                .iter()
                .filter_map(|(name, value)| value.as_ref().map(|v| (name.clone(), v.clone())))
                .collect(),
            body: request.body.clone(),
        };

        let pipeline = if policy.is_empty() {
            None
        } else {
            let key = PipelineKey::new(
                &request.service,
                &request.method,
                request.policy_key.as_deref(),
                &policy,
            );
            Some(self.inner.pipelines.get_or_build(key, &policy))
        };

        let dedupe = request.method == Method::GET && !request.skip_dedup;

        let response = if dedupe {
            let key = DedupKey {
                method: request.method.clone(),
                target: request.service.clone(),
                path: request.path.clone(),
            };
            let call = call_future(
                self.inner.clone(),
                pipeline,
                request.service.clone(),
                transport_request,
            );
            self.inner.dedup.send(key, call).await
        } else {
            call_future(
                self.inner.clone(),
                pipeline,
                request.service.clone(),
                transport_request,
            )
            .await
        };

        Ok((response, hook))
    }
}

fn encode_body<B: Serialize>(body: &B) -> Result<Bytes, Error> {
    serde_json::to_vec(body)
        .map(Bytes::from)
        .map_err(Error::Serialize)
}

fn push_json_content_type(request: &mut MsgRequest) {
    let present = request
        .headers
        .iter()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    if !present {
        request
            .headers
            .push(("content-type".to_string(), Some("application/json".to_string())));
    }
}

/// `{base}/{path}` with exactly one slash between the parts.
fn join_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// The shared execution body: pipeline (or bare transport) then outcome
/// translation. Owns everything it touches so the dedup cache can run it
/// on a detached task.
async fn call_future<T: Transport>(
    inner: Arc<ClientInner<T>>,
    pipeline: Option<Arc<Pipeline>>,
    service: String,
    request: TransportRequest,
) -> MsgResponse {
    let outcome = match &pipeline {
        Some(pipeline) => pipeline.execute(&inner.transport, &service, &request).await,
        None => match inner.transport.send(&service, request).await {
            Ok(rsp) => CallOutcome::Response(rsp),
            Err(e) => CallOutcome::Transport(e),
        },
    };

    translate_outcome(outcome, &service)
}

/// Collapse an outcome into the uniform envelope. Internal failures become
/// synthetic statuses with a cause header; nothing escapes as an error.
fn translate_outcome(outcome: CallOutcome, service: &str) -> MsgResponse {
    match outcome {
        CallOutcome::Response(rsp) => MsgResponse {
            status: rsp.status,
            headers: rsp.headers,
            body: rsp.body,
        },
        CallOutcome::TimedOut => MsgResponse::synthetic(StatusCode::REQUEST_TIMEOUT, "internal-timeout"),
        CallOutcome::CircuitOpen => {
            MsgResponse::synthetic(StatusCode::FAILED_DEPENDENCY, "circuit-open")
        }
        CallOutcome::Transport(e) => {
            tracing::error!(target_name = %service, error = %e, "transport failure");
            MsgResponse::synthetic(StatusCode::BAD_GATEWAY, "transport-error")
        }
    }
}

fn translate_typed<R: DeserializeOwned>(
    response: MsgResponse,
    hook: Option<crate::message::FailureHook>,
) -> Result<TypedResponse<R>, Error> {
    let mut content = None;
    let mut problem_details = None;

    if response.is_success() {
        content = Some(response.json()?);
    } else if let Some(hook) = hook {
        hook(response.status, &response.body);
    } else if !response.body.is_empty() {
        problem_details = serde_json::from_slice(&response.body).ok();
    }

    Ok(TypedResponse {
        status: response.status,
        headers: response.headers,
        content,
        problem_details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("http://api-books/", "/books"), "http://api-books/books");
        assert_eq!(join_url("http://api-books", "books"), "http://api-books/books");
    }

    #[tokio::test]
    async fn unknown_target_without_base_url_is_an_error() {
        let client = ServiceClient::new(RelayConfig::default()).unwrap();
        let err = client
            .send(MsgRequest::new("nowhere", Method::GET, "/x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTarget(name) if name == "nowhere"));
    }
}
