//! Staged fluent builder over [`ServiceClient`].
//!
//! The chain moves through two stages: [`ServiceStage`] pins down where the
//! request goes, [`RequestStage`] accumulates everything else and ends in a
//! verb method that performs the call. Each verb consumes the builder, so a
//! chain cannot be fired twice.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::form_urlencoded;

use crate::client::ServiceClient;
use crate::config::{CircuitBreakerPolicy, RetryPolicy, ServicePolicy, TimeoutPolicy};
use crate::error::Error;
use crate::message::{FailureHook, MsgRequest, MsgResponse, TypedResponse};
use crate::transport::Transport;

impl<T: Transport> ServiceClient<T> {
    /// Start a request against a configured target.
    pub fn service(&self, name: impl Into<String>) -> ServiceStage<'_, T> {
        ServiceStage {
            client: self,
            service: name.into(),
            base_url: None,
        }
    }

    /// Start a request against a literal base URL, bypassing target
    /// configuration. The URL doubles as the keying name for pipelines
    /// and deduplication.
    pub fn base_url(&self, url: impl Into<String>) -> ServiceStage<'_, T> {
        let url = url.into();
        ServiceStage {
            client: self,
            service: url.clone(),
            base_url: Some(url),
        }
    }
}

/// First stage: the request's destination is fixed, a path is still needed.
pub struct ServiceStage<'a, T: Transport> {
    client: &'a ServiceClient<T>,
    service: String,
    base_url: Option<String>,
}

impl<'a, T: Transport> ServiceStage<'a, T> {
    /// Path relative to the target's base URL. Moves to the request stage.
    pub fn path(self, path: impl Into<String>) -> RequestStage<'a, T> {
        let mut request = MsgRequest::new(self.service, Method::GET, path);
        request.base_url = self.base_url;
        RequestStage {
            client: self.client,
            request,
        }
    }
}

/// Second stage: query, headers and policy accumulate until a verb fires.
pub struct RequestStage<'a, T: Transport> {
    client: &'a ServiceClient<T>,
    request: MsgRequest,
}

impl<T: Transport> RequestStage<'_, T> {
    /// Append a query parameter, percent-encoded. A `None` value skips the
    /// pair entirely.
    pub fn query(mut self, name: &str, value: Option<impl AsRef<str>>) -> Self {
        if let Some(value) = value {
            let sep = if self.request.path.contains('?') { '&' } else { '?' };
            let encoded: String = form_urlencoded::Serializer::new(String::new())
                .append_pair(name, value.as_ref())
                .finish();
            self.request.path.push(sep);
            self.request.path.push_str(&encoded);
        }
        self
    }

    /// Append several query parameters at once.
    pub fn queries<I, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'static str, Option<V>)>,
        V: AsRef<str>,
    {
        for (name, value) in pairs {
            self = self.query(name, value);
        }
        self
    }

    /// Add a header. A `None` value is dropped when the request is built.
    pub fn header(mut self, name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        self.request.headers.push((name.into(), value.map(Into::into)));
        self
    }

    /// Register a callback invoked with the status and raw body when the
    /// response is not a success.
    pub fn on_failure(mut self, hook: FailureHook) -> Self {
        self.request.on_failure = Some(hook);
        self
    }

    /// Opt this request out of single-flight deduplication.
    pub fn skip_dedup(mut self) -> Self {
        self.request.skip_dedup = true;
        self
    }

    /// Force this call shape onto a shared pipeline, pooling its circuit
    /// breaker with every other call using the same key.
    pub fn policy_key(mut self, key: impl Into<String>) -> Self {
        self.request.policy_key = Some(key.into());
        self
    }

    /// Per-call timeout override.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.policy_mut().timeout = Some(TimeoutPolicy { timeout_ms });
        self
    }

    /// Per-call retry override with the default base delay.
    pub fn retry(self, retry_count: u32) -> Self {
        self.retry_with_delay(retry_count, RetryPolicy::default().delay_ms)
    }

    /// Per-call retry override with an explicit base delay.
    pub fn retry_with_delay(mut self, retry_count: u32, delay_ms: u64) -> Self {
        self.policy_mut().retry = Some(RetryPolicy {
            retry_count,
            delay_ms,
        });
        self
    }

    /// Per-call circuit-breaker override.
    pub fn circuit_breaker(mut self, policy: CircuitBreakerPolicy) -> Self {
        self.policy_mut().circuit_breaker = Some(policy);
        self
    }

    fn policy_mut(&mut self) -> &mut ServicePolicy {
        self.request.policy.get_or_insert_with(ServicePolicy::default)
    }

    pub async fn get(mut self) -> Result<MsgResponse, Error> {
        self.request.method = Method::GET;
        self.client.send(self.request).await
    }

    pub async fn get_json<R: DeserializeOwned>(mut self) -> Result<TypedResponse<R>, Error> {
        self.request.method = Method::GET;
        self.client.send_typed(self.request).await
    }

    pub async fn delete(mut self) -> Result<MsgResponse, Error> {
        self.request.method = Method::DELETE;
        self.client.send(self.request).await
    }

    pub async fn delete_json<R: DeserializeOwned>(mut self) -> Result<TypedResponse<R>, Error> {
        self.request.method = Method::DELETE;
        self.client.send_typed(self.request).await
    }

    pub async fn post(mut self) -> Result<MsgResponse, Error> {
        self.request.method = Method::POST;
        self.client.send(self.request).await
    }

    pub async fn post_body<B: Serialize>(mut self, body: &B) -> Result<MsgResponse, Error> {
        self.request.method = Method::POST;
        self.client.send_body(self.request, body).await
    }

    pub async fn post_json<R: DeserializeOwned>(mut self) -> Result<TypedResponse<R>, Error> {
        self.request.method = Method::POST;
        self.client.send_typed(self.request).await
    }

    pub async fn post_body_json<B: Serialize, R: DeserializeOwned>(
        mut self,
        body: &B,
    ) -> Result<TypedResponse<R>, Error> {
        self.request.method = Method::POST;
        self.client.send_body_typed(self.request, body).await
    }

    pub async fn put_body<B: Serialize>(mut self, body: &B) -> Result<MsgResponse, Error> {
        self.request.method = Method::PUT;
        self.client.send_body(self.request, body).await
    }

    pub async fn put_body_json<B: Serialize, R: DeserializeOwned>(
        mut self,
        body: &B,
    ) -> Result<TypedResponse<R>, Error> {
        self.request.method = Method::PUT;
        self.client.send_body_typed(self.request, body).await
    }

    pub async fn patch_body<B: Serialize>(mut self, body: &B) -> Result<MsgResponse, Error> {
        self.request.method = Method::PATCH;
        self.client.send_body(self.request, body).await
    }

    #[cfg(test)]
    pub(crate) fn into_request(self) -> MsgRequest {
        self.request
    }
}
