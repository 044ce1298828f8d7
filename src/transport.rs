//! The raw transport boundary.
//!
//! Everything above this module treats HTTP as "send a fully-formed request,
//! get status + headers + body back, or a connection-level error". Connection
//! pooling, TLS and protocol details belong to the transport implementation.

use bytes::Bytes;
use reqwest::{Method, StatusCode};
use thiserror::Error;

/// A fully-formed outbound request: absolute URL, no routing left to do.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

/// A buffered upstream response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Connection-level failure from the transport.
///
/// Upstream 4xx/5xx responses are NOT errors; they come back as a normal
/// [`TransportResponse`].
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

/// Performs the network call for a named target.
pub trait Transport: Send + Sync + 'static {
    fn send(
        &self,
        target: &str,
        request: TransportRequest,
    ) -> impl std::future::Future<Output = Result<TransportResponse, TransportError>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn send(
        &self,
        target: &str,
        request: TransportRequest,
    ) -> impl std::future::Future<Output = Result<TransportResponse, TransportError>> + Send {
        (**self).send(target, request)
    }
}

/// Default transport backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with its own connection pool.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client, sharing its pool.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    async fn send(
        &self,
        target: &str,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        tracing::debug!(target_name = %target, method = %request.method, url = %request.url, "sending request");

        let mut builder = self.client.request(request.method.clone(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        tracing::debug!(target_name = %target, status = %status, "response received");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
