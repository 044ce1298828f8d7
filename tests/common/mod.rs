//! Shared utilities for integration testing.

// not every test binary uses every helper
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use reqwest::StatusCode;
use service_relay::{Transport, TransportError, TransportRequest, TransportResponse};

/// Install the test tracing subscriber. Safe to call from every test; only
/// the first caller in a binary wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// What the fake upstream should do for one invocation.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, &'static str),
    ConnectError,
}

/// Programmable in-process stand-in for the network, with invocation
/// counting and request capture.
pub struct FakeTransport {
    respond: Box<dyn Fn(u32, &TransportRequest) -> Reply + Send + Sync>,
    delay: Duration,
    invoked: AtomicU32,
    seen: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    /// Upstream that always answers with the same status and body.
    pub fn status(status: u16, body: &'static str) -> Arc<Self> {
        Self::programmable(move |_, _| Reply::Status(status, body))
    }

    /// Upstream driven by a closure receiving the zero-based invocation
    /// number and the request.
    pub fn programmable<F>(f: F) -> Arc<Self>
    where
        F: Fn(u32, &TransportRequest) -> Reply + Send + Sync + 'static,
    {
        Arc::new(Self {
            respond: Box::new(f),
            delay: Duration::ZERO,
            invoked: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Upstream that always answers with the same status, after a delay.
    pub fn slow(status: u16, body: &'static str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(move |_, _| Reply::Status(status, body)),
            delay,
            invoked: AtomicU32::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn invocations(&self) -> u32 {
        self.invoked.load(Ordering::SeqCst)
    }

    pub fn seen_requests(&self) -> Vec<TransportRequest> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for FakeTransport {
    fn send(
        &self,
        _target: &str,
        request: TransportRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send {
        let n = self.invoked.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.clone());
        let reply = (self.respond)(n, &request);
        let delay = self.delay;

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match reply {
                Reply::Status(status, body) => Ok(TransportResponse {
                    status: StatusCode::from_u16(status).unwrap(),
                    headers: Vec::new(),
                    body: Bytes::from_static(body.as_bytes()),
                }),
                Reply::ConnectError => {
                    Err(TransportError::Connect("connection refused".to_string()))
                }
            }
        }
    }
}
