//! Outbound HTTP Call Layer
//!
//! A resilient outbound HTTP client: declarative requests in, uniform
//! response envelopes out. Per-target retry, timeout and circuit-breaker
//! pipelines are compiled once and cached; concurrent identical GETs are
//! collapsed into a single in-flight transport call.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────┐
//!                 │                  SERVICE RELAY                     │
//!                 │                                                    │
//!   MsgRequest    │  ┌─────────┐   ┌────────┐   ┌─────────────────┐   │
//!   ──────────────┼─▶│ builder │──▶│ client │──▶│  dedup (GET)    │   │
//!                 │  └─────────┘   └────────┘   └────────┬────────┘   │
//!                 │                                       │            │
//!                 │                                       ▼            │
//!                 │                          ┌──────────────────────┐ │
//!                 │                          │   pipeline cache     │ │
//!                 │                          │ retry ∘ timeout ∘ cb │ │
//!                 │                          └──────────┬───────────┘ │
//!                 │                                      │             │
//!   MsgResponse   │  ┌─────────────────┐     ┌──────────▼──────────┐ │
//!   ◀─────────────┼──│ outcome → 408/  │◀────│     transport       │─┼──▶ Downstream
//!                 │  │ 424/502 mapping │     │     (reqwest)       │ │    Service
//!                 │  └─────────────────┘     └─────────────────────┘ │
//!                 └───────────────────────────────────────────────────┘
//! ```

pub mod builder;
pub mod client;
pub mod config;
pub mod dedup;
pub mod error;
pub mod message;
pub mod resilience;
pub mod transport;

pub use client::{RequestFilter, ServiceClient};
pub use config::{RelayConfig, ServicePolicy, TargetConfig};
pub use error::Error;
pub use message::{MsgRequest, MsgResponse, TypedResponse, FAILURE_DESC_HEADER};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};
