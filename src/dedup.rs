//! Single-flight deduplication for idempotent reads.
//!
//! Concurrent identical GET requests collapse into one transport call: the
//! first caller for a key starts the call on a detached task, every caller
//! that arrives while the group is alive awaits a shared handle to it, and
//! all of them receive clones of the same result.
//!
//! # Design Decisions
//! - The shared call runs under `tokio::spawn`, so a caller dropping its
//!   future never cancels the call serving the rest of the group
//! - Results live only for the dedup window: the first caller to observe
//!   completion evicts the entry, so a later batch calls afresh and a
//!   transient failure is never served stale
//! - Failures (as synthetic responses) propagate to every waiter in the
//!   group identically

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use reqwest::{Method, StatusCode};

use crate::message::MsgResponse;

/// Identity of a deduplicatable request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub method: Method,
    pub target: String,
    pub path: String,
}

type SharedCall = Shared<BoxFuture<'static, MsgResponse>>;

struct InFlight {
    /// Distinguishes this window's entry from a successor under the same key.
    id: u64,
    call: SharedCall,
}

/// Map of in-flight call groups, keyed by (method, target, path).
#[derive(Default)]
pub struct DedupCache {
    inner: DashMap<DedupKey, InFlight>,
    next_id: AtomicU64,
}

impl DedupCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the in-flight group for `key`, creating it (and starting
    /// `do_call` on a detached task) if none exists.
    pub async fn send<F>(&self, key: DedupKey, do_call: F) -> MsgResponse
    where
        F: std::future::Future<Output = MsgResponse> + Send + 'static,
    {
        let (id, call) = match self.inner.entry(key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                let in_flight = entry.get();
                tracing::debug!(?key, "joining in-flight call");
                (in_flight.id, in_flight.call.clone())
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let handle = tokio::spawn(do_call);
                let call: SharedCall = async move {
                    match handle.await {
                        Ok(rsp) => rsp,
                        // The detached call panicked; every waiter gets the
                        // same synthetic failure.
                        Err(_) => MsgResponse::synthetic(StatusCode::BAD_GATEWAY, "call-failed"),
                    }
                }
                .boxed()
                .shared();
                entry.insert(InFlight {
                    id,
                    call: call.clone(),
                });
                (id, call)
            }
        };

        let response = call.await;

        // First finisher closes the dedup window; the id guard keeps a
        // successor entry under the same key from being evicted early.
        self.inner.remove_if(&key, |_, in_flight| in_flight.id == id);

        response
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.inner.len()
    }
}
