//! Per-client request quota tracking.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, trace};

use super::admission::{evaluate, Admission, QuotaPolicy};
use super::registry::{ClientAddress, ClientRecord, ClientRegistry};

/// Applies a [`QuotaPolicy`] to the clients held in a [`ClientRegistry`].
///
/// Cheap to clone; clones share the same registry.
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    registry: Arc<ClientRegistry>,
    policy: QuotaPolicy,
}

impl QuotaTracker {
    /// Create a tracker over `registry` enforcing `policy`.
    pub fn new(registry: Arc<ClientRegistry>, policy: QuotaPolicy) -> Self {
        Self { registry, policy }
    }

    /// Record a request from `addr` at `now` and decide whether to serve it.
    ///
    /// The activity touch, the decision, and the count update happen as one
    /// step under the client's entry lock, so concurrent requests from the
    /// same address can never over-admit.
    pub fn record_and_check(&self, addr: ClientAddress, now: Instant) -> Admission {
        let policy = self.policy;
        let admission = self.registry.update(addr, |previous| {
            let admission = evaluate(previous.as_ref(), now, &policy);
            let previous_count = previous.map_or(0, |record| record.request_count);
            let record = ClientRecord {
                last_seen: now,
                request_count: admission.count_after(previous_count),
            };
            (record, admission)
        });

        match admission {
            Admission::RateLimited => debug!(client = %addr, "Rate limit exceeded"),
            Admission::NewWindow => debug!(client = %addr, "Starting new rate limit window"),
            Admission::Admit => trace!(client = %addr, "Request admitted"),
        }

        admission
    }

    /// The policy being enforced.
    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// The registry holding per-client state.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }
}
