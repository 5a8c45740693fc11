//! Admission decisions for incoming requests.
//!
//! The decision is a pure function of the client's record before the current
//! request, the current time, and the quota policy. All locking happens in
//! the caller.

use std::time::{Duration, Instant};

use super::registry::ClientRecord;

/// Default number of requests admitted per window.
pub const DEFAULT_MAX_REQUESTS: u32 = 10;
/// Default length of a rate limit window.
pub const DEFAULT_PERIOD: Duration = Duration::from_secs(60 * 60);

/// How many requests a client may make and over what period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    /// Maximum admitted requests per window
    pub max_requests: u32,
    /// Idle time after which the window starts over
    pub period: Duration,
}

impl QuotaPolicy {
    pub fn new(max_requests: u32, period: Duration) -> Self {
        Self {
            max_requests,
            period,
        }
    }
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_PERIOD)
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Served; counts towards the current window
    Admit,
    /// Served as the first request of a fresh window
    NewWindow,
    /// Quota exhausted; not served and not counted
    RateLimited,
}

impl Admission {
    /// Whether the request should be served.
    pub fn is_admitted(&self) -> bool {
        !matches!(self, Admission::RateLimited)
    }

    /// The request count to store after this decision.
    pub fn count_after(&self, previous_count: u32) -> u32 {
        match self {
            Admission::Admit => previous_count.saturating_add(1),
            Admission::NewWindow => 1,
            Admission::RateLimited => previous_count,
        }
    }
}

/// Classify a request arriving at `now`.
///
/// `previous` is the client's record before this request touched it. The
/// window is measured from the last activity, rejected requests included, so
/// a client that keeps retrying while limited keeps pushing its reset out.
pub fn evaluate(previous: Option<&ClientRecord>, now: Instant, policy: &QuotaPolicy) -> Admission {
    let Some(record) = previous else {
        return Admission::Admit;
    };

    if record.idle_for(now) > policy.period {
        Admission::NewWindow
    } else if record.request_count >= policy.max_requests {
        Admission::RateLimited
    } else {
        Admission::Admit
    }
}
