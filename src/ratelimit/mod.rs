//! Client state, quota enforcement, and idle eviction.

mod admission;
mod quota;
mod registry;
mod sweeper;

pub use admission::{evaluate, Admission, QuotaPolicy, DEFAULT_MAX_REQUESTS, DEFAULT_PERIOD};
pub use quota::QuotaTracker;
pub use registry::{ClientAddress, ClientRecord, ClientRegistry};
pub use sweeper::{
    Sweeper, SweeperConfig, SweeperHandle, DEFAULT_INACTIVITY_TIMEOUT, DEFAULT_SWEEP_INTERVAL,
};
