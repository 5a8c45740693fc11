//! Background eviction of idle clients.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::registry::ClientRegistry;
use crate::clock::Clock;
use crate::error::{Result, ServerError};

/// Default time between sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
/// Default idle time after which a client is evicted.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Timing for the eviction sweeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    /// How often to scan the registry
    pub interval: Duration,
    /// Idle time after which a client is forgotten
    pub inactivity_timeout: Duration,
}

impl SweeperConfig {
    /// Reject timings the sweeper cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(ServerError::Config(
                "sweep interval must be greater than 0".to_string(),
            ));
        }
        if self.inactivity_timeout.is_zero() {
            return Err(ServerError::Config(
                "inactivity timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
        }
    }
}

/// Periodically removes clients that have gone quiet.
pub struct Sweeper {
    registry: Arc<ClientRegistry>,
    clock: Arc<dyn Clock>,
    config: SweeperConfig,
}

impl Sweeper {
    /// Create a sweeper; fails if `config` has a zero interval or timeout.
    pub fn new(
        registry: Arc<ClientRegistry>,
        clock: Arc<dyn Clock>,
        config: SweeperConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            clock,
            config,
        })
    }

    /// Run one eviction pass and return how many clients were removed.
    ///
    /// Each removal re-checks idleness under the client's entry lock, so a
    /// request arriving mid-sweep either keeps the client or finds it gone
    /// and starts over as a new client.
    pub fn sweep_once(&self) -> usize {
        let now = self.clock.now();
        let timeout = self.config.inactivity_timeout;

        let evicted = self
            .registry
            .addresses()
            .into_iter()
            .filter(|addr| {
                let removed = self.registry.remove_if_idle(addr, now, timeout);
                if removed {
                    debug!(client = %addr, "Evicted inactive client");
                }
                removed
            })
            .count();

        if evicted > 0 {
            info!(
                evicted = evicted,
                remaining = self.registry.len(),
                "Inactive clients swept"
            );
        }

        evicted
    }

    /// Start sweeping on the configured interval in a background task.
    pub fn spawn(self) -> SweeperHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            info!(
                interval_secs = self.config.interval.as_secs(),
                inactivity_timeout_secs = self.config.inactivity_timeout.as_secs(),
                "Eviction sweeper started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() {
                            warn!("Sweeper shutdown handle dropped");
                        }
                        break;
                    }
                }
            }

            info!("Eviction sweeper stopped");
        });

        SweeperHandle { shutdown_tx, task }
    }
}

/// Handle to a running [`Sweeper`] task.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Sweeper task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::ratelimit::{QuotaPolicy, QuotaTracker};
    use std::net::SocketAddr;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([192, 168, 1, 10], port))
    }

    fn setup() -> (Arc<ClientRegistry>, ManualClock, Sweeper) {
        let registry = Arc::new(ClientRegistry::new());
        let clock = ManualClock::new();
        let sweeper = Sweeper::new(
            Arc::clone(&registry),
            Arc::new(clock.clone()),
            SweeperConfig::default(),
        )
        .unwrap();
        (registry, clock, sweeper)
    }

    #[test]
    fn test_sweep_keeps_active_clients() {
        let (registry, clock, sweeper) = setup();
        registry.touch(addr(6000), clock.now());

        clock.advance(Duration::from_secs(600));

        assert_eq!(sweeper.sweep_once(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_sweep_evicts_idle_clients() {
        let (registry, clock, sweeper) = setup();
        registry.touch(addr(6000), clock.now());
        clock.advance(Duration::from_secs(300));
        registry.touch(addr(6001), clock.now());

        clock.advance(Duration::from_secs(300));

        assert_eq!(sweeper.sweep_once(), 0);
        clock.advance(Duration::from_secs(1));
        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(registry.last_seen_of(&addr(6000)), None);
        assert!(registry.last_seen_of(&addr(6001)).is_some());
    }

    #[test]
    fn test_evicted_client_starts_over() {
        let (registry, clock, sweeper) = setup();
        let tracker = QuotaTracker::new(Arc::clone(&registry), QuotaPolicy::default());

        for _ in 0..10 {
            tracker.record_and_check(addr(6000), clock.now());
        }
        assert_eq!(registry.request_count_of(&addr(6000)), Some(10));

        clock.advance(Duration::from_secs(601));
        assert_eq!(sweeper.sweep_once(), 1);
        assert_eq!(registry.request_count_of(&addr(6000)), None);

        assert!(tracker.record_and_check(addr(6000), clock.now()).is_admitted());
        assert_eq!(registry.request_count_of(&addr(6000)), Some(1));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = Sweeper::new(
            Arc::new(ClientRegistry::new()),
            Arc::new(ManualClock::new()),
            SweeperConfig {
                interval: Duration::ZERO,
                inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            },
        );
        assert!(matches!(result, Err(ServerError::Config(_))));
    }

    #[test]
    fn test_zero_inactivity_timeout_rejected() {
        let config = SweeperConfig {
            interval: DEFAULT_SWEEP_INTERVAL,
            inactivity_timeout: Duration::ZERO,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sweep_on_empty_registry() {
        let (_registry, _clock, sweeper) = setup();
        assert_eq!(sweeper.sweep_once(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_sweeper_runs_on_interval() {
        let registry = Arc::new(ClientRegistry::new());
        let clock = ManualClock::new();
        registry.touch(addr(6000), clock.now());
        clock.advance(Duration::from_secs(601));

        let handle = Sweeper::new(
            Arc::clone(&registry),
            Arc::new(clock.clone()),
            SweeperConfig {
                interval: Duration::from_secs(60),
                inactivity_timeout: Duration::from_secs(600),
            },
        )
        .unwrap()
        .spawn();

        // Nothing happens before the first full interval
        tokio::task::yield_now().await;
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(registry.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_task() {
        let (_registry, _clock, sweeper) = setup();
        let handle = sweeper.spawn();
        tokio_test::assert_ok!(
            tokio::time::timeout(Duration::from_secs(5), handle.shutdown()).await
        );
    }
}
