//! UDP lookup server.

mod catalog;
mod dispatcher;
mod transport;

pub use catalog::{Catalog, PriceCatalog, UNKNOWN_COMPONENT};
pub use dispatcher::{Dispatcher, LIMIT_EXCEEDED_MESSAGE};
pub use transport::{Transport, UdpTransport, MAX_DATAGRAM_SIZE};

use std::future::Future;
use std::sync::Arc;
use tracing::info;

use crate::clock::{Clock, SystemClock};
use crate::config::PricegateConfig;
use crate::error::Result;
use crate::ratelimit::{ClientRegistry, QuotaTracker, Sweeper};

/// Owns the shared client state and wires the dispatcher and sweeper to it.
pub struct Server {
    config: PricegateConfig,
    catalog: Arc<PriceCatalog>,
    registry: Arc<ClientRegistry>,
    clock: Arc<dyn Clock>,
}

impl Server {
    /// Create a server using the system clock.
    pub fn new(config: PricegateConfig, catalog: PriceCatalog) -> Self {
        Self::with_clock(config, catalog, Arc::new(SystemClock))
    }

    /// Create a server driven by `clock`.
    pub fn with_clock(config: PricegateConfig, catalog: PriceCatalog, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            registry: Arc::new(ClientRegistry::new()),
            clock,
        }
    }

    /// The shared client registry.
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Bind the configured address and serve until `signal` resolves.
    pub async fn run_with_shutdown<F>(&self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        self.config.validate()?;
        let transport = UdpTransport::bind(self.config.server.bind_addr).await?;
        self.serve(Arc::new(transport), signal).await
    }

    /// Serve on an already bound transport until `signal` resolves.
    ///
    /// Fails before serving anything if the configuration is invalid.
    pub async fn serve<T, F>(&self, transport: Arc<T>, signal: F) -> Result<()>
    where
        T: Transport,
        F: Future<Output = ()> + Send,
    {
        self.config.validate()?;
        let limits = &self.config.rate_limiting;
        let policy = limits.quota_policy();

        info!(
            max_requests = policy.max_requests,
            period_secs = policy.period.as_secs(),
            products = self.catalog.len(),
            "Starting price lookup server"
        );

        let sweeper = Sweeper::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.clock),
            limits.sweeper_config(),
        )?
        .spawn();

        let dispatcher = Dispatcher::new(
            transport,
            Arc::clone(&self.catalog),
            QuotaTracker::new(Arc::clone(&self.registry), policy),
            Arc::clone(&self.clock),
        );

        let result = dispatcher.run(signal).await;

        sweeper.shutdown().await;
        info!(clients = self.registry.len(), "Price lookup server stopped");
        result
    }
}
