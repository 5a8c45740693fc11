//! Request dispatch: receive, admit, resolve, reply.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use super::catalog::Catalog;
use super::transport::Transport;
use crate::clock::Clock;
use crate::error::Result;
use crate::ratelimit::{Admission, QuotaTracker};

/// Response sent when a client has used up its quota.
pub const LIMIT_EXCEEDED_MESSAGE: &str = "Request limit exceeded. Try again later.";

/// Serves requests arriving on a [`Transport`].
pub struct Dispatcher<T: Transport, C: Catalog> {
    transport: Arc<T>,
    catalog: Arc<C>,
    tracker: QuotaTracker,
    clock: Arc<dyn Clock>,
}

impl<T: Transport, C: Catalog> Dispatcher<T, C> {
    pub fn new(
        transport: Arc<T>,
        catalog: Arc<C>,
        tracker: QuotaTracker,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            transport,
            catalog,
            tracker,
            clock,
        }
    }

    /// Handle one datagram from `sender` and reply to it.
    ///
    /// A failed reply is logged and otherwise ignored; the client sees the
    /// same thing as a lost packet.
    #[instrument(skip_all, fields(client = %sender, bytes = payload.len()))]
    pub async fn handle(&self, payload: &[u8], sender: SocketAddr) -> Admission {
        let request = decode_request(payload);
        let admission = self.tracker.record_and_check(sender, self.clock.now());

        let response = if admission.is_admitted() {
            self.catalog.resolve(&request)
        } else {
            LIMIT_EXCEEDED_MESSAGE.to_string()
        };

        debug!(
            request = %request,
            admission = ?admission,
            response = %response,
            "Processed request"
        );

        if let Err(e) = self.transport.send_to(response.as_bytes(), sender).await {
            warn!(error = %e, "Failed to send response");
        }

        admission
    }

    /// Serve datagrams until `shutdown` resolves.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tokio::pin!(shutdown);

        info!(addr = %self.transport.local_addr()?, "Waiting for requests");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Dispatcher shutting down");
                    return Ok(());
                }
                received = self.transport.recv_from() => match received {
                    Ok((payload, sender)) => {
                        self.handle(&payload, sender).await;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to receive datagram");
                    }
                }
            }
        }
    }

    /// The quota tracker in use.
    pub fn tracker(&self) -> &QuotaTracker {
        &self.tracker
    }
}

/// Requests are plain text matched byte for byte; invalid UTF-8 is replaced.
fn decode_request(payload: &[u8]) -> String {
    String::from_utf8_lossy(payload).into_owned()
}
