//! Datagram transport abstraction.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Result, ServerError};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Trait for datagram transports.
///
/// Abstracts over the UDP socket so the dispatcher can be driven by an
/// in-memory transport in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Wait for the next datagram and its sender.
    async fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)>;

    /// Send one datagram to `to`.
    async fn send_to(&self, payload: &[u8], to: SocketAddr) -> io::Result<()>;

    /// Address this transport is bound to.
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

/// [`Transport`] over a tokio UDP socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    /// Receive buffer reused across datagrams
    recv_buf: Mutex<Vec<u8>>,
}

impl UdpTransport {
    /// Bind a UDP socket on `addr`.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(addr = %socket.local_addr()?, "UDP socket bound");
        Ok(Self {
            socket,
            recv_buf: Mutex::new(vec![0u8; MAX_DATAGRAM_SIZE]),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn recv_from(&self) -> io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = self.recv_buf.lock().await;
        let (len, sender) = self.socket.recv_from(&mut buf[..]).await?;
        Ok((buf[..len].to_vec(), sender))
    }

    async fn send_to(&self, payload: &[u8], to: SocketAddr) -> io::Result<()> {
        let sent = self.socket.send_to(payload, to).await?;
        if sent != payload.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("sent {} of {} bytes", sent, payload.len()),
            ));
        }
        Ok(())
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
