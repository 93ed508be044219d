//! Connected UDP endpoint.
//!
//! One datagram socket bound to the source tuple and connected to the
//! destination tuple. Connecting pins the peer so `send`/`recv` need no
//! per-message address, and lets kernel-level ICMP unreachable surface as
//! `ECONNREFUSED` on a later call, which callers must treat as transient.
//!
//! The receive timeout is mandatory: it bounds how long the RX worker can
//! sit in a blocking `recv` before re-checking the shutdown flag.

use std::net::{SocketAddrV4, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, warn};

use crate::error::{Result, TransportError};

/// Socket configuration options.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Kernel send buffer size (`SO_SNDBUF`).
    pub send_buffer_size: usize,
    /// Kernel receive buffer size (`SO_RCVBUF`).
    pub recv_buffer_size: usize,
    /// Whether to set `SO_REUSEADDR` before bind.
    pub reuse_addr: bool,
    /// Blocking receive timeout (`SO_RCVTIMEO`).
    pub recv_timeout: Duration,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: 1024 * 1024,
            recv_buffer_size: 2 * 1024 * 1024,
            reuse_addr: true,
            recv_timeout: Duration::from_millis(100),
        }
    }
}

/// A bound, connected IPv4/UDP socket.
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddrV4,
    peer_addr: SocketAddrV4,
}

impl UdpEndpoint {
    /// Create a socket bound to `src` and connected to `dst`.
    pub fn connect(src: SocketAddrV4, dst: SocketAddrV4, config: &SocketConfig) -> Result<Self> {
        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
            .map_err(TransportError::SocketCreate)?;

        configure_socket(&socket, config);

        socket
            .bind(&std::net::SocketAddr::V4(src).into())
            .map_err(|e| TransportError::Bind {
                addr: src,
                source: e,
            })?;

        socket
            .connect(&std::net::SocketAddr::V4(dst).into())
            .map_err(|e| TransportError::Connect {
                addr: dst,
                source: e,
            })?;

        let socket: UdpSocket = socket.into();

        debug!(%src, %dst, "UDP endpoint connected");

        Ok(Self {
            socket: Arc::new(socket),
            local_addr: src,
            peer_addr: dst,
        })
    }

    /// Send a datagram to the connected peer.
    pub fn send(&self, data: &[u8]) -> std::io::Result<usize> {
        self.socket.send(data)
    }

    /// Receive a datagram into `buf`, blocking up to the receive timeout.
    pub fn recv(&self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.socket.recv(buf)
    }

    /// Shared handle to the underlying socket.
    ///
    /// The socket is safe to share between the RX and TX workers as long as
    /// each side sticks to its own direction; the kernel serializes.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }

    /// Local bind address.
    pub fn local_addr(&self) -> SocketAddrV4 {
        self.local_addr
    }

    /// Connected peer address.
    pub fn peer_addr(&self) -> SocketAddrV4 {
        self.peer_addr
    }
}

/// Apply buffer sizes, address reuse, and the receive timeout.
///
/// Buffer-size failures are logged and non-fatal: the kernel clamps to its
/// limits and the link still works, just with less headroom.
fn configure_socket(socket: &Socket, config: &SocketConfig) {
    if config.reuse_addr {
        if let Err(e) = socket.set_reuse_address(true) {
            warn!("failed to set SO_REUSEADDR: {e}");
        }
    }

    if let Err(e) = socket.set_recv_buffer_size(config.recv_buffer_size) {
        warn!(
            "failed to set SO_RCVBUF to {} bytes: {e}",
            config.recv_buffer_size
        );
    } else if let Ok(actual) = socket.recv_buffer_size() {
        debug!(
            "SO_RCVBUF set to {actual} bytes (requested {})",
            config.recv_buffer_size
        );
    }

    if let Err(e) = socket.set_send_buffer_size(config.send_buffer_size) {
        warn!(
            "failed to set SO_SNDBUF to {} bytes: {e}",
            config.send_buffer_size
        );
    } else if let Ok(actual) = socket.send_buffer_size() {
        debug!(
            "SO_SNDBUF set to {actual} bytes (requested {})",
            config.send_buffer_size
        );
    }

    if let Err(e) = socket.set_read_timeout(Some(config.recv_timeout)) {
        warn!("failed to set SO_RCVTIMEO: {e}");
    }
}

/// Check whether a socket error is transient for the receive loop.
///
/// `WouldBlock`/`TimedOut` cover the receive timeout (`EAGAIN`,
/// `EWOULDBLOCK`), `Interrupted` covers `EINTR`, and `ConnectionRefused`
/// covers the ICMP unreachable surfaced by a connected UDP socket while
/// the peer is down.
pub(crate) fn is_transient(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::WouldBlock
            | std::io::ErrorKind::TimedOut
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::ConnectionRefused
    )
}
