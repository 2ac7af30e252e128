//! Listening socket for the downstream consumer.

use std::io;
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

/// TCP listener serving one consumer at a time.
///
/// Bound with a backlog of one: while a session is active nothing accepts,
/// so at most one further connection attempt queues in the kernel and is
/// picked up when the current session drains.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind the well-known consumer address.
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4()?,
            SocketAddr::V6(_) => TcpSocket::new_v6()?,
        };
        socket.set_reuseaddr(true)?;
        socket.bind(addr)?;
        let inner = socket.listen(1)?;
        let local_addr = inner.local_addr()?;

        Ok(Self { inner, local_addr })
    }

    /// Wait for the next inbound consumer connection.
    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        self.inner.accept().await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
