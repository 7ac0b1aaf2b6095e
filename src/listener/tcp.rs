//! # TCP transport.
//!
//! [`TcpTransport`] adapts [`tokio::net::TcpListener`] to [`Listen`]. The socket
//! sits behind an `Arc` so a pending accept keeps it alive while `close`
//! detaches it; the close token wakes that accept and the descriptor is
//! released when the last clone drops.

use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsFd, OwnedFd};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio_util::sync::CancellationToken;

use super::listen::Listen;

/// TCP listening socket usable with [`Listener`](crate::Listener).
#[derive(Debug)]
pub struct TcpTransport {
    socket: Mutex<Option<Arc<TcpListener>>>,
    closed: CancellationToken,
    local: SocketAddr,
}

impl TcpTransport {
    /// Binds a new listening socket.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        Self::from_tokio(TcpListener::bind(addr).await?)
    }

    /// Adopts a standard library listener (switched to non-blocking mode).
    ///
    /// Must be called from within a Tokio runtime.
    pub fn from_std(listener: std::net::TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Self::from_tokio(TcpListener::from_std(listener)?)
    }

    fn from_tokio(listener: TcpListener) -> io::Result<Self> {
        let local = listener.local_addr()?;
        Ok(Self {
            socket: Mutex::new(Some(Arc::new(listener))),
            closed: CancellationToken::new(),
            local,
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    fn socket(&self) -> io::Result<Arc<TcpListener>> {
        self.socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(closed)
    }
}

fn closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "listener closed")
}

#[async_trait]
impl Listen for TcpTransport {
    type Conn = TcpStream;

    async fn accept(&self) -> io::Result<TcpStream> {
        let socket = self.socket()?;
        tokio::select! {
            biased;
            _ = self.closed.cancelled() => Err(closed()),
            res = socket.accept() => res.map(|(stream, _peer)| stream),
        }
    }

    fn close(&self) -> io::Result<()> {
        self.closed.cancel();
        let socket = self
            .socket
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match socket {
            Some(_) => Ok(()),
            None => Err(closed()),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn file(&self) -> io::Result<OwnedFd> {
        self.socket()?.as_fd().try_clone_to_owned()
    }

    fn label(&self) -> String {
        self.local.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::fd::AsRawFd;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn accepts_and_reports_address() {
        let t = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = t.local_addr();
        assert_eq!(t.label(), addr.to_string());

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let server_side = t.accept().await.unwrap();
        let client_side = client.await.unwrap();
        assert_eq!(server_side.peer_addr().unwrap(), client_side.local_addr().unwrap());
    }

    #[tokio::test]
    async fn close_wakes_pending_accept() {
        let t = Arc::new(TcpTransport::bind("127.0.0.1:0").await.unwrap());
        let pending = {
            let t = Arc::clone(&t);
            tokio::spawn(async move { t.accept().await })
        };
        tokio::task::yield_now().await;

        t.close().unwrap();
        assert!(t.is_closed());
        let res = timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
        assert!(res.is_err());

        assert!(t.close().is_err(), "second close reports the socket is gone");
        assert!(t.file().is_err());
        assert!(t.accept().await.is_err());
    }

    #[tokio::test]
    async fn file_is_an_independent_duplicate() {
        let t = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let dup = t.file().unwrap();
        let std_listener = std::net::TcpListener::from(dup);
        assert_eq!(std_listener.local_addr().unwrap(), t.local_addr());
        assert_ne!(std_listener.as_raw_fd(), t.socket().unwrap().as_raw_fd());
    }
}
