//! # Transport abstractions wrapped by the coordinator.
//!
//! [`Listen`] is the underlying listening socket and [`Connection`] what it
//! accepts. The coordinator never looks inside either; it only needs accept,
//! close, an explicit closed-state query and a descriptor export.

use std::io;
use std::os::fd::OwnedFd;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// # An accepted connection.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Closes the connection (flush + shutdown for streams).
    async fn close(&mut self) -> io::Result<()>;
}

#[async_trait]
impl Connection for tokio::net::TcpStream {
    async fn close(&mut self) -> io::Result<()> {
        self.shutdown().await
    }
}

#[async_trait]
impl Connection for tokio::net::UnixStream {
    async fn close(&mut self) -> io::Result<()> {
        self.shutdown().await
    }
}

/// # A listening socket that can be handed to a successor process.
///
/// Implementations must be safe to call concurrently: `accept` may be pending
/// on one task while `close` runs on another. After `close`, pending and future
/// accepts must fail and [`is_closed`](Listen::is_closed) must return `true`.
#[async_trait]
pub trait Listen: Send + Sync + 'static {
    /// Connection type yielded by [`accept`](Listen::accept).
    type Conn: Connection;

    /// Waits for the next incoming connection.
    async fn accept(&self) -> io::Result<Self::Conn>;

    /// Closes the socket. Pending accepts are woken with an error.
    fn close(&self) -> io::Result<()>;

    /// Reports whether [`close`](Listen::close) already ran.
    ///
    /// The coordinator consults this instead of inspecting accept errors.
    fn is_closed(&self) -> bool;

    /// Returns a duplicate of the underlying descriptor.
    fn file(&self) -> io::Result<OwnedFd>;

    /// Label used in events and logs (local address for sockets).
    fn label(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}
