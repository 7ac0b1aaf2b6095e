//! # Connection handle reporting completion to its listener.
//!
//! Every registered connection owns exactly one [`Completion`]. Dropping it
//! sends the `Done` message to the listener's arbiter, so the count is
//! balanced whether the connection is closed explicitly or simply dropped.
//!
//! ```text
//! Conn::close()  ──► drop(Completion) ──► Arbiter: active -= 1
//!                └─► Connection::close()  (transport teardown, not awaited by drain)
//! ```

use std::io;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

use super::arbiter::Message;
use super::listen::Connection;

/// Balances one `Register` in the arbiter when dropped.
pub(crate) struct Completion {
    tx: mpsc::UnboundedSender<Message>,
}

impl Completion {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        let _ = self.tx.send(Message::Done);
    }
}

/// An accepted connection bound to its [`Listener`](crate::Listener).
///
/// Derefs to the wrapped connection and forwards `AsyncRead`/`AsyncWrite`,
/// so it can be used directly by protocol code.
pub struct Conn<C> {
    inner: C,
    done: Completion,
}

impl<C: Connection> Conn<C> {
    pub(crate) fn new(inner: C, done: Completion) -> Self {
        Self { inner, done }
    }

    /// Reports completion to the listener, then closes the underlying connection.
    ///
    /// Drain waiters are released before the transport teardown finishes.
    pub async fn close(self) -> io::Result<()> {
        let Conn { mut inner, done } = self;
        drop(done);
        inner.close().await
    }
}

impl<C> Deref for Conn<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C> DerefMut for Conn<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

impl<C: AsyncRead + Unpin> AsyncRead for Conn<C> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl<C: AsyncWrite + Unpin> AsyncWrite for Conn<C> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<C: std::fmt::Debug> std::fmt::Debug for Conn<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conn").field("inner", &self.inner).finish()
    }
}
