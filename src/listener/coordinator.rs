//! # Listener: graceful close coordination for one listening socket.
//!
//! A [`Listener`] wraps a [`Listen`] transport and a private arbiter task.
//! Accepted connections are registered with the arbiter before they are handed
//! out; closing waits until every registered connection has completed.
//!
//! ## Accept path
//! ```text
//! accept()
//!   ├─ drained? ───────────────────────────────► Err(AlreadyClosed)
//!   ├─ inner.accept()
//!   │     └─ Err + inner.is_closed() ──────────► Err(AlreadyClosed)
//!   └─ Register ──► Arbiter
//!         ├─ Completion ───────────────────────► Ok(Conn)
//!         └─ queue gone (drain won the race) ──► close conn, Err(AlreadyClosed)
//! ```
//!
//! ## Close path
//! ```text
//! close_request() ─► CloseRequest ─► Arbiter ─► (active == 0) ─► drained latch
//!        └──────────────── await drained latch ◄──────────────────────┘
//! close()         ─► close_request() ─► inner.close()
//! ```

use std::io;
use std::os::fd::OwnedFd;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::arbiter::{Arbiter, Message};
use super::conn::Conn;
use super::listen::{Connection, Listen};
use crate::error::ListenerError;
use crate::events::{Bus, Event, EventKind};

/// A listener providing a graceful close process whose socket can be sent
/// across processes through its descriptor.
///
/// Created with [`Listener::new`], [`Supervisor::listen`](crate::Supervisor::listen)
/// or by [`inherit`](crate::inherit). Must be created from within a Tokio
/// runtime (the arbiter is spawned immediately).
pub struct Listener<L: Listen> {
    inner: L,
    label: Arc<str>,
    tx: mpsc::UnboundedSender<Message>,
    drained: CancellationToken,
    bus: Option<Bus>,
}

impl<L: Listen> Listener<L> {
    /// Wraps `inner` and starts its arbiter.
    pub fn new(inner: L) -> Arc<Self> {
        Self::spawn(inner, None)
    }

    pub(crate) fn spawn(inner: L, bus: Option<Bus>) -> Arc<Self> {
        let label: Arc<str> = inner.label().into();
        let (tx, rx) = mpsc::unbounded_channel();
        let drained = CancellationToken::new();

        let arbiter = Arbiter::new(
            rx,
            tx.downgrade(),
            drained.clone(),
            Arc::clone(&label),
            bus.clone(),
        );
        tokio::spawn(arbiter.run());

        Arc::new(Self {
            inner,
            label,
            tx,
            drained,
            bus,
        })
    }

    /// Accepts the next connection.
    ///
    /// Fails with [`ListenerError::AlreadyClosed`] once the drain completed
    /// (without touching the transport), when the transport was closed under a
    /// pending accept, or when the drain completed between the transport
    /// accept and registration (the fresh connection is closed first).
    pub async fn accept(&self) -> Result<Conn<L::Conn>, ListenerError> {
        if self.drained.is_cancelled() {
            return Err(ListenerError::AlreadyClosed);
        }

        let mut conn = match self.inner.accept().await {
            Ok(conn) => conn,
            Err(_) if self.inner.is_closed() => return Err(ListenerError::AlreadyClosed),
            Err(e) => return Err(ListenerError::Io(e)),
        };

        let (reply, registered) = oneshot::channel();
        if self.tx.send(Message::Register(reply)).is_ok() {
            if let Ok(done) = registered.await {
                return Ok(Conn::new(conn, done));
            }
        }

        if let Err(e) = conn.close().await {
            tracing::debug!(listener = %self.label, error = %e, "closing raced connection failed");
        }
        self.publish(EventKind::AcceptRaced);
        Err(ListenerError::AlreadyClosed)
    }

    /// Requests a drain and waits until no connection is active.
    ///
    /// The socket stays open (use when an external supervisor owns it, e.g.
    /// socket activation). Safe to call concurrently and repeatedly: every
    /// caller returns after the same completion point.
    pub async fn close_request(&self) {
        // Fails only when the arbiter is gone, which happens after the latch fired.
        let _ = self.tx.send(Message::CloseRequest);
        self.drained.cancelled().await;
    }

    /// Drains like [`close_request`](Self::close_request), then closes the socket.
    pub async fn close(&self) -> Result<(), ListenerError> {
        self.close_request().await;
        self.inner.close()?;
        self.publish(EventKind::ListenerClosed);
        Ok(())
    }

    /// Returns a duplicate of the underlying descriptor for handoff to a successor.
    pub fn file(&self) -> io::Result<OwnedFd> {
        self.inner.file()
    }

    /// True once the drain completed.
    pub fn is_drained(&self) -> bool {
        self.drained.is_cancelled()
    }

    /// Label of the underlying socket.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The wrapped transport.
    pub fn get_ref(&self) -> &L {
        &self.inner
    }

    fn publish(&self, kind: EventKind) {
        if let Some(bus) = &self.bus {
            bus.publish(Event::now(kind).with_listener(Arc::clone(&self.label)));
        }
    }
}

impl<L: Listen> std::fmt::Debug for Listener<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("label", &self.label)
            .field("drained", &self.is_drained())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::testing::{FakeConn, FakeListen};
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tokio::task::yield_now;
    use tokio::time::timeout;

    async fn settle() {
        for _ in 0..16 {
            yield_now().await;
        }
    }

    #[tokio::test]
    async fn drain_waits_for_every_connection() {
        let (fake, feed) = FakeListen::new();
        let probe = fake.probe();
        let l = Listener::new(fake);

        let mut conns = Vec::new();
        for _ in 0..5 {
            feed.send(FakeConn::new(&probe)).unwrap();
            conns.push(l.accept().await.unwrap());
        }

        let waiter = {
            let l = Arc::clone(&l);
            tokio::spawn(async move { l.close_request().await })
        };

        while let Some(conn) = conns.pop() {
            settle().await;
            assert!(!waiter.is_finished(), "drain returned with active connections");
            assert!(!l.is_drained());
            conn.close().await.unwrap();
        }

        timeout(Duration::from_secs(5), waiter).await.unwrap().unwrap();
        assert!(l.is_drained());
        assert_eq!(probe.conn_closes.load(Ordering::SeqCst), 5);
        assert_eq!(probe.closes.load(Ordering::SeqCst), 0, "soft close keeps the socket");
    }

    #[tokio::test]
    async fn drain_with_no_connections_returns_immediately() {
        let (fake, _feed) = FakeListen::new();
        let l = Listener::new(fake);
        timeout(Duration::from_secs(5), l.close_request()).await.unwrap();
        assert!(l.is_drained());
    }

    #[tokio::test]
    async fn dropped_connection_counts_as_completed() {
        let (fake, feed) = FakeListen::new();
        let probe = fake.probe();
        let l = Listener::new(fake);

        feed.send(FakeConn::new(&probe)).unwrap();
        let conn = l.accept().await.unwrap();
        drop(conn);

        timeout(Duration::from_secs(5), l.close_request()).await.unwrap();
    }

    #[tokio::test]
    async fn no_accept_after_drain() {
        let (fake, feed) = FakeListen::new();
        let probe = fake.probe();
        let l = Listener::new(fake);

        l.close_request().await;
        feed.send(FakeConn::new(&probe)).unwrap();

        for _ in 0..3 {
            assert!(matches!(l.accept().await, Err(ListenerError::AlreadyClosed)));
        }
        assert_eq!(probe.accepts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_close_requests_all_return() {
        let (fake, feed) = FakeListen::new();
        let probe = fake.probe();
        let l = Listener::new(fake);

        feed.send(FakeConn::new(&probe)).unwrap();
        let conn = l.accept().await.unwrap();

        let mut waiters = Vec::new();
        for _ in 0..100 {
            let l = Arc::clone(&l);
            waiters.push(tokio::spawn(async move { l.close_request().await }));
        }
        settle().await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        conn.close().await.unwrap();
        for w in waiters {
            timeout(Duration::from_secs(5), w).await.unwrap().unwrap();
        }
        assert!(l.is_drained());
    }

    #[tokio::test]
    async fn accept_losing_race_closes_connection() {
        let (fake, feed) = FakeListen::new();
        let probe = fake.probe();
        let l = Listener::new(fake);

        let pending = {
            let l = Arc::clone(&l);
            tokio::spawn(async move { l.accept().await })
        };
        settle().await;
        assert_eq!(probe.accepts.load(Ordering::SeqCst), 1);

        // Drain completes while the transport accept is still pending.
        l.close_request().await;
        feed.send(FakeConn::new(&probe)).unwrap();

        let res = timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
        assert!(matches!(res, Err(ListenerError::AlreadyClosed)));
        assert_eq!(probe.conn_closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hard_close_closes_socket_and_unblocks_accept() {
        let (fake, _feed) = FakeListen::new();
        let probe = fake.probe();
        let l = Listener::new(fake);

        let pending = {
            let l = Arc::clone(&l);
            tokio::spawn(async move { l.accept().await })
        };
        settle().await;

        l.close().await.unwrap();
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);

        let res = timeout(Duration::from_secs(5), pending).await.unwrap().unwrap();
        assert!(matches!(res, Err(ListenerError::AlreadyClosed)));
    }

    #[tokio::test]
    async fn transport_errors_pass_through_while_open() {
        let (fake, _feed) = FakeListen::new();
        let probe = fake.probe();
        probe.fail_next_accept.store(true, Ordering::SeqCst);
        let l = Listener::new(fake);

        match l.accept().await {
            Err(ListenerError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::ConnectionAborted),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_events_reach_the_bus() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let (fake, _feed) = FakeListen::new();
        let l = Listener::spawn(fake, Some(bus));

        l.close().await.unwrap();

        let kinds: Vec<EventKind> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|ev| ev.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::DrainRequested,
                EventKind::Drained,
                EventKind::ListenerClosed
            ]
        );
    }
}
