//! In-memory transport used by unit tests.

use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::listen::{Connection, Listen};

/// Counters shared between a fake listener, its connections and the test.
#[derive(Default)]
pub(crate) struct Probe {
    pub accepts: AtomicUsize,
    pub closes: AtomicUsize,
    pub conn_closes: AtomicUsize,
    pub fail_next_accept: AtomicBool,
    pub fail_file: AtomicBool,
}

#[derive(Debug)]
pub(crate) struct FakeConn {
    probe: Arc<Probe>,
}

impl std::fmt::Debug for Probe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Probe")
    }
}

impl FakeConn {
    pub fn new(probe: &Arc<Probe>) -> Self {
        Self {
            probe: Arc::clone(probe),
        }
    }
}

#[async_trait]
impl Connection for FakeConn {
    async fn close(&mut self) -> io::Result<()> {
        self.probe.conn_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Listener fed through a channel; closing wakes pending accepts.
pub(crate) struct FakeListen {
    incoming: Mutex<mpsc::UnboundedReceiver<FakeConn>>,
    closed: CancellationToken,
    probe: Arc<Probe>,
}

impl FakeListen {
    pub fn new() -> (Self, mpsc::UnboundedSender<FakeConn>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fake = Self {
            incoming: Mutex::new(rx),
            closed: CancellationToken::new(),
            probe: Arc::new(Probe::default()),
        };
        (fake, tx)
    }

    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }
}

#[async_trait]
impl Listen for FakeListen {
    type Conn = FakeConn;

    async fn accept(&self) -> io::Result<FakeConn> {
        self.probe.accepts.fetch_add(1, Ordering::SeqCst);
        if self.probe.fail_next_accept.swap(false, Ordering::SeqCst) {
            return Err(io::ErrorKind::ConnectionAborted.into());
        }
        let mut incoming = self.incoming.lock().await;
        tokio::select! {
            _ = self.closed.cancelled() => Err(io::Error::other("listener closed")),
            conn = incoming.recv() => conn.ok_or_else(|| io::Error::other("feed dropped")),
        }
    }

    fn close(&self) -> io::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.closed.cancel();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    fn file(&self) -> io::Result<OwnedFd> {
        if self.probe.fail_file.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::Unsupported.into());
        }
        Ok(File::open("/dev/null")?.into())
    }

    fn label(&self) -> String {
        "fake".to_string()
    }
}
