//! # LogWriter: event renderer on top of `tracing`
//!
//! A minimal subscriber that turns incoming [`Event`]s into `tracing` records.
//! It does not install a tracing subscriber; the application decides where
//! records go.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO sockvisor: shutdown requested listeners=2 mode="hard"
//! DEBUG sockvisor: drain requested listener="127.0.0.1:8080" active=3
//! INFO sockvisor: listener drained listener="127.0.0.1:8080"
//! INFO sockvisor: successor spawned pid=4242 listeners=2
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let listener = e.listener.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");
        match e.kind {
            EventKind::DrainRequested => {
                tracing::debug!(target: "sockvisor", listener, active = e.count, "drain requested");
            }
            EventKind::Drained => {
                tracing::info!(target: "sockvisor", listener, "listener drained");
            }
            EventKind::ListenerClosed => {
                tracing::info!(target: "sockvisor", listener, "listener closed");
            }
            EventKind::AcceptRaced => {
                tracing::debug!(target: "sockvisor", listener, "accepted connection lost race with drain");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "sockvisor", listeners = e.count, mode = reason, "shutdown requested");
            }
            EventKind::AllDrained => {
                tracing::info!(target: "sockvisor", "all listeners drained");
            }
            EventKind::CloseFailed => {
                tracing::warn!(target: "sockvisor", listener, err = reason, "listener close failed");
            }
            EventKind::RestartRequested => {
                tracing::info!(target: "sockvisor", listeners = e.count, "restart requested");
            }
            EventKind::ListenersInherited => {
                tracing::info!(target: "sockvisor", listeners = e.count, "listeners inherited");
            }
            EventKind::SuccessorSpawned => {
                tracing::info!(target: "sockvisor", pid = e.pid, listeners = e.count, "successor spawned");
            }
            EventKind::RestartFailed => {
                tracing::error!(target: "sockvisor", err = reason, "restart failed");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
