//! # Supervisor: signal-driven drain and restart across a listener registry.
//!
//! The [`Supervisor`] owns the event bus, a [`SubscriberSet`] and the runtime
//! configuration. It wraps transports into bus-connected [`Listener`]s and runs
//! the control loop that reacts to the stop and restart signals.
//!
//! ## High-level architecture
//! ```text
//! Inputs to run():
//!   Vec<ListenerRef> (ordered registry) ──► Supervisor::run()
//!
//! loop on Signals::next():
//!   stop    ──► Bus.publish(ShutdownRequested)
//!               mode = CloseMode::current()       (parent pid 1 → Soft, else Hard)
//!               drain_all(registry, mode):
//!                  ┌────────────┬────────────┬────────────┐
//!                  ▼            ▼            ▼            (JoinSet, concurrent)
//!               L0.close()   L1.close()   L2.close()      (Soft: close_request())
//!                  └────────────┴─────┬──────┘
//!                                     ▼
//!               Bus.publish(AllDrained) ──► flush subscribers
//!                                          ──► return last close error, if any
//!
//!   restart ──► Bus.publish(RestartRequested)
//!               restart(registry) ──► Ok(pid)  → SuccessorSpawned, keep looping
//!                                 └─► Err(e)   → RestartFailed, flush, return Err
//! ```
//!
//! ## Rules
//! - Every listener gets to drain even if others fail to close.
//! - Drains have no deadline; impose one outside if shutdown must be bounded.
//! - A successful restart leaves this process serving until its own stop signal.

use std::io;
use std::os::unix::process::parent_id;
use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;

use super::config::Config;
use super::signals::{Control, Signals};
use crate::error::{InheritError, ListenerError, RestartError, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::exec;
use crate::listener::{Listen, Listener, ListenerRef, TcpTransport};
use crate::subscribers::SubscriberSet;

/// How listeners are closed on the stop signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseMode {
    /// Drain only; the socket stays open because an activator (init) owns it.
    Soft,
    /// Drain, then close the socket.
    Hard,
}

impl CloseMode {
    /// Soft when `ppid` is init, hard otherwise.
    pub fn for_parent(ppid: u32) -> Self {
        if ppid == exec::INIT_PID {
            CloseMode::Soft
        } else {
            CloseMode::Hard
        }
    }

    /// Mode for the current process, from its parent pid.
    pub fn current() -> Self {
        Self::for_parent(parent_id())
    }

    /// Short stable label for logs/events.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseMode::Soft => "soft",
            CloseMode::Hard => "hard",
        }
    }
}

/// Coordinates listener drains, successor spawning and event delivery.
pub struct Supervisor {
    cfg: Config,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    flush_tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
}

impl Supervisor {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        flush_tx: mpsc::UnboundedSender<oneshot::Sender<()>>,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            flush_tx,
        }
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Event bus shared with every listener created through this supervisor.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Wraps `transport` into a listener publishing to this supervisor's bus.
    pub fn listen<L: Listen>(&self, transport: L) -> Arc<Listener<L>> {
        Listener::spawn(transport, Some(self.bus.clone()))
    }

    /// Inherits listeners from a predecessor; see [`exec::inherit`].
    pub fn inherit(&self) -> Result<Vec<Arc<Listener<TcpTransport>>>, InheritError> {
        exec::inherit_with(Some(&self.bus))
    }

    /// Spawns a successor with `listeners` attached; see [`exec::restart`].
    pub fn restart(&self, listeners: &[ListenerRef]) -> Result<u32, RestartError> {
        match exec::restart(listeners) {
            Ok(pid) => {
                self.bus.publish(
                    Event::now(EventKind::SuccessorSpawned)
                        .with_pid(pid)
                        .with_count(listeners.len()),
                );
                Ok(pid)
            }
            Err(e) => {
                tracing::error!(error = %e, "restart failed");
                self.bus
                    .publish(Event::now(EventKind::RestartFailed).with_reason(e.to_string()));
                Err(e)
            }
        }
    }

    /// Tells the predecessor to drain, using the configured stop signal.
    pub fn close_parent(&self) -> io::Result<()> {
        exec::close_parent_with(self.cfg.stop_signal)
    }

    /// Blocks on the stop/restart signals until a stop completes or a restart fails.
    ///
    /// Returns the last listener close error on stop, or the restart error.
    pub async fn run(&self, listeners: Vec<ListenerRef>) -> Result<(), RuntimeError> {
        let mut signals = Signals::new(&self.cfg).map_err(RuntimeError::Signal)?;

        while let Some(control) = signals.next().await {
            match control {
                Control::Stop => {
                    let mode = CloseMode::current();
                    tracing::info!(listeners = listeners.len(), mode = mode.as_str(), "stop signal");
                    self.bus.publish(
                        Event::now(EventKind::ShutdownRequested)
                            .with_count(listeners.len())
                            .with_reason(mode.as_str()),
                    );
                    let res = self.drain_all(&listeners, mode).await;
                    self.flush().await;
                    return res.map_err(RuntimeError::Close);
                }
                Control::Restart => {
                    tracing::info!(listeners = listeners.len(), "restart signal");
                    self.bus.publish(
                        Event::now(EventKind::RestartRequested).with_count(listeners.len()),
                    );
                    if let Err(e) = self.restart(&listeners) {
                        self.flush().await;
                        return Err(RuntimeError::Restart(e));
                    }
                }
            }
        }
        Ok(())
    }

    /// Drains every listener concurrently and waits for all of them.
    ///
    /// Close failures do not stop other drains; the last one observed is returned.
    pub async fn drain_all(
        &self,
        listeners: &[ListenerRef],
        mode: CloseMode,
    ) -> Result<(), ListenerError> {
        let mut set = JoinSet::new();
        for l in listeners {
            let l = Arc::clone(l);
            set.spawn(async move {
                let res = match mode {
                    CloseMode::Soft => {
                        l.close_request().await;
                        Ok(())
                    }
                    CloseMode::Hard => l.close().await,
                };
                (l, res)
            });
        }

        let mut last_err = None;
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((l, Err(e))) => {
                    tracing::warn!(listener = l.label(), error = %e, "listener close failed");
                    self.bus.publish(
                        Event::now(EventKind::CloseFailed)
                            .with_listener(l.label())
                            .with_reason(e.to_string()),
                    );
                    last_err = Some(e);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "listener drain task panicked");
                }
            }
        }

        self.bus.publish(Event::now(EventKind::AllDrained));
        match last_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Waits until subscribers have handled every event published so far.
    ///
    /// `run` calls this before returning, so the last events of a generation
    /// are not lost when the process exits right after.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.flush_tx.send(ack).is_ok() {
            let _ = done.await;
        }
    }

    /// Subscribes to the bus and forwards events to the subscriber set.
    ///
    /// Flush requests first forward whatever the bus already holds, then wait
    /// on the subscriber queues.
    pub(crate) fn subscriber_listener(
        &self,
        mut flush_rx: mpsc::UnboundedReceiver<oneshot::Sender<()>>,
    ) {
        let mut rx = self.bus.subscribe();
        let set = Arc::clone(&self.subs);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    recv = rx.recv() => match recv {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                    Some(ack) = flush_rx.recv() => {
                        loop {
                            match rx.try_recv() {
                                Ok(ev) => set.emit(&ev),
                                Err(TryRecvError::Lagged(n)) => {
                                    tracing::warn!(skipped = n, "subscriber listener lagged");
                                }
                                Err(_) => break,
                            }
                        }
                        set.flush().await;
                        let _ = ack.send(());
                    }
                }
            }
        });
    }
}
