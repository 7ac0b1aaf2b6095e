//! # Arbiter: the single owner of a listener's drain state.
//!
//! One arbiter task runs per [`Listener`](crate::Listener). It is the only
//! place where the active-connection count and the close request live; every
//! change arrives as a [`Message`] on one unbounded queue and is applied in
//! arrival order.
//!
//! ## Phases
//! ```text
//!            CloseRequest                 active == 0
//!   Open ───────────────────► Draining ───────────────────► Closed
//!    │  Register / Done          │  Register / Done             │
//!    └── active ± 1              └── active ± 1                 └─► drained.cancel()
//!                                                                   queue dropped
//! ```
//!
//! ## Rules
//! - Only the first `CloseRequest` moves `Open → Draining`; later ones are no-ops.
//! - `closed` is decided after each message, so a `Done` that reaches zero and a
//!   `CloseRequest` can never miss each other.
//! - On `Closed` the latch fires exactly once, then the queue is dropped:
//!   pending `Register` requests fail and their callers report `AlreadyClosed`.
//! - `Register` is answered with a [`Completion`]; if the reply is never
//!   received the guard is dropped and balances the count on its own.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use super::conn::Completion;
use crate::events::{Bus, Event, EventKind};

/// Messages consumed by the arbiter.
pub(crate) enum Message {
    /// Count a newly accepted connection; reply with its completion guard.
    Register(oneshot::Sender<Completion>),
    /// A connection finished.
    Done,
    /// Drain requested.
    CloseRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Open,
    Draining,
    Closed,
}

pub(crate) struct Arbiter {
    rx: mpsc::UnboundedReceiver<Message>,
    /// Used to mint completion guards.
    tx: mpsc::WeakUnboundedSender<Message>,
    drained: CancellationToken,
    label: Arc<str>,
    bus: Option<Bus>,
    active: u64,
    phase: Phase,
}

impl Arbiter {
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<Message>,
        tx: mpsc::WeakUnboundedSender<Message>,
        drained: CancellationToken,
        label: Arc<str>,
        bus: Option<Bus>,
    ) -> Self {
        Self {
            rx,
            tx,
            drained,
            label,
            bus,
            active: 0,
            phase: Phase::Open,
        }
    }

    /// Processes messages until the drain completes or every sender is gone.
    pub(crate) async fn run(mut self) {
        while let Some(msg) = self.rx.recv().await {
            self.apply(msg);
            if self.phase == Phase::Draining && self.active == 0 {
                self.phase = Phase::Closed;
                tracing::debug!(listener = %self.label, "listener drained");
                self.publish(Event::now(EventKind::Drained));
                self.drained.cancel();
                break;
            }
        }
    }

    fn apply(&mut self, msg: Message) {
        match msg {
            Message::Register(reply) => {
                let Some(tx) = self.tx.upgrade() else {
                    return;
                };
                self.active += 1;
                // A dropped receiver hands the guard back; dropping it queues `Done`.
                let _ = reply.send(Completion::new(tx));
            }
            Message::Done => {
                self.active = self.active.saturating_sub(1);
            }
            Message::CloseRequest => {
                if self.phase == Phase::Open {
                    self.phase = Phase::Draining;
                    tracing::debug!(listener = %self.label, active = self.active, "drain requested");
                    self.publish(Event::now(EventKind::DrainRequested).with_count(self.active));
                }
            }
        }
    }

    fn publish(&self, ev: Event) {
        if let Some(bus) = &self.bus {
            bus.publish(ev.with_listener(Arc::clone(&self.label)));
        }
    }
}
