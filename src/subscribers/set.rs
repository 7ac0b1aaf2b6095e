//! # SubscriberSet: non-blocking fan-out over multiple subscribers
//!
//! [`SubscriberSet`] distributes each [`Event`] to multiple subscribers
//! **without awaiting** their processing, and lets the supervisor wait for
//! everything queued so far before the process exits ([`SubscriberSet::flush`]).
//!
//! ## What it guarantees
//! - `emit(&Event)` returns immediately.
//! - Per-subscriber FIFO (queue order); a flush barrier is ordered like an event.
//! - Panics inside subscribers are caught and logged (isolation).
//! - Dropped events are counted per subscriber ([`SubscriberSet::dropped`]).
//!
//! ## What it does **not** guarantee
//! - No global ordering across different subscribers.
//! - No retries on per-subscriber queue overflow.
//!
//! ## Diagram
//! ```text
//!    emit(&Event) / flush()
//!        │                        (Arc-clone per subscriber)
//!        ├────────────────► [queue S1] ─► worker S1 ─► on_event() / ack
//!        ├────────────────► [queue S2] ─► worker S2 ─► on_event() / ack
//!        └────────────────► [queue SN] ─► worker SN ─► on_event() / ack
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::events::Event;

use super::Subscribe;

/// Queue item: an event, or a barrier acknowledged once everything before it ran.
enum Item {
    Event(Arc<Event>),
    Flush(oneshot::Sender<()>),
}

struct SubscriberChannel {
    name: &'static str,
    sender: mpsc::Sender<Item>,
    dropped: AtomicU64,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    channels: Vec<SubscriberChannel>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates a new set and spawns one worker per subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut channels = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let name = sub.name();
            let (tx, rx) = mpsc::channel::<Item>(sub.queue_capacity().max(1));
            workers.push(tokio::spawn(worker(sub, rx)));
            channels.push(SubscriberChannel {
                name,
                sender: tx,
                dropped: AtomicU64::new(0),
            });
        }

        Self { channels, workers }
    }

    /// Fan-out one event to all subscribers (non-blocking).
    ///
    /// If a subscriber's queue is **full** or **closed**, the event is dropped for it.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for channel in &self.channels {
            let reason = match channel.sender.try_send(Item::Event(Arc::clone(&ev))) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "queue full",
                Err(mpsc::error::TrySendError::Closed(_)) => "worker closed",
            };
            let dropped = channel.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                subscriber = channel.name,
                kind = ?ev.kind,
                listener = ev.listener.as_deref(),
                dropped,
                "dropped event: {reason}"
            );
        }
    }

    /// Waits until every subscriber has handled the events emitted before this call.
    ///
    /// Unlike `emit`, this waits for queue space. Subscribers whose worker is gone
    /// are skipped.
    pub async fn flush(&self) {
        let mut acks = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let (ack, done) = oneshot::channel();
            if channel.sender.send(Item::Flush(ack)).await.is_ok() {
                acks.push(done);
            }
        }
        for done in acks {
            let _ = done.await;
        }
    }

    /// Total number of events dropped across all subscribers.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.channels
            .iter()
            .map(|c| c.dropped.load(Ordering::Relaxed))
            .sum()
    }

    /// Graceful shutdown: close all queues and await worker completion.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }
}

async fn worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Item>) {
    while let Some(item) = rx.recv().await {
        match item {
            Item::Event(ev) => {
                let fut = sub.on_event(ev.as_ref());
                if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                    tracing::error!(subscriber = sub.name(), ?panic_err, "subscriber panicked");
                }
            }
            Item::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_event(&self, _event: &Event) {
            panic!("subscriber blew up");
        }
    }

    #[tokio::test]
    async fn fans_out_in_order_and_survives_panics() {
        let rec = Arc::new(Recorder::default());
        let set = SubscriberSet::new(vec![rec.clone(), Arc::new(Panicky)]);
        assert_eq!(set.len(), 2);

        set.emit(&Event::now(EventKind::RestartRequested));
        set.emit(&Event::now(EventKind::SuccessorSpawned));
        set.shutdown().await;

        assert_eq!(
            *rec.seen.lock().unwrap(),
            vec![EventKind::RestartRequested, EventKind::SuccessorSpawned]
        );
    }

    #[tokio::test]
    async fn empty_set_accepts_events() {
        let set = SubscriberSet::new(Vec::new());
        assert!(set.is_empty());
        set.emit(&Event::now(EventKind::AllDrained));
    }

    struct Slow {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl Subscribe for Slow {
        async fn on_event(&self, event: &Event) {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.seen.lock().unwrap().push(event.kind);
        }

        fn queue_capacity(&self) -> usize {
            1
        }
    }

    #[tokio::test]
    async fn flush_waits_for_queued_events() {
        let slow = Arc::new(Slow {
            seen: Mutex::new(Vec::new()),
        });
        let set = SubscriberSet::new(vec![slow.clone() as Arc<dyn Subscribe>]);

        set.emit(&Event::now(EventKind::ShutdownRequested));
        set.flush().await;
        set.emit(&Event::now(EventKind::AllDrained));
        set.flush().await;

        assert_eq!(
            *slow.seen.lock().unwrap(),
            vec![EventKind::ShutdownRequested, EventKind::AllDrained]
        );
        assert_eq!(set.dropped(), 0);
    }

    #[tokio::test]
    async fn overflow_is_counted() {
        let slow = Arc::new(Slow {
            seen: Mutex::new(Vec::new()),
        });
        let set = SubscriberSet::new(vec![slow.clone() as Arc<dyn Subscribe>]);

        // The worker has not run yet: the first event fills the queue.
        set.emit(&Event::now(EventKind::DrainRequested));
        set.emit(&Event::now(EventKind::Drained));
        set.emit(&Event::now(EventKind::ListenerClosed));
        assert_eq!(set.dropped(), 2);

        set.flush().await;
        assert_eq!(*slow.seen.lock().unwrap(), vec![EventKind::DrainRequested]);
    }
}
