//! # Runtime events emitted by listeners and the supervisor.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Listener events**: drain lifecycle of a single coordinated listener
//! - **Supervisor events**: reactions to the stop/restart signals
//! - **Handoff events**: inheritance and successor spawning
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Events from one listener's arbiter are published in processing order;
//! there is no ordering across listeners beyond `seq`.
//!
//! ## Example
//! ```rust
//! use sockvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::SuccessorSpawned)
//!     .with_pid(4242)
//!     .with_count(2);
//!
//! assert_eq!(ev.kind, EventKind::SuccessorSpawned);
//! assert_eq!(ev.pid, Some(4242));
//! assert_eq!(ev.count, Some(2));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Listener events ===
    /// First close request reached a listener's arbiter; accepts continue
    /// only for connections registered before the drain completes.
    ///
    /// Sets `listener`, `count` (active connections at request time).
    DrainRequested,

    /// Listener finished draining: close was requested and no connection is active.
    ///
    /// Sets `listener`.
    Drained,

    /// Underlying socket of a listener was closed after draining (hard close).
    ///
    /// Sets `listener`.
    ListenerClosed,

    /// A connection was accepted by the transport after the drain completed
    /// and was closed instead of being handed out.
    ///
    /// Sets `listener`.
    AcceptRaced,

    // === Supervisor events ===
    /// Stop signal observed.
    ///
    /// Sets `count` (listeners to drain), `reason` (`"soft"` or `"hard"`).
    ShutdownRequested,

    /// Every registered listener finished draining.
    AllDrained,

    /// A listener failed to close during shutdown.
    ///
    /// Sets `listener`, `reason`.
    CloseFailed,

    /// Restart signal observed.
    ///
    /// Sets `count` (listeners to hand off).
    RestartRequested,

    // === Handoff events ===
    /// Listeners were adopted from a predecessor.
    ///
    /// Sets `count`.
    ListenersInherited,

    /// Successor process started with the listeners attached.
    ///
    /// Sets `pid`, `count`.
    SuccessorSpawned,

    /// Successor could not be started.
    ///
    /// Sets `reason`.
    RestartFailed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Listener label (usually its local address), if applicable.
    pub listener: Option<Arc<str>>,
    /// Human-readable reason (errors, close mode, etc.).
    pub reason: Option<Arc<str>>,
    /// Process id (successor pid).
    pub pid: Option<u32>,
    /// Count of listeners or connections, depending on the kind.
    pub count: Option<u64>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            listener: None,
            reason: None,
            pid: None,
            count: None,
        }
    }

    /// Attaches a listener label.
    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches a count.
    #[inline]
    pub fn with_count(mut self, count: impl TryInto<u64>) -> Self {
        self.count = count.try_into().ok();
        self
    }
}
