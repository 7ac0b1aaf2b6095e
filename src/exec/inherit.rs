//! # Inherit listeners passed by a predecessor process.
//!
//! A predecessor started through [`restart`](crate::restart) leaves its
//! listening sockets at descriptors `3..3 + n` and announces `n` in
//! `LISTEN_FDS`. [`inherit`] adopts them, in descriptor order, as fresh
//! [`Listener`]s with zeroed counters.
//!
//! ```text
//! LISTEN_FDS unset/empty ─► Err(NotInheriting)   (cold start: bind fresh sockets)
//! LISTEN_FDS = "x"       ─► Err(InvalidCount)
//! LISTEN_FDS = "2"       ─► fd 3 ─► Listener #0
//!                           fd 4 ─► Listener #1
//! ```

use std::env;
use std::os::fd::{FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

use super::{LISTEN_FDS, LISTEN_FDS_START, fd};
use crate::error::InheritError;
use crate::events::{Bus, Event, EventKind};
use crate::listener::{Listener, TcpTransport};

/// Tries to inherit listeners from the parent process.
///
/// Returns [`InheritError::NotInheriting`] on a cold start; callers should bind
/// their own sockets in that case. Must be called from within a Tokio runtime.
pub fn inherit() -> Result<Vec<Arc<Listener<TcpTransport>>>, InheritError> {
    inherit_with(None)
}

pub(crate) fn inherit_with(
    bus: Option<&Bus>,
) -> Result<Vec<Arc<Listener<TcpTransport>>>, InheritError> {
    let value = env::var_os(LISTEN_FDS).map(|v| v.to_string_lossy().into_owned());
    let count = parse_count(value.as_deref())?;

    let mut listeners = Vec::with_capacity(usize::from(count));
    for raw in (LISTEN_FDS_START..).take(usize::from(count)) {
        let transport = adopt(raw).map_err(|source| InheritError::Socket { fd: raw, source })?;
        listeners.push(Listener::spawn(transport, bus.cloned()));
    }

    tracing::info!(count, "inherited listeners");
    if let Some(bus) = bus {
        bus.publish(Event::now(EventKind::ListenersInherited).with_count(count));
    }
    Ok(listeners)
}

/// Parses the announced descriptor count; absent or empty means cold start.
pub(crate) fn parse_count(value: Option<&str>) -> Result<u16, InheritError> {
    match value {
        None | Some("") => Err(InheritError::NotInheriting),
        Some(v) => v.parse::<u16>().map_err(|source| InheritError::InvalidCount {
            value: v.to_string(),
            source,
        }),
    }
}

fn adopt(raw: RawFd) -> std::io::Result<TcpTransport> {
    // A wrong count must not make us close a descriptor someone else owns.
    fd::ensure_listening_socket(raw)?;
    // SAFETY: `raw` is a listening socket placed by the handoff contract, and
    // nothing else in this process refers to it.
    let owned = unsafe { OwnedFd::from_raw_fd(raw) };
    fd::set_cloexec(&owned, true)?;
    TcpTransport::from_std(std::net::TcpListener::from(owned))
}
