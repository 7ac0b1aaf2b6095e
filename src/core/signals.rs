//! # OS signal handling for the supervisor loop.
//!
//! Provides [`Signals`], a pair of signal streams mapped onto the two control
//! actions of the runtime:
//!
//! - **stop** (`SIGTERM` by default): drain all listeners and return;
//! - **restart** (`SIGUSR2` by default): spawn a successor and keep serving.
//!
//! Both streams are registered up front, so a signal delivered between two
//! loop iterations is not lost.

use std::io;

use tokio::signal::unix::{Signal, SignalKind, signal};

use super::config::Config;

/// Control action requested through a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Control {
    Stop,
    Restart,
}

pub(crate) struct Signals {
    stop: Signal,
    restart: Signal,
}

impl Signals {
    /// Installs handlers for the configured stop/restart signals.
    ///
    /// Returns `Err` if signal registration fails (e.g. a forbidden signal number).
    pub(crate) fn new(cfg: &Config) -> io::Result<Self> {
        Ok(Self {
            stop: signal(SignalKind::from_raw(cfg.stop_signal))?,
            restart: signal(SignalKind::from_raw(cfg.restart_signal))?,
        })
    }

    /// Waits for the next control signal; `None` once both streams are closed.
    ///
    /// Stop wins when both are pending.
    pub(crate) async fn next(&mut self) -> Option<Control> {
        tokio::select! {
            biased;
            Some(()) = self.stop.recv() => Some(Control::Stop),
            Some(()) = self.restart.recv() => Some(Control::Restart),
            else => None,
        }
    }
}
