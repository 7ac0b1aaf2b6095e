//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the supervisor runtime.
//!
//! The handoff contract itself (`LISTEN_FDS`, descriptors starting at 3) is
//! fixed and lives in [`crate::LISTEN_FDS`] / [`crate::LISTEN_FDS_START`];
//! only the control surface is configurable.

use std::os::raw::c_int;

/// Global configuration for the supervisor runtime.
///
/// ## Field semantics
/// - `stop_signal`: drain every listener and return from [`Supervisor::run`](crate::Supervisor::run)
/// - `restart_signal`: spawn a successor with the listeners attached, keep serving
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct Config {
    /// Signal that triggers drain-and-stop.
    ///
    /// Also the signal [`Supervisor::close_parent`](crate::Supervisor::close_parent)
    /// sends to a predecessor, so both generations must agree on it.
    pub stop_signal: c_int,

    /// Signal that triggers a restart (successor spawn).
    pub restart_signal: c_int,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow subscribers that lag behind more than `bus_capacity` messages will
    /// receive `Lagged` and skip older items. Minimum value is 1 (enforced by Bus).
    pub bus_capacity: usize,
}

impl Config {
    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `stop_signal = SIGTERM`
    /// - `restart_signal = SIGUSR2`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            stop_signal: libc::SIGTERM,
            restart_signal: libc::SIGUSR2,
            bus_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_conventional_signals() {
        let cfg = Config::default();
        assert_eq!(cfg.stop_signal, libc::SIGTERM);
        assert_eq!(cfg.restart_signal, libc::SIGUSR2);
        assert_eq!(cfg.bus_capacity_clamped(), 1024);
    }

    #[test]
    fn bus_capacity_is_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
