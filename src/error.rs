//! Error types used by listeners, the handoff protocol and the supervisor loop.
//!
//! - [`ListenerError`]: accept/close failures of a single coordinated listener.
//! - [`InheritError`]: failures while adopting descriptors passed by a predecessor.
//! - [`RestartError`]: failures while exporting descriptors or spawning a successor.
//! - [`RuntimeError`]: the outcome of [`Supervisor::run`](crate::Supervisor::run).
//!
//! Every type provides `as_label` (short stable snake_case) for logs/metrics.

use std::io;
use std::num::ParseIntError;
use std::os::fd::RawFd;

use thiserror::Error;

/// # Errors produced by a coordinated [`Listener`](crate::Listener).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ListenerError {
    /// The listener finished draining (or its socket was closed) before or during accept.
    ///
    /// Expected under concurrent shutdown; not a transport fault.
    #[error("already closed")]
    AlreadyClosed,

    /// Transport error propagated verbatim from the underlying listener.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ListenerError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use sockvisor::ListenerError;
    ///
    /// assert_eq!(ListenerError::AlreadyClosed.as_label(), "listener_already_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::AlreadyClosed => "listener_already_closed",
            ListenerError::Io(_) => "listener_io",
        }
    }

    /// True for [`ListenerError::AlreadyClosed`].
    pub fn is_closed(&self) -> bool {
        matches!(self, ListenerError::AlreadyClosed)
    }
}

/// # Errors produced while inheriting listeners from a predecessor.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum InheritError {
    /// `LISTEN_FDS` is not set: this is a cold start, not a failure.
    #[error("no inherited listeners")]
    NotInheriting,

    /// `LISTEN_FDS` is set but is not a valid descriptor count.
    #[error("invalid inherited listener count {value:?}: {source}")]
    InvalidCount {
        /// Raw value found in the environment.
        value: String,
        /// Parse failure.
        #[source]
        source: ParseIntError,
    },

    /// An inherited descriptor could not be turned into a listening socket.
    #[error("inherited descriptor {fd} is not a usable listener: {source}")]
    Socket {
        /// Descriptor number that failed.
        fd: RawFd,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },
}

impl InheritError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            InheritError::NotInheriting => "inherit_not_inheriting",
            InheritError::InvalidCount { .. } => "inherit_invalid_count",
            InheritError::Socket { .. } => "inherit_socket",
        }
    }

    /// Indicates the process was started fresh and should bind its own sockets.
    ///
    /// # Example
    /// ```
    /// use sockvisor::InheritError;
    ///
    /// assert!(InheritError::NotInheriting.is_cold_start());
    /// ```
    pub fn is_cold_start(&self) -> bool {
        matches!(self, InheritError::NotInheriting)
    }
}

/// # Errors produced while starting a successor process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RestartError {
    /// Restart was called with an empty listener list.
    #[error("restart must be given listeners")]
    NoListeners,

    /// A listener's descriptor could not be exported.
    #[error("failed to export listener #{index}: {source}")]
    Export {
        /// Position of the listener in the registry.
        index: usize,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// The current executable path could not be resolved.
    #[error("failed to resolve current executable: {0}")]
    Executable(#[source] io::Error),

    /// The current working directory could not be read.
    #[error("failed to read working directory: {0}")]
    WorkingDir(#[source] io::Error),

    /// The successor process could not be started.
    #[error("failed to spawn successor: {0}")]
    Spawn(#[source] io::Error),
}

impl RestartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartError::NoListeners => "restart_no_listeners",
            RestartError::Export { .. } => "restart_export",
            RestartError::Executable(_) => "restart_executable",
            RestartError::WorkingDir(_) => "restart_working_dir",
            RestartError::Spawn(_) => "restart_spawn",
        }
    }
}

/// # Errors produced by the supervisor signal loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Signal handlers could not be installed.
    #[error("failed to register signal handler: {0}")]
    Signal(#[source] io::Error),

    /// At least one listener failed to close during shutdown (the last failure is kept).
    #[error("listener close failed: {0}")]
    Close(#[source] ListenerError),

    /// Starting a successor failed; the loop stops.
    #[error("restart failed: {0}")]
    Restart(#[source] RestartError),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Signal(_) => "runtime_signal",
            RuntimeError::Close(_) => "runtime_close",
            RuntimeError::Restart(_) => "runtime_restart",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(RestartError::NoListeners.as_label(), "restart_no_listeners");
        assert_eq!(
            RuntimeError::Close(ListenerError::AlreadyClosed).as_label(),
            "runtime_close"
        );
        assert_eq!(InheritError::NotInheriting.as_label(), "inherit_not_inheriting");
    }

    #[test]
    fn invalid_count_keeps_value_and_source() {
        let source = "x".parse::<u16>().unwrap_err();
        let err = InheritError::InvalidCount {
            value: "x".into(),
            source,
        };
        assert!(!err.is_cold_start());
        assert!(err.to_string().contains("\"x\""));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn io_errors_pass_through() {
        let err: ListenerError = io::Error::from(io::ErrorKind::ConnectionReset).into();
        assert!(!err.is_closed());
        match err {
            ListenerError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("unexpected {other:?}"),
        }
    }
}
