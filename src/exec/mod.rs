//! Process handoff: descriptor inheritance across restarts.
//!
//! - [`inherit`]: adopt listeners announced by `LISTEN_FDS` at startup;
//! - [`restart`]: spawn a successor with the listeners at `3..3 + n`;
//! - `fd`: `fcntl`/`dup2` helpers.
//!
//! ## Contract between generations
//! ```text
//! predecessor                                   successor
//!   registry [L0, L1, L2] ── restart() ──► env LISTEN_FDS=3
//!                                          fd 3 = L0, fd 4 = L1, fd 5 = L2
//!                                          inherit() ──► [L0', L1', L2']
//!                                          ... ready ... close_parent() ──► SIGTERM
//!   drain + exit ◄────────────────────────────────────────────────────────┘
//! ```

use std::os::fd::RawFd;

mod fd;
mod inherit;
mod restart;

pub use inherit::inherit;
pub(crate) use inherit::inherit_with;
pub use restart::{close_parent, close_parent_with, restart};

/// Environment variable announcing the number of inherited listeners.
pub const LISTEN_FDS: &str = "LISTEN_FDS";

/// First inherited descriptor (after stdin, stdout, stderr).
pub const LISTEN_FDS_START: RawFd = 3;

/// Process id of the init process; a parent with this id is a socket activator.
pub(crate) const INIT_PID: u32 = 1;
