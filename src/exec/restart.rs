//! # Start a successor process with the listeners attached.
//!
//! ```text
//! restart([L0, L1, ..., Ln-1])
//!   ├─ Li.file() ─► dup above 3+n (close-on-exec in this process)
//!   ├─ argv[0] (PATH lookup), current_dir, argv, env + LISTEN_FDS=n
//!   ├─ hold free slots in 3..3+n (spawn's own pipes must not land there)
//!   └─ spawn ── child, before exec: dup2(Li, 3+i)  (inheritable)
//!                └─ exec ─► successor calls inherit() ─► [L0', ..., Ln-1']
//! ```
//!
//! The executable is looked up by path rather than through `/proc/self/exe`,
//! so a binary replaced on disk since startup is the one that gets started.
//!
//! The predecessor is neither stopped nor signalled here; the successor calls
//! [`close_parent`] once it is ready to serve.

use std::env;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::raw::c_int;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::process::{CommandExt, parent_id};
use std::path::{Path, PathBuf};
use std::process::Command;

use super::{INIT_PID, LISTEN_FDS, LISTEN_FDS_START, fd};
use crate::error::RestartError;
use crate::listener::ListenerRef;

/// Restarts the process, passing `listeners` to the new process.
///
/// The successor gets the same argv, working directory and environment, plus
/// `LISTEN_FDS` and the listeners at descriptors `3..3 + n` in input order.
/// Returns the successor's process id; does not wait for it.
pub fn restart(listeners: &[ListenerRef]) -> Result<u32, RestartError> {
    if listeners.is_empty() {
        return Err(RestartError::NoListeners);
    }

    let floor = RawFd::try_from(listeners.len())
        .ok()
        .and_then(|n| LISTEN_FDS_START.checked_add(n))
        .ok_or_else(|| RestartError::Export {
            index: listeners.len() - 1,
            source: io::Error::from(io::ErrorKind::InvalidInput),
        })?;

    let mut files: Vec<OwnedFd> = Vec::with_capacity(listeners.len());
    for (index, l) in listeners.iter().enumerate() {
        let exported = l
            .file()
            .and_then(|f| fd::dup_at_least(&f, floor))
            .map_err(|source| RestartError::Export { index, source })?;
        files.push(exported);
    }

    let cwd = env::current_dir().map_err(RestartError::WorkingDir)?;
    let mut args = env::args_os();
    let arg0 = args.next();
    let exe = match arg0
        .as_deref()
        .and_then(|a| lookup(a, env::var_os("PATH").as_deref(), &cwd))
    {
        Some(exe) => exe,
        None => env::current_exe().map_err(RestartError::Executable)?,
    };

    let mut cmd = Command::new(&exe);
    if let Some(arg0) = arg0 {
        cmd.arg0(arg0);
    }
    cmd.args(args)
        .current_dir(cwd)
        .env(LISTEN_FDS, files.len().to_string());

    let sources: Vec<RawFd> = files.iter().map(AsRawFd::as_raw_fd).collect();
    // SAFETY: the hook only calls dup2 on descriptors owned by `files`, which
    // outlive `spawn`, and does not allocate.
    unsafe {
        cmd.pre_exec(move || fd::install(&sources, LISTEN_FDS_START));
    }

    let reserved =
        fd::reserve(&files[0], LISTEN_FDS_START, files.len()).map_err(RestartError::Spawn)?;
    let child = cmd.spawn().map_err(RestartError::Spawn)?;
    drop(reserved);
    let pid = child.id();
    tracing::info!(pid, listeners = files.len(), exe = %exe.display(), "successor spawned");
    Ok(pid)
}

/// Resolves `argv0` like a shell would: as a path when it contains `/`,
/// otherwise by searching `path`. Relative results are anchored at `cwd`.
fn lookup(argv0: &OsStr, path: Option<&OsStr>, cwd: &Path) -> Option<PathBuf> {
    if argv0.is_empty() {
        return None;
    }
    if argv0.as_bytes().contains(&b'/') {
        let exe = cwd.join(argv0);
        return is_executable(&exe).then_some(exe);
    }
    env::split_paths(path?)
        .map(|dir| cwd.join(dir).join(argv0))
        .find(|exe| is_executable(exe))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

/// Asks the parent process to start its drain (sends `SIGTERM`).
///
/// A no-op when the parent is init: sockets came from a socket activator, not
/// from a predecessor of this program.
pub fn close_parent() -> io::Result<()> {
    close_parent_with(libc::SIGTERM)
}

/// Like [`close_parent`], sending `signal` instead of `SIGTERM`.
pub fn close_parent_with(signal: c_int) -> io::Result<()> {
    let ppid = parent_id();
    if ppid == INIT_PID {
        return Ok(());
    }
    let pid = libc::pid_t::try_from(ppid)
        .map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
    // SAFETY: kill has no memory-safety preconditions.
    if unsafe { libc::kill(pid, signal) } == -1 {
        return Err(io::Error::last_os_error());
    }
    tracing::info!(ppid, signal, "asked parent to drain");
    Ok(())
}
