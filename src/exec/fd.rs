//! Descriptor flag helpers (thin `fcntl`/`dup2` wrappers).

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

fn cvt(ret: libc::c_int) -> io::Result<libc::c_int> {
    if ret == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(ret)
    }
}

/// Sets or clears `FD_CLOEXEC` on `fd`.
pub(crate) fn set_cloexec(fd: &impl AsRawFd, on: bool) -> io::Result<()> {
    let raw = fd.as_raw_fd();
    // SAFETY: F_GETFD/F_SETFD only touch descriptor flags of a live descriptor.
    unsafe {
        let flags = cvt(libc::fcntl(raw, libc::F_GETFD))?;
        let next = if on {
            flags | libc::FD_CLOEXEC
        } else {
            flags & !libc::FD_CLOEXEC
        };
        if next != flags {
            cvt(libc::fcntl(raw, libc::F_SETFD, next))?;
        }
    }
    Ok(())
}

/// Duplicates `fd` to the lowest free descriptor `>= min`, close-on-exec.
pub(crate) fn dup_at_least(fd: &impl AsRawFd, min: RawFd) -> io::Result<OwnedFd> {
    // SAFETY: F_DUPFD_CLOEXEC returns a fresh descriptor we exclusively own.
    unsafe {
        let raw = cvt(libc::fcntl(fd.as_raw_fd(), libc::F_DUPFD_CLOEXEC, min))?;
        Ok(OwnedFd::from_raw_fd(raw))
    }
}

/// Checks that `raw` is an open, listening socket without taking ownership of it.
pub(crate) fn ensure_listening_socket(raw: RawFd) -> io::Result<()> {
    // SAFETY: fstat writes into a zeroed, properly sized stat buffer; the
    // descriptor is only queried.
    let mut stat: libc::stat = unsafe { std::mem::zeroed() };
    cvt(unsafe { libc::fstat(raw, &mut stat) })?;
    if stat.st_mode & libc::S_IFMT != libc::S_IFSOCK {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a socket"));
    }

    let mut accepting: libc::c_int = 0;
    let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
    // SAFETY: SO_ACCEPTCONN writes one c_int into `accepting`, `len` holds its size.
    cvt(unsafe {
        libc::getsockopt(
            raw,
            libc::SOL_SOCKET,
            libc::SO_ACCEPTCONN,
            (&mut accepting as *mut libc::c_int).cast(),
            &mut len,
        )
    })?;
    if accepting == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "socket is not listening",
        ));
    }
    Ok(())
}

/// Occupies every free descriptor in `start..start + n` with a close-on-exec
/// duplicate of `template`.
///
/// While the returned descriptors are held, nothing opened by this process
/// (including the pipes `spawn` creates) can land in the range.
pub(crate) fn reserve(
    template: &impl AsRawFd,
    start: RawFd,
    n: usize,
) -> io::Result<Vec<OwnedFd>> {
    let mut held = Vec::with_capacity(n);
    for target in (start..).take(n) {
        let dup = dup_at_least(template, target)?;
        if dup.as_raw_fd() == target {
            held.push(dup);
        }
    }
    Ok(held)
}

/// Moves `sources[i]` onto `start + i`, leaving the targets inheritable.
///
/// Runs between fork and exec: only async-signal-safe calls, no allocation.
/// Every source must already live above the target range.
pub(crate) fn install(sources: &[RawFd], start: RawFd) -> io::Result<()> {
    for (target, &src) in (start..).zip(sources) {
        // SAFETY: dup2 onto a fixed slot; the new descriptor has FD_CLOEXEC cleared.
        cvt(unsafe { libc::dup2(src, target) })?;
    }
    Ok(())
}
