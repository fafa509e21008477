//! The readiness-polling loop.
//!
//! No reactor, no extra thread: the calling thread itself asks the
//! engine what readiness it needs, parks in `poll(2)` with a bounded
//! heartbeat, and pumps the engine when the descriptor is ready. The
//! completion callback fires synchronously inside a pump, so once the
//! record reports completion the loop exits.
//!
//! The heartbeat is a liveness wake-up, not a deadline: a timeout just
//! loops again. A readiness-wait failure or pump failure is fatal to
//! the call (not retried) but leaves the handle usable.

use std::os::fd::RawFd;

use tracing::trace;

use smbsync_core::engine::SmbEngine;
use smbsync_core::error::{translate, translate_failure, ErrorKind, Result};
use smbsync_core::pending::PendingCall;

use crate::session::Session;

/// Bounded wait per poll, milliseconds.
const HEARTBEAT_MS: u16 = 1000;

enum Step {
    Done,
    Wait { fd: RawFd, events: i16 },
}

impl<E: SmbEngine> Session<E> {
    /// Drive the engine until `record` completes.
    ///
    /// The completion check happens under the lock: a pump on another
    /// thread may deliver this call's completion, and the lock orders
    /// that write against our read.
    pub(crate) fn wait_for_completion(&self, record: &PendingCall) -> Result<()> {
        loop {
            let step = self.with_handle(|state| {
                if record.completed() {
                    Step::Done
                } else {
                    Step::Wait {
                        fd: state.engine.descriptor(),
                        events: state.engine.which_events(),
                    }
                }
            });
            let (fd, events) = match step {
                Step::Done => return Ok(()),
                Step::Wait { fd, events } => (fd, events),
            };

            let revents = wait_readiness(fd, events)?;
            if revents == 0 {
                // Heartbeat wake-up with nothing to do.
                continue;
            }

            let (rc, detail) = self.with_handle(|state| {
                let rc = state.engine.pump(revents);
                let detail = if rc < 0 { state.engine.last_error() } else { None };
                (rc, detail)
            });
            trace!(revents, status = rc, "pumped engine");
            if let Some(err) = translate(rc, detail.as_deref(), ErrorKind::InvalidArgument) {
                return Err(err);
            }
        }
    }
}

/// Block on system-level readiness for `fd`/`events`, bounded by the
/// heartbeat. Returns the reported readiness mask, 0 on timeout.
fn wait_readiness(fd: RawFd, events: i16) -> Result<i16> {
    use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
    use std::os::fd::BorrowedFd;

    // The engine owns the descriptor and only closes it under the same
    // lock that produced this fd, so it outlives the poll call.
    let borrowed = unsafe { BorrowedFd::borrow_raw(fd) };
    let mut fds = [PollFd::new(borrowed, PollFlags::from_bits_truncate(events))];

    match poll(&mut fds, PollTimeout::from(HEARTBEAT_MS)) {
        // A wait failure (EINTR included) is fatal to the call.
        Err(errno) => Err(translate_failure(-(errno as i32), None, ErrorKind::InvalidArgument)),
        Ok(0) => Ok(0),
        Ok(_) => Ok(fds[0].revents().map(|r| r.bits()).unwrap_or(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // `wait_readiness` against real descriptors; the full loop is
    // exercised through `Session` in `ops::tests`.

    fn pipe_pair() -> (std::os::fd::OwnedFd, std::os::fd::OwnedFd) {
        use std::os::fd::FromRawFd;
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        assert_eq!(rc, 0);
        unsafe {
            (
                std::os::fd::OwnedFd::from_raw_fd(fds[0]),
                std::os::fd::OwnedFd::from_raw_fd(fds[1]),
            )
        }
    }

    #[test]
    fn test_readiness_reported_when_readable() {
        use std::os::fd::AsRawFd;
        let (rd, wr) = pipe_pair();
        let byte = 1u8;
        let rc = unsafe {
            libc::write(wr.as_raw_fd(), &byte as *const u8 as *const core::ffi::c_void, 1)
        };
        assert_eq!(rc, 1);

        let revents = wait_readiness(rd.as_raw_fd(), smbsync_core::events::READ).unwrap();
        assert_ne!(revents & smbsync_core::events::READ, 0);
    }

    #[test]
    fn test_writable_pipe_reports_write_readiness() {
        use std::os::fd::AsRawFd;
        let (_rd, wr) = pipe_pair();
        let revents = wait_readiness(wr.as_raw_fd(), smbsync_core::events::WRITE).unwrap();
        assert_ne!(revents & smbsync_core::events::WRITE, 0);
    }
}
