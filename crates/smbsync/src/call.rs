//! The synchronous operation façade.
//!
//! `perform_blocking` is the one path every operation takes: allocate a
//! pending-call record, submit under the lock, wait for completion by
//! pumping the engine, translate the final status, decode the reply.
//! The record is owned by this stack frame and dropped on every exit
//! path; the engine only ever holds a non-owning pointer to it.

use core::ffi::c_void;

use tracing::debug;

use smbsync_core::engine::SmbEngine;
use smbsync_core::error::{translate, ErrorKind, Result};
use smbsync_core::pending::PendingCall;

use crate::session::Session;

impl<E: SmbEngine> Session<E> {
    /// Run one engine operation to completion.
    ///
    /// `submit` must invoke exactly one async submit, registering the
    /// completion trampoline with `user` as its context, and return the
    /// engine's *submission* status. A non-zero submission status means
    /// the engine rejected the request before scheduling it; that is
    /// translated with fallback [`ErrorKind::ConnectionReset`] and the
    /// wait loop is never entered. Otherwise the loop runs until the
    /// callback fires, the final status is translated with the caller's
    /// `fallback`, and on success `finish` decodes the reply payload —
    /// still under the lock, while the engine-owned memory is valid.
    pub(crate) fn perform_blocking<T>(
        &self,
        fallback: ErrorKind,
        submit: impl FnOnce(&mut E, *mut c_void) -> i32,
        finish: impl FnOnce(&E, *mut c_void) -> Result<T>,
    ) -> Result<T> {
        let record = Box::new(PendingCall::new());
        let user = &*record as *const PendingCall as *mut c_void;

        let (rc, detail) = self.with_handle(|state| {
            let rc = submit(&mut state.engine, user);
            let detail = if rc < 0 { state.engine.last_error() } else { None };
            (rc, detail)
        });
        if let Some(err) = translate(rc, detail.as_deref(), ErrorKind::ConnectionReset) {
            debug!(status = rc, error = %err, "submission rejected");
            return Err(err);
        }

        // Record stays boxed (stable address) until this returns; the
        // engine's pointer to it dies with the wait loop on every path.
        self.wait_for_completion(&record)?;

        self.with_handle(|state| {
            let status = record.status();
            let detail = if status < 0 { state.engine.last_error() } else { None };
            if let Some(err) = translate(status, detail.as_deref(), fallback) {
                debug!(status, error = %err, "operation failed");
                return Err(err);
            }
            finish(&state.engine, record.payload())
        })
    }
}
