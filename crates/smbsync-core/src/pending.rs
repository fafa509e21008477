//! Per-call completion slot and the C-style completion trampoline.
//!
//! The engine stores a raw function pointer plus an opaque context for
//! every scheduled request, so no capturing closure can cross the
//! boundary. Instead each blocking call heap-allocates one
//! [`PendingCall`], hands the engine a non-owning pointer to it, and
//! drops the box itself after the wait loop exits — on every path.
//!
//! # Write discipline
//!
//! Exactly one write happens over a record's lifetime: the trampoline
//! fills `status`/`payload` and flips `completed`, once, from inside a
//! `pump` call. Pumps only ever run under the session lock, and the
//! owning thread reads `completed` under that same lock, so a pump on a
//! *different* thread delivering this call's completion is still
//! properly ordered. `Cell` fields make the shared-reference write in
//! the trampoline sound without pretending the record is `Sync`.

use core::cell::Cell;
use core::ffi::c_void;
use core::ptr;

/// Completion slot for one in-flight operation.
///
/// Created as `status = 0, completed = false, payload = null`. The
/// `payload` points at engine-owned reply memory and is only valid from
/// completion until the caller finishes decoding it; for most operations
/// it stays null.
pub struct PendingCall {
    status: Cell<i32>,
    completed: Cell<bool>,
    payload: Cell<*mut c_void>,
}

impl PendingCall {
    pub fn new() -> Self {
        Self {
            status: Cell::new(0),
            completed: Cell::new(false),
            payload: Cell::new(ptr::null_mut()),
        }
    }

    pub fn completed(&self) -> bool {
        self.completed.get()
    }

    pub fn status(&self) -> i32 {
        self.status.get()
    }

    pub fn payload(&self) -> *mut c_void {
        self.payload.get()
    }

    /// Record the result. Called exactly once, by the trampoline.
    fn finish(&self, status: i32, payload: *mut c_void) {
        self.status.set(status);
        self.payload.set(payload);
        self.completed.set(true);
    }
}

impl Default for PendingCall {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion callback signature every async submit takes.
///
/// `session` is whatever native handle the engine chooses to pass
/// through (may be null); `user` is the opaque context the submitter
/// registered — for this bridge, always a `*mut PendingCall`.
pub type CompletionFn =
    unsafe extern "C" fn(session: *mut c_void, status: i32, payload: *mut c_void, user: *mut c_void);

/// The single stateless trampoline registered with every submission.
///
/// # Safety
///
/// `user` must be the `*mut PendingCall` passed to the matching submit
/// call, and the record must still be alive — guaranteed by the façade,
/// which keeps the box until the wait loop has exited.
pub unsafe extern "C" fn complete_call(
    _session: *mut c_void,
    status: i32,
    payload: *mut c_void,
    user: *mut c_void,
) {
    let record = &*(user as *const PendingCall);
    record.finish(status, payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_record_is_empty() {
        let record = PendingCall::new();
        assert!(!record.completed());
        assert_eq!(record.status(), 0);
        assert!(record.payload().is_null());
    }

    #[test]
    fn test_trampoline_fills_record() {
        let record = Box::new(PendingCall::new());
        let user = &*record as *const PendingCall as *mut c_void;
        let mut reply: u64 = 0xfeed;
        let payload = &mut reply as *mut u64 as *mut c_void;

        unsafe { complete_call(ptr::null_mut(), -17, payload, user) };

        assert!(record.completed());
        assert_eq!(record.status(), -17);
        assert_eq!(record.payload(), payload);
    }

    #[test]
    fn test_success_completion_keeps_zero_status() {
        let record = PendingCall::new();
        let user = &record as *const PendingCall as *mut c_void;

        unsafe { complete_call(ptr::null_mut(), 0, ptr::null_mut(), user) };

        assert!(record.completed());
        assert_eq!(record.status(), 0);
        assert!(record.payload().is_null());
    }
}
