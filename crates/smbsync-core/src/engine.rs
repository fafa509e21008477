//! The engine boundary.
//!
//! An `SmbEngine` is the asynchronous protocol session the bridge
//! drives: it owns the connection, the wire state machine, and the
//! authentication mechanics. The bridge never looks inside — it submits
//! requests, polls the engine's descriptor for the readiness the engine
//! asks for, and pumps until the completion callback fires.
//!
//! # Implementors
//!
//! - An FFI binding over a C SMB2 client library, where `descriptor`,
//!   `which_events` and `pump` map 1:1 onto the library's event-loop
//!   helpers and the submit family wraps its `*_async` functions.
//! - `LoopbackEngine` (in the `smbsync` crate): an in-memory server
//!   state behind a real pipe, used by tests and the smoke binary.
//!
//! # Contract
//!
//! - The engine is NOT internally thread-safe. Every method here is
//!   called with exclusive access (the bridge serializes behind one
//!   lock), including the read-only queries.
//! - A submit returning 0 means the request is scheduled and its
//!   callback will be invoked exactly once, synchronously from inside a
//!   later `pump` call. A negative return means the request was rejected
//!   and the callback will never run.
//! - If `pump` returns an error, the operation that was in flight is
//!   dead: the engine must NOT invoke its callback afterwards. The
//!   bridge frees the pending record as soon as its wait loop exits.
//! - `last_error` reports human-readable detail for the most recent
//!   failure, when the engine has any.

use core::ffi::c_void;
use std::os::fd::RawFd;

use crate::pending::CompletionFn;
use crate::types::{FileStat, FsStat, ShareInfo};

pub trait SmbEngine {
    // ── Event-loop surface ──

    /// Descriptor to poll for readiness.
    fn descriptor(&self) -> RawFd;

    /// Which readiness the engine currently needs (see [`crate::events`]).
    fn which_events(&self) -> i16;

    /// Process pending I/O given the reported readiness. May invoke any
    /// number of completion callbacks before returning. 0 on success,
    /// negative errno magnitude on failure.
    fn pump(&mut self, revents: i16) -> i32;

    /// Human-readable detail for the most recent failure, if any.
    fn last_error(&self) -> Option<String>;

    // ── Pre-connection configuration ──

    fn set_workstation(&mut self, value: &str);
    fn set_domain(&mut self, value: &str);
    fn set_user(&mut self, value: &str);
    fn set_password(&mut self, value: &str);
    fn set_signing_required(&mut self, required: bool);

    /// Validate an `smb://` URL. 0 on success, negative on failure with
    /// detail in `last_error`.
    fn parse_url(&mut self, url: &str) -> i32;

    // ── Async submit family ──
    //
    // Each schedules one request and registers `cb`/`user` for its
    // completion. Path arguments use backslash separators; the bridge
    // normalizes before calling.

    fn submit_connect(
        &mut self,
        server: &str,
        share: &str,
        user: &str,
        cb: CompletionFn,
        user_data: *mut c_void,
    ) -> i32;

    fn submit_disconnect(&mut self, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_echo(&mut self, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_share_enum(&mut self, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_stat(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_statvfs(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_truncate(
        &mut self,
        path: &str,
        length: u64,
        cb: CompletionFn,
        user_data: *mut c_void,
    ) -> i32;

    fn submit_mkdir(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_rmdir(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_unlink(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32;

    fn submit_rename(
        &mut self,
        from: &str,
        to: &str,
        cb: CompletionFn,
        user_data: *mut c_void,
    ) -> i32;

    // ── Reply decoding ──
    //
    // Payload pointers come from a completion callback and reference
    // engine-owned memory. The bridge calls these while still holding
    // the lock, before the reply can be overwritten by a later request.

    /// # Safety
    /// `payload` must be the pointer a stat completion delivered, still valid.
    unsafe fn read_stat(&self, payload: *mut c_void) -> Option<FileStat>;

    /// # Safety
    /// `payload` must be the pointer a statvfs completion delivered, still valid.
    unsafe fn read_statvfs(&self, payload: *mut c_void) -> Option<FsStat>;

    /// # Safety
    /// `payload` must be the pointer a share-enum completion delivered, still valid.
    unsafe fn read_shares(&self, payload: *mut c_void) -> Option<Vec<ShareInfo>>;
}
