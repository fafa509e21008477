//! # smbsync — blocking calls over an asynchronous SMB2 engine
//!
//! The engine underneath is callback-driven and single-threaded: submit a
//! request, get control back immediately, pump its descriptor until the
//! completion callback fires. This crate turns that into "call, block,
//! get a result" for any number of application threads:
//!
//! 1. [`Session`] owns the one mutable engine handle behind a mutex;
//!    every engine access, including read-only queries, goes through it.
//! 2. Each call allocates a fresh pending-call record, submits under the
//!    lock, then releases the lock and polls readiness with a 1-second
//!    heartbeat, pumping the engine (under the lock) whenever the
//!    descriptor is ready.
//! 3. The completion callback fires synchronously inside a pump and
//!    fills the record; the wait loop sees it and exits.
//! 4. The final status is translated into the portable error taxonomy
//!    with a per-operation fallback kind.
//!
//! The lock is held per access, never across a blocking wait, so
//! concurrent operations interleave their loop iterations while the
//! engine itself stays fully serialized.
//!
//! [`LoopbackEngine`] is an in-memory engine behind a real pipe, used by
//! the tests and the smoke binary to drive the whole path without a
//! server.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod call;
        mod wait;
        pub mod loopback;
        pub mod ops;
        pub mod session;

        pub use loopback::LoopbackEngine;
        pub use session::Session;
    } else {
        compile_error!("smbsync drives engine progress with poll(2) and requires a unix target");
    }
}

pub use smbsync_core::error::{ErrorKind, Result, SmbError};
pub use smbsync_core::types::{FileStat, FileType, FsStat, ShareInfo, ShareKind};
