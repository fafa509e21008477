//! `Session` — the thread-safe wrapper around the engine handle.
//!
//! The engine is not internally thread-safe, so a single mutex
//! serializes every access to it: submission, readiness query, pump,
//! configuration, teardown. Even read-only queries (descriptor number,
//! event mask, last-error text) count as mutating for locking purposes.
//! No engine reference ever escapes the accessor.
//!
//! The lock is held per access, never for a whole operation — blocking
//! readiness waits happen outside it, so concurrent callers interleave.

use std::sync::Mutex;

use tracing::warn;

use smbsync_core::engine::SmbEngine;

/// Lock-protected engine state.
pub(crate) struct State<E> {
    pub(crate) engine: E,
    pub(crate) connected: bool,
}

/// One SMB session: the engine handle plus its connected flag, behind a
/// single mutex. Cheap to share across threads (`Arc<Session<E>>`).
pub struct Session<E: SmbEngine> {
    inner: Mutex<State<E>>,
}

impl<E: SmbEngine> Session<E> {
    /// Wrap an engine handle. The session starts disconnected.
    pub fn new(engine: E) -> Self {
        Self {
            inner: Mutex::new(State { engine, connected: false }),
        }
    }

    /// Run `body` with exclusive access to the engine state.
    ///
    /// The lock is released on every exit path, including panics in
    /// `body`. A poisoned lock is taken over rather than propagated:
    /// the engine carries no invariant a caller panic can break that
    /// the next operation would not surface as an engine error.
    pub(crate) fn with_handle<R>(&self, body: impl FnOnce(&mut State<E>) -> R) -> R {
        let mut state = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        body(&mut state)
    }

    pub fn is_connected(&self) -> bool {
        self.with_handle(|state| state.connected)
    }

    // ── Pre-connection configuration ──
    //
    // Direct, lock-guarded, non-blocking. Must not race in-flight
    // operations; the lock takes care of that.

    pub fn set_workstation(&self, value: &str) {
        self.with_handle(|state| state.engine.set_workstation(value));
    }

    pub fn set_domain(&self, value: &str) {
        self.with_handle(|state| state.engine.set_domain(value));
    }

    pub fn set_user(&self, value: &str) {
        self.with_handle(|state| state.engine.set_user(value));
    }

    pub fn set_password(&self, value: &str) {
        self.with_handle(|state| state.engine.set_password(value));
    }

    pub fn set_signing_required(&self, required: bool) {
        self.with_handle(|state| state.engine.set_signing_required(required));
    }
}

impl<E: SmbEngine> Drop for Session<E> {
    fn drop(&mut self) {
        // Best-effort: nobody is left to observe a teardown failure.
        if self.is_connected() {
            if let Err(err) = self.disconnect() {
                warn!(error = %err, "disconnect during session teardown failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackEngine;

    #[test]
    fn test_new_session_is_disconnected() {
        let session = Session::new(LoopbackEngine::new().unwrap());
        assert!(!session.is_connected());
    }

    #[test]
    fn test_configure_reaches_engine() {
        let engine = LoopbackEngine::new().unwrap();
        let probe = engine.probe();
        let session = Session::new(engine);

        session.set_workstation("WS01");
        session.set_domain("EXAMPLE");
        session.set_user("alice");
        session.set_password("secret");
        session.set_signing_required(true);

        assert_eq!(probe.configure_calls(), 5);
    }

    #[test]
    fn test_drop_disconnects_when_connected() {
        let engine = LoopbackEngine::new().unwrap();
        let probe = engine.probe();
        {
            let session = Session::new(engine);
            session.connect("server", "data", "alice").unwrap();
        }
        assert_eq!(probe.disconnects(), 1);
    }

    #[test]
    fn test_drop_skips_disconnect_when_not_connected() {
        let engine = LoopbackEngine::new().unwrap();
        let probe = engine.probe();
        drop(Session::new(engine));
        assert_eq!(probe.disconnects(), 0);
    }
}
