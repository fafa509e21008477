//! The public operation set.
//!
//! Every operation is synchronous: it submits through the façade, blocks
//! in the polling loop, and returns a value or a translated error. Each
//! one supplies the fallback kind that matches its most likely cause
//! when the engine gives no specific code — a failed connect is a
//! refusal, a failed mkdir an existing entry, a failed rename a missing
//! entry, anything else a broken link.
//!
//! Path arguments take forward or backward slashes; the engine speaks
//! backslash only, so paths are normalized before submission.

use smbsync_core::engine::SmbEngine;
use smbsync_core::error::{decode_error, translate, ErrorKind, Result};
use smbsync_core::pending::complete_call;
use smbsync_core::types::{FileStat, FsStat, ShareInfo};

use crate::session::Session;

/// The engine's path separator is the backslash.
fn normalize_path(path: &str) -> String {
    path.replace('/', "\\")
}

impl<E: SmbEngine> Session<E> {
    /// Validate an `smb://` URL without touching the wire.
    pub fn parse_url(&self, url: &str) -> Result<()> {
        self.with_handle(|state| {
            let rc = state.engine.parse_url(url);
            let detail = if rc < 0 { state.engine.last_error() } else { None };
            match translate(rc, detail.as_deref(), ErrorKind::InvalidArgument) {
                Some(err) => Err(err),
                None => Ok(()),
            }
        })
    }

    /// Connect to `share` on `server` as `user`. The session is
    /// reusable: connect → disconnect → connect works on one handle.
    pub fn connect(&self, server: &str, share: &str, user: &str) -> Result<()> {
        self.perform_blocking(
            ErrorKind::ConnectionRefused,
            |engine, rec| engine.submit_connect(server, share, user, complete_call, rec),
            |_, _| Ok(()),
        )?;
        self.with_handle(|state| state.connected = true);
        Ok(())
    }

    /// Disconnect. Succeeds (and leaves the session disconnected) even
    /// when already disconnected.
    pub fn disconnect(&self) -> Result<()> {
        self.perform_blocking(
            ErrorKind::ConnectionRefused,
            |engine, rec| engine.submit_disconnect(complete_call, rec),
            |_, _| Ok(()),
        )?;
        self.with_handle(|state| state.connected = false);
        Ok(())
    }

    /// Round-trip a protocol echo.
    pub fn echo(&self) -> Result<()> {
        self.perform_blocking(
            ErrorKind::ConnectionRefused,
            |engine, rec| engine.submit_echo(complete_call, rec),
            |_, _| Ok(()),
        )
    }

    /// Enumerate the server's shares.
    pub fn share_enum(&self) -> Result<Vec<ShareInfo>> {
        self.perform_blocking(
            ErrorKind::BrokenLink,
            |engine, rec| engine.submit_share_enum(complete_call, rec),
            |engine, payload| {
                unsafe { engine.read_shares(payload) }
                    .ok_or_else(|| decode_error(ErrorKind::NoSuchEntity))
            },
        )
    }

    pub fn stat(&self, path: &str) -> Result<FileStat> {
        let path = normalize_path(path);
        self.perform_blocking(
            ErrorKind::BrokenLink,
            |engine, rec| engine.submit_stat(&path, complete_call, rec),
            |engine, payload| {
                unsafe { engine.read_stat(payload) }
                    .ok_or_else(|| decode_error(ErrorKind::BrokenLink))
            },
        )
    }

    pub fn statvfs(&self, path: &str) -> Result<FsStat> {
        let path = normalize_path(path);
        self.perform_blocking(
            ErrorKind::BrokenLink,
            |engine, rec| engine.submit_statvfs(&path, complete_call, rec),
            |engine, payload| {
                unsafe { engine.read_statvfs(payload) }
                    .ok_or_else(|| decode_error(ErrorKind::BrokenLink))
            },
        )
    }

    pub fn truncate(&self, path: &str, length: u64) -> Result<()> {
        let path = normalize_path(path);
        self.perform_blocking(
            ErrorKind::BrokenLink,
            |engine, rec| engine.submit_truncate(&path, length, complete_call, rec),
            |_, _| Ok(()),
        )
    }

    pub fn mkdir(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.perform_blocking(
            ErrorKind::FileExists,
            |engine, rec| engine.submit_mkdir(&path, complete_call, rec),
            |_, _| Ok(()),
        )
    }

    pub fn rmdir(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.perform_blocking(
            ErrorKind::BrokenLink,
            |engine, rec| engine.submit_rmdir(&path, complete_call, rec),
            |_, _| Ok(()),
        )
    }

    pub fn unlink(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        self.perform_blocking(
            ErrorKind::BrokenLink,
            |engine, rec| engine.submit_unlink(&path, complete_call, rec),
            |_, _| Ok(()),
        )
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = normalize_path(from);
        let to = normalize_path(to);
        self.perform_blocking(
            ErrorKind::NoSuchFileOrDirectory,
            |engine, rec| engine.submit_rename(&from, &to, complete_call, rec),
            |_, _| Ok(()),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;
    use crate::loopback::LoopbackEngine;
    use smbsync_core::types::{FileType, ShareKind};

    fn connected_session() -> (Session<LoopbackEngine>, Arc<crate::loopback::Probe>) {
        let engine = LoopbackEngine::new().unwrap();
        let probe = engine.probe();
        let session = Session::new(engine);
        session.connect("server", "data", "alice").unwrap();
        (session, probe)
    }

    #[test]
    fn test_echo_roundtrip() {
        let (session, probe) = connected_session();
        session.echo().unwrap();
        // connect + echo, one completion each
        assert_eq!(probe.completions(), 2);
    }

    #[test]
    fn test_echo_before_connect_is_refused() {
        let session = Session::new(LoopbackEngine::new().unwrap());
        let err = session.echo().unwrap_err();
        // ENOTCONN has no direct mapping; the echo fallback applies.
        assert_eq!(err.kind, ErrorKind::ConnectionRefused);
    }

    #[test]
    fn test_connect_disconnect_reconnect() {
        let (session, _probe) = connected_session();
        assert!(session.is_connected());

        session.disconnect().unwrap();
        assert!(!session.is_connected());

        session.connect("server", "data", "alice").unwrap();
        assert!(session.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let session = Session::new(LoopbackEngine::new().unwrap());
        session.disconnect().unwrap();
        session.disconnect().unwrap();
        assert!(!session.is_connected());
    }

    #[test]
    fn test_immediate_rejection_never_enters_wait_loop() {
        let engine = LoopbackEngine::new().unwrap();
        let probe = engine.probe();
        let session = Session::new(engine);

        session.with_handle(|state| state.engine.reject_next_submit(-libc::EIO));
        let err = session.echo().unwrap_err();

        assert_eq!(err.kind, ErrorKind::ConnectionReset);
        assert_eq!(probe.pumps(), 0);
        assert_eq!(probe.completions(), 0);
    }

    #[test]
    fn test_pump_failure_is_fatal_but_session_stays_usable() {
        let (session, probe) = connected_session();

        session.with_handle(|state| state.engine.fail_next_pump(-libc::EIO));
        let err = session.echo().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);

        // The dead request never completed, and the handle still works.
        let before = probe.completions();
        session.echo().unwrap();
        assert_eq!(probe.completions(), before + 1);
    }

    #[test]
    fn test_mkdir_existing_path_is_file_exists() {
        let (session, _probe) = connected_session();
        session.mkdir("/a").unwrap();
        session.mkdir("/a/b").unwrap();

        let err = session.mkdir("/a/b").unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileExists);
    }

    #[test]
    fn test_paths_are_backslash_normalized() {
        let (session, probe) = connected_session();
        session.mkdir("/a").unwrap();
        session.mkdir("/a/b").unwrap();
        assert_eq!(probe.last_path().as_deref(), Some("\\a\\b"));
    }

    #[test]
    fn test_rename_missing_source() {
        let (session, _probe) = connected_session();
        let err = session.rename("/nope", "/else").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSuchFileOrDirectory);
    }

    #[test]
    fn test_rename_moves_a_file() {
        let engine = LoopbackEngine::new().unwrap();
        let session = Session::new(engine);
        session.connect("server", "data", "alice").unwrap();

        session.mkdir("/docs").unwrap();
        session.truncate("/docs/a.txt", 0).unwrap_err(); // no such file yet
        session.with_handle(|state| state.engine.add_file("docs\\a.txt", 7));

        session.rename("/docs/a.txt", "/docs/b.txt").unwrap();
        assert_eq!(session.stat("/docs/b.txt").unwrap().size, 7);
        let err = session.stat("/docs/a.txt").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSuchFileOrDirectory);
    }

    #[test]
    fn test_stat_reports_size_and_type() {
        let (session, _probe) = connected_session();
        session.mkdir("/docs").unwrap();
        session.with_handle(|state| state.engine.add_file("docs\\report.txt", 42));

        let st = session.stat("/docs/report.txt").unwrap();
        assert_eq!(st.file_type, FileType::File);
        assert_eq!(st.size, 42);

        let st = session.stat("/docs").unwrap();
        assert_eq!(st.file_type, FileType::Directory);
    }

    #[test]
    fn test_truncate_changes_stat_size() {
        let (session, _probe) = connected_session();
        session.with_handle(|state| state.engine.add_file("log.bin", 4096));

        session.truncate("/log.bin", 100).unwrap();
        assert_eq!(session.stat("/log.bin").unwrap().size, 100);
    }

    #[test]
    fn test_unlink_and_rmdir() {
        let (session, _probe) = connected_session();
        session.mkdir("/tmp").unwrap();
        session.with_handle(|state| state.engine.add_file("tmp\\x", 1));

        // Non-empty directory: ENOTEMPTY has no direct mapping.
        let err = session.rmdir("/tmp").unwrap_err();
        assert_eq!(err.kind, ErrorKind::BrokenLink);

        session.unlink("/tmp/x").unwrap();
        session.rmdir("/tmp").unwrap();

        let err = session.stat("/tmp").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSuchFileOrDirectory);
    }

    #[test]
    fn test_statvfs_reports_fs_numbers() {
        let (session, _probe) = connected_session();
        let vfs = session.statvfs("/").unwrap();
        assert!(vfs.block_size > 0);
        assert!(vfs.blocks >= vfs.free_blocks);
        assert!(vfs.free_blocks >= vfs.avail_blocks);
    }

    #[test]
    fn test_share_enum_lists_shares() {
        let (session, _probe) = connected_session();
        let shares = session.share_enum().unwrap();

        assert!(shares.iter().any(|s| s.name == "data" && s.kind == ShareKind::DiskTree));
        let ipc = shares.iter().find(|s| s.name == "IPC$").unwrap();
        assert_eq!(ipc.kind, ShareKind::Ipc);
        assert!(ipc.hidden);
    }

    #[test]
    fn test_share_enum_decode_failure_is_no_such_entity() {
        let (session, _probe) = connected_session();
        session.with_handle(|state| state.engine.poison_share_reply());

        let err = session.share_enum().unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSuchEntity);
    }

    #[test]
    fn test_parse_url_mapping_table() {
        let session = Session::new(LoopbackEngine::new().unwrap());

        session.parse_url("smb://server/share").unwrap();

        let err = session.parse_url("nfs://server/share").unwrap_err();
        assert_eq!(err.kind, ErrorKind::ProtocolOption);

        let long = format!("smb://server/{}", "x".repeat(2048));
        let err = session.parse_url(&long).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);

        session.with_handle(|state| state.engine.fail_url_alloc());
        let err = session.parse_url("smb://server/share").unwrap_err();
        assert_eq!(err.kind, ErrorKind::OutOfMemory);
    }

    #[test]
    fn test_stale_url_error_text_cannot_reclassify_later_failures() {
        let session = Session::new(LoopbackEngine::new().unwrap());

        // Leave a recognized literal behind in the engine's last-error.
        let long = format!("smb://server/{}", "x".repeat(2048));
        let err = session.parse_url(&long).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Overflow);

        // An unrelated failure afterwards must classify on its own
        // terms: ENOTCONN has no direct mapping, so the echo fallback
        // applies — not the leftover URL literal.
        let err = session.echo().unwrap_err();
        assert_eq!(err.kind, ErrorKind::ConnectionRefused);

        // And a successful parse clears the literal entirely.
        session.parse_url("smb://server/data").unwrap();
        session.connect("server", "data", "alice").unwrap();
        session.mkdir("/a").unwrap();
        let err = session.mkdir("/a").unwrap_err();
        assert_eq!(err.kind, ErrorKind::FileExists);
    }

    #[test]
    fn test_connect_to_unknown_share_fails() {
        let session = Session::new(LoopbackEngine::new().unwrap());
        let err = session.connect("server", "no-such-share", "alice").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoSuchFileOrDirectory);
        assert!(!session.is_connected());
    }

    #[test]
    fn test_concurrent_echoes_each_complete() {
        let (session, probe) = connected_session();
        let session = Arc::new(session);
        let before = probe.completions();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            handles.push(thread::spawn(move || session.echo()));
        }
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        assert_eq!(probe.completions(), before + 8);
    }

    #[test]
    fn test_concurrent_mixed_operations() {
        let (session, _probe) = connected_session();
        let session = Arc::new(session);

        let mut handles = Vec::new();
        for i in 0..4 {
            let session = Arc::clone(&session);
            handles.push(thread::spawn(move || session.mkdir(&format!("/dir-{}", i))));
        }
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        for i in 0..4 {
            assert_eq!(
                session.stat(&format!("/dir-{}", i)).unwrap().file_type,
                FileType::Directory
            );
        }
    }
}
