//! `LoopbackEngine` — an in-memory engine behind a real pipe.
//!
//! Implements [`SmbEngine`] against an in-process server state (a share
//! list and a path tree) while still exercising the bridge's actual
//! readiness path: every accepted submission queues a precomputed
//! completion and writes one byte into a non-blocking pipe, so the
//! polling loop sees genuine `POLLIN` on a genuine descriptor, and each
//! `pump` drains one byte and fires exactly one callback.
//!
//! Failure injection hooks cover the paths a well-behaved engine never
//! takes: rejecting a submission outright, failing a pump (the queued
//! request dies uncompleted, per the engine contract), poisoning the
//! share reply, and simulating URL allocation failure.

use core::ffi::c_void;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use smbsync_core::engine::SmbEngine;
use smbsync_core::events;
use smbsync_core::pending::CompletionFn;
use smbsync_core::types::{FileStat, FileType, FsStat, ShareInfo, ShareKind};

const MAX_URL_LEN: usize = 1024;

// Fixed timestamps/fs numbers; the loopback has no clock and no disk.
const EPOCH_TIME: u64 = 1_700_000_000;
const BLOCK_SIZE: u32 = 4096;
const TOTAL_BLOCKS: u64 = 1 << 20;
const FREE_BLOCKS: u64 = 1 << 19;
const AVAIL_BLOCKS: u64 = 1 << 18;

/// Observation handle shared with tests: call counters plus the last
/// path the engine saw (for normalization checks).
pub struct Probe {
    submissions: AtomicUsize,
    completions: AtomicUsize,
    pumps: AtomicUsize,
    disconnects: AtomicUsize,
    configure_calls: AtomicUsize,
    last_path: Mutex<Option<String>>,
}

impl Probe {
    fn new() -> Self {
        Self {
            submissions: AtomicUsize::new(0),
            completions: AtomicUsize::new(0),
            pumps: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
            configure_calls: AtomicUsize::new(0),
            last_path: Mutex::new(None),
        }
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn pumps(&self) -> usize {
        self.pumps.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn configure_calls(&self) -> usize {
        self.configure_calls.load(Ordering::SeqCst)
    }

    pub fn last_path(&self) -> Option<String> {
        self.last_path.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn record_path(&self, path: &str) {
        *self.last_path.lock().unwrap_or_else(|p| p.into_inner()) = Some(path.to_owned());
    }
}

#[derive(Clone, Copy)]
enum Node {
    Dir,
    File { size: u64 },
}

enum Reply {
    None,
    Stat(FileStat),
    Vfs(FsStat),
    Shares(Vec<ShareInfo>),
}

struct QueuedOp {
    status: i32,
    reply: Reply,
    cb: CompletionFn,
    user: *mut c_void,
}

pub struct LoopbackEngine {
    rd: OwnedFd,
    wr: OwnedFd,
    queue: VecDeque<QueuedOp>,
    shares: Vec<ShareInfo>,
    // Path tree keyed by backslash paths without the leading separator.
    tree: HashMap<String, Node>,
    connected: bool,
    last_error: Option<String>,

    // Reply slots: "engine-owned memory" the payload pointers refer to.
    stat_slot: FileStat,
    vfs_slot: FsStat,
    share_slot: Vec<ShareInfo>,

    // Failure injection.
    reject_submit: Option<i32>,
    fail_pump: Option<i32>,
    poisoned_shares: bool,
    url_alloc_fails: bool,

    probe: Arc<Probe>,
}

// Queued `user` pointers are only dereferenced inside `pump`, which the
// bridge runs under the session lock while the owning record is alive.
unsafe impl Send for LoopbackEngine {}

impl LoopbackEngine {
    pub fn new() -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        let (rd, wr) = unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) };

        Ok(Self {
            rd,
            wr,
            queue: VecDeque::new(),
            shares: vec![
                ShareInfo { name: "data".into(), kind: ShareKind::DiskTree, hidden: false },
                ShareInfo { name: "backup".into(), kind: ShareKind::DiskTree, hidden: false },
                ShareInfo { name: "IPC$".into(), kind: ShareKind::Ipc, hidden: true },
            ],
            tree: HashMap::new(),
            connected: false,
            last_error: None,
            stat_slot: FileStat {
                file_type: FileType::File,
                size: 0,
                nlink: 0,
                atime: 0,
                mtime: 0,
                ctime: 0,
            },
            vfs_slot: FsStat { block_size: 0, blocks: 0, free_blocks: 0, avail_blocks: 0 },
            share_slot: Vec::new(),
            reject_submit: None,
            fail_pump: None,
            poisoned_shares: false,
            url_alloc_fails: false,
            probe: Arc::new(Probe::new()),
        })
    }

    /// Shared observation handle; clone before the engine moves into a
    /// session.
    pub fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    // ── Seeding and failure injection ──

    pub fn add_dir(&mut self, path: &str) {
        self.tree.insert(key(path), Node::Dir);
    }

    pub fn add_file(&mut self, path: &str, size: u64) {
        self.tree.insert(key(path), Node::File { size });
    }

    /// Reject the next submission with `code` before scheduling it.
    pub fn reject_next_submit(&mut self, code: i32) {
        self.reject_submit = Some(code);
    }

    /// Fail the next pump with `code`; the queued request dies without
    /// completing.
    pub fn fail_next_pump(&mut self, code: i32) {
        self.fail_pump = Some(code);
    }

    /// Make share-enum replies undecodable from now on.
    pub fn poison_share_reply(&mut self) {
        self.poisoned_shares = true;
    }

    /// Make the next `parse_url` fail as an allocation failure.
    pub fn fail_url_alloc(&mut self) {
        self.url_alloc_fails = true;
    }

    // ── Internals ──

    fn enqueue(&mut self, status: i32, reply: Reply, cb: CompletionFn, user: *mut c_void) -> i32 {
        if let Some(code) = self.reject_submit.take() {
            self.last_error = Some("submission rejected".to_owned());
            return code;
        }
        // `last_error` must always describe the most recent failure; a
        // leftover message from an earlier failure would reclassify
        // this one during translation.
        if status < 0 {
            self.last_error = Some(format!("request failed with errno {}", -status));
        } else {
            self.last_error = None;
        }
        self.queue.push_back(QueuedOp { status, reply, cb, user });

        let byte = 1u8;
        let rc = unsafe { libc::write(self.wr.as_raw_fd(), &byte as *const u8 as *const c_void, 1) };
        if rc < 0 {
            self.queue.pop_back();
            return -io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO);
        }
        self.probe.submissions.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn drain_byte(&mut self) {
        let mut byte = 0u8;
        let _ = unsafe { libc::read(self.rd.as_raw_fd(), &mut byte as *mut u8 as *mut c_void, 1) };
    }

    fn stat_of(&self, path: &str) -> Option<FileStat> {
        self.tree.get(&key(path)).map(|node| match node {
            Node::Dir => FileStat {
                file_type: FileType::Directory,
                size: 0,
                nlink: 1,
                atime: EPOCH_TIME,
                mtime: EPOCH_TIME,
                ctime: EPOCH_TIME,
            },
            Node::File { size } => FileStat {
                file_type: FileType::File,
                size: *size,
                nlink: 1,
                atime: EPOCH_TIME,
                mtime: EPOCH_TIME,
                ctime: EPOCH_TIME,
            },
        })
    }

    fn parent_exists(&self, k: &str) -> bool {
        match k.rsplit_once('\\') {
            None => true,
            Some((parent, _)) => matches!(self.tree.get(parent), Some(Node::Dir)),
        }
    }

    fn has_children(&self, k: &str) -> bool {
        let prefix = format!("{}\\", k);
        self.tree.keys().any(|p| p.starts_with(&prefix))
    }

    fn mkdir_status(&mut self, path: &str) -> i32 {
        let k = key(path);
        if self.tree.contains_key(&k) {
            return -libc::EEXIST;
        }
        if !self.parent_exists(&k) {
            return -libc::ENOENT;
        }
        self.tree.insert(k, Node::Dir);
        0
    }

    fn rmdir_status(&mut self, path: &str) -> i32 {
        let k = key(path);
        match self.tree.get(&k) {
            None => -libc::ENOENT,
            Some(Node::File { .. }) => -libc::ENOTDIR,
            Some(Node::Dir) => {
                if self.has_children(&k) {
                    return -libc::ENOTEMPTY;
                }
                self.tree.remove(&k);
                0
            }
        }
    }

    fn unlink_status(&mut self, path: &str) -> i32 {
        let k = key(path);
        match self.tree.get(&k) {
            None => -libc::ENOENT,
            Some(Node::Dir) => -libc::EISDIR,
            Some(Node::File { .. }) => {
                self.tree.remove(&k);
                0
            }
        }
    }

    fn truncate_status(&mut self, path: &str, length: u64) -> i32 {
        let k = key(path);
        match self.tree.get_mut(&k) {
            None => -libc::ENOENT,
            Some(Node::Dir) => -libc::EISDIR,
            Some(Node::File { size }) => {
                *size = length;
                0
            }
        }
    }

    fn rename_status(&mut self, from: &str, to: &str) -> i32 {
        let from_k = key(from);
        let to_k = key(to);
        let node = match self.tree.get(&from_k) {
            None => return -libc::ENOENT,
            Some(node) => *node,
        };
        if !self.parent_exists(&to_k) {
            return -libc::ENOENT;
        }
        self.tree.remove(&from_k);
        // Directories take their subtree with them.
        if matches!(node, Node::Dir) {
            let prefix = format!("{}\\", from_k);
            let moved: Vec<(String, Node)> = self
                .tree
                .iter()
                .filter(|(p, _)| p.starts_with(&prefix))
                .map(|(p, n)| (format!("{}{}", to_k, &p[from_k.len()..]), *n))
                .collect();
            self.tree.retain(|p, _| !p.starts_with(&prefix));
            self.tree.extend(moved);
        }
        self.tree.insert(to_k, node);
        0
    }
}

fn key(path: &str) -> String {
    path.trim_start_matches('\\').to_owned()
}

impl SmbEngine for LoopbackEngine {
    fn descriptor(&self) -> RawFd {
        self.rd.as_raw_fd()
    }

    fn which_events(&self) -> i16 {
        if self.queue.is_empty() {
            events::NONE
        } else {
            events::READ
        }
    }

    fn pump(&mut self, revents: i16) -> i32 {
        self.probe.pumps.fetch_add(1, Ordering::SeqCst);
        if revents & events::READ == 0 {
            return 0;
        }
        self.drain_byte();

        if let Some(code) = self.fail_pump.take() {
            // The in-flight request is dead; it must never complete.
            self.queue.pop_front();
            self.last_error = Some("pump failed".to_owned());
            return code;
        }

        let op = match self.queue.pop_front() {
            Some(op) => op,
            None => return 0,
        };

        let payload: *mut c_void = match op.reply {
            Reply::None => ptr::null_mut(),
            Reply::Stat(stat) => {
                self.stat_slot = stat;
                &mut self.stat_slot as *mut FileStat as *mut c_void
            }
            Reply::Vfs(vfs) => {
                self.vfs_slot = vfs;
                &mut self.vfs_slot as *mut FsStat as *mut c_void
            }
            Reply::Shares(shares) => {
                self.share_slot = shares;
                &mut self.share_slot as *mut Vec<ShareInfo> as *mut c_void
            }
        };

        self.probe.completions.fetch_add(1, Ordering::SeqCst);
        unsafe { (op.cb)(ptr::null_mut(), op.status, payload, op.user) };
        0
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn set_workstation(&mut self, _value: &str) {
        self.probe.configure_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_domain(&mut self, _value: &str) {
        self.probe.configure_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_user(&mut self, _value: &str) {
        self.probe.configure_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_password(&mut self, _value: &str) {
        self.probe.configure_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn set_signing_required(&mut self, _required: bool) {
        self.probe.configure_calls.fetch_add(1, Ordering::SeqCst);
    }

    fn parse_url(&mut self, url: &str) -> i32 {
        if self.url_alloc_fails {
            self.url_alloc_fails = false;
            self.last_error = Some("Failed to allocate smb2_url".to_owned());
            return -libc::ENOMEM;
        }
        if !url.starts_with("smb://") {
            self.last_error = Some("URL does not start with 'smb://'".to_owned());
            return -libc::EINVAL;
        }
        if url.len() > MAX_URL_LEN {
            self.last_error = Some("URL is too long".to_owned());
            return -libc::EINVAL;
        }
        self.last_error = None;
        0
    }

    fn submit_connect(
        &mut self,
        _server: &str,
        share: &str,
        _user: &str,
        cb: CompletionFn,
        user_data: *mut c_void,
    ) -> i32 {
        let status = if self.shares.iter().any(|s| s.name == share) {
            self.connected = true;
            0
        } else {
            -libc::ENOENT
        };
        self.enqueue(status, Reply::None, cb, user_data)
    }

    fn submit_disconnect(&mut self, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        self.connected = false;
        self.enqueue(0, Reply::None, cb, user_data)
    }

    fn submit_echo(&mut self, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        let status = if self.connected { 0 } else { -libc::ENOTCONN };
        self.enqueue(status, Reply::None, cb, user_data)
    }

    fn submit_share_enum(&mut self, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        let shares = self.shares.clone();
        self.enqueue(0, Reply::Shares(shares), cb, user_data)
    }

    fn submit_stat(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        self.probe.record_path(path);
        match self.stat_of(path) {
            Some(stat) => self.enqueue(0, Reply::Stat(stat), cb, user_data),
            None => self.enqueue(-libc::ENOENT, Reply::None, cb, user_data),
        }
    }

    fn submit_statvfs(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        self.probe.record_path(path);
        let vfs = FsStat {
            block_size: BLOCK_SIZE,
            blocks: TOTAL_BLOCKS,
            free_blocks: FREE_BLOCKS,
            avail_blocks: AVAIL_BLOCKS,
        };
        self.enqueue(0, Reply::Vfs(vfs), cb, user_data)
    }

    fn submit_truncate(
        &mut self,
        path: &str,
        length: u64,
        cb: CompletionFn,
        user_data: *mut c_void,
    ) -> i32 {
        self.probe.record_path(path);
        let status = self.truncate_status(path, length);
        self.enqueue(status, Reply::None, cb, user_data)
    }

    fn submit_mkdir(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        self.probe.record_path(path);
        let status = self.mkdir_status(path);
        self.enqueue(status, Reply::None, cb, user_data)
    }

    fn submit_rmdir(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        self.probe.record_path(path);
        let status = self.rmdir_status(path);
        self.enqueue(status, Reply::None, cb, user_data)
    }

    fn submit_unlink(&mut self, path: &str, cb: CompletionFn, user_data: *mut c_void) -> i32 {
        self.probe.record_path(path);
        let status = self.unlink_status(path);
        self.enqueue(status, Reply::None, cb, user_data)
    }

    fn submit_rename(
        &mut self,
        from: &str,
        to: &str,
        cb: CompletionFn,
        user_data: *mut c_void,
    ) -> i32 {
        self.probe.record_path(to);
        let status = self.rename_status(from, to);
        self.enqueue(status, Reply::None, cb, user_data)
    }

    unsafe fn read_stat(&self, payload: *mut c_void) -> Option<FileStat> {
        if payload.is_null() {
            return None;
        }
        Some(*(payload as *const FileStat))
    }

    unsafe fn read_statvfs(&self, payload: *mut c_void) -> Option<FsStat> {
        if payload.is_null() {
            return None;
        }
        Some(*(payload as *const FsStat))
    }

    unsafe fn read_shares(&self, payload: *mut c_void) -> Option<Vec<ShareInfo>> {
        if self.poisoned_shares || payload.is_null() {
            return None;
        }
        Some((*(payload as *const Vec<ShareInfo>)).clone())
    }
}
