//! Portable error taxonomy and the status translator.
//!
//! The engine reports failures two ways: a negative errno-magnitude status
//! code, and a human-readable last-error string for conditions that have
//! no code (URL parsing, allocation). [`translate`] folds both into one
//! fixed [`ErrorKind`] enumeration. Every call site supplies its own
//! fallback kind, so the same translator serves operations whose "most
//! likely cause" differs (a failed connect is a refusal, a failed mkdir
//! is an existing entry, and so on).
//!
//! `SmbError` values are produced only by [`translate`]; nothing else in
//! the system constructs them ad hoc.

use std::fmt;

/// Fixed, POSIX-flavored error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Handle or URL allocation failure (ENOMEM).
    OutOfMemory,
    /// Malformed URL scheme (ENOPROTOOPT).
    ProtocolOption,
    /// URL exceeds the engine's limit (EOVERFLOW).
    Overflow,
    /// Unrecognized engine error, readiness-wait failure, or pump failure (EINVAL).
    InvalidArgument,
    /// Submission rejected before scheduling (ECONNRESET).
    ConnectionReset,
    /// Connect/disconnect/echo failure with no specific code (ECONNREFUSED).
    ConnectionRefused,
    /// Generic operation failure with no specific code (ENOLINK).
    BrokenLink,
    /// Mkdir failure with no specific code (EEXIST).
    FileExists,
    /// Rename failure with no specific code (ENOENT).
    NoSuchFileOrDirectory,
    /// Share-enumeration reply failed to decode.
    NoSuchEntity,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OutOfMemory => "out of memory",
            Self::ProtocolOption => "protocol option error",
            Self::Overflow => "value overflow",
            Self::InvalidArgument => "invalid argument",
            Self::ConnectionReset => "connection reset",
            Self::ConnectionRefused => "connection refused",
            Self::BrokenLink => "link broken",
            Self::FileExists => "file exists",
            Self::NoSuchFileOrDirectory => "no such file or directory",
            Self::NoSuchEntity => "no such entity",
        };
        f.write_str(name)
    }
}

/// A translated engine failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmbError {
    pub kind: ErrorKind,
    pub message: Option<String>,
}

impl fmt::Display for SmbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{}: {}", self.kind, msg),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for SmbError {}

pub type Result<T> = std::result::Result<T, SmbError>;

// Errno magnitudes the translator recognizes directly. Kept as literals
// (Linux values) so this crate needs no libc; the engine reports the same
// encoding on every platform it supports.
const ENOENT: i32 = 2;
const ENOMEM: i32 = 12;
const EEXIST: i32 = 17;
const EINVAL: i32 = 22;
const ENOLINK: i32 = 67;
const EOVERFLOW: i32 = 75;
const ENOPROTOOPT: i32 = 92;
const ECONNRESET: i32 = 104;
const ECONNREFUSED: i32 = 111;

// Last-error literals the engine emits for conditions without a code.
const MSG_BAD_SCHEME: &str = "URL does not start with 'smb://'";
const MSG_URL_TOO_LONG: &str = "URL is too long";
const MSG_URL_ALLOC: &str = "Failed to allocate smb2_url";

/// Translate an engine status plus optional last-error text.
///
/// Returns `None` when `status` is zero. Otherwise the classification is
/// chosen in order: recognized message literal, recognized errno
/// magnitude, caller-supplied `fallback`. The message, when present, is
/// carried into the error verbatim.
pub fn translate(status: i32, message: Option<&str>, fallback: ErrorKind) -> Option<SmbError> {
    if status == 0 {
        return None;
    }
    Some(translate_failure(status, message, fallback))
}

/// Classify a status already known to be a failure.
///
/// For call sites where zero cannot occur (a readiness wait that
/// returned an errno); same classification order as [`translate`].
pub fn translate_failure(status: i32, message: Option<&str>, fallback: ErrorKind) -> SmbError {
    let kind = match message {
        Some(MSG_BAD_SCHEME) => ErrorKind::ProtocolOption,
        Some(MSG_URL_TOO_LONG) => ErrorKind::Overflow,
        Some(MSG_URL_ALLOC) => ErrorKind::OutOfMemory,
        _ => match -status {
            ENOMEM => ErrorKind::OutOfMemory,
            ENOPROTOOPT => ErrorKind::ProtocolOption,
            EOVERFLOW => ErrorKind::Overflow,
            EINVAL => ErrorKind::InvalidArgument,
            ECONNRESET => ErrorKind::ConnectionReset,
            ECONNREFUSED => ErrorKind::ConnectionRefused,
            ENOLINK => ErrorKind::BrokenLink,
            EEXIST => ErrorKind::FileExists,
            ENOENT => ErrorKind::NoSuchFileOrDirectory,
            _ => fallback,
        },
    };

    SmbError { kind, message: message.map(str::to_owned) }
}

/// Error for a reply that completed successfully but could not be
/// decoded. No engine status exists for this condition, so it gets its
/// own producer here rather than a fake status through [`translate`].
pub fn decode_error(kind: ErrorKind) -> SmbError {
    SmbError { kind, message: Some("reply could not be decoded".to_owned()) }
}
