//! Readiness bitmask constants.
//!
//! The engine reports which I/O readiness it needs as a `poll(2)`-style
//! bitmask, and `pump` takes the reported readiness back in the same
//! encoding. The values match `POLLIN`/`POLLOUT` so the bridge can hand
//! them to the system poll call without remapping. Raw constants rather
//! than a flags type keep this crate dependency-free.

/// The engine can make progress when the descriptor is readable.
pub const READ: i16 = 0x0001;

/// The engine can make progress when the descriptor is writable.
pub const WRITE: i16 = 0x0004;

/// No readiness required (nothing queued on the wire).
pub const NONE: i16 = 0;
