//! # smbsync-core — Trait definitions for smbsync
//!
//! This crate defines the boundary between the blocking bridge and the
//! asynchronous SMB2 engine it drives. The engine is a black box: it
//! schedules requests, returns immediately, and later delivers a result
//! through a C-style completion callback invoked from inside a `pump`
//! call while the caller polls its descriptor for readiness.
//!
//! Everything the bridge needs to know about an engine lives here:
//!
//! - [`engine::SmbEngine`] — the engine surface (descriptor, event mask,
//!   pump, async submits, last-error text)
//! - [`pending::PendingCall`] — the per-call completion slot
//! - [`error`] — the portable error taxonomy and the single translator
//! - [`events`] — readiness bitmask constants
//! - [`types`] — owned result payload shapes
//!
//! The bridge implementation (`smbsync`) depends only on these traits,
//! never on a concrete engine.

pub mod engine;
pub mod error;
pub mod events;
pub mod pending;
pub mod types;
