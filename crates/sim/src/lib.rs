//! Desktop-only simulation harness: an in-process duplex transport plus the
//! glue to run a full `MasterNode` against `SlaveNode`s wired to the real
//! `gpu`/`apu` command handlers, without any hardware.
//!
//! This crate never builds for a `no_std` target; it exists purely so the
//! protocol stack can be exercised end to end in `tests/scenarios.rs`.

pub mod link;

pub use link::{DuplexLink, MasterEnd, SlaveEnd};
