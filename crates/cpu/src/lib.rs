//! CPU node: the protocol master.
//!
//! Owns one [`proto_core::MasterNode`] and drives it from two concurrent
//! execution contexts, mirroring the teacher's GPIO-task/application split:
//! a link-service task per destination that performs the actual SPI
//! transaction, and an application task that enqueues commands and polls
//! VSYNC frame advances. The two communicate only through the queues and
//! event surface owned by `MasterNode` — there is no shared mutable state
//! requiring a lock across an await point.

#![cfg_attr(not(any(test, feature = "std", feature = "sim")), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod link_service;

pub use proto_core::node::{MasterNode, MasterState};

/// Default clock-sync beacon interval, re-exported for node binaries that
/// need it without depending on `proto-core` directly.
pub use proto_core::config::SYNC_INTERVAL_US;
