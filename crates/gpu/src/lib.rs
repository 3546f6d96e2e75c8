//! GPU node: a protocol slave with rendering-opcode dispatch.
//!
//! Graphics rendering itself (tile/sprite/layer compositing) is out of
//! scope here — [`GpuCommandHandler`] only validates opcode/payload shape
//! and tracks just enough state (display mode, VBLANK callback flag) to
//! answer commands correctly and to know when to emit an in-band VSYNC
//! packet.

#![cfg_attr(not(any(test, feature = "std", feature = "sim")), no_std)]
#![warn(missing_docs)]

pub mod config;
pub mod handler;
pub mod slave_service;

pub use handler::GpuCommandHandler;
