//! Wire-level framing for the TriBoy inter-MCU protocol.
//!
//! Three microcontrollers (CPU, GPU, APU) exchange length-prefixed packets
//! over two independent point-to-point serial links. This crate owns the
//! framing rules only: the byte layout of a packet, the reserved opcode
//! bands, and the per-destination opcode catalogs preserved for binary
//! compatibility with existing TriBoy assets. It has no notion of links,
//! queues, or state machines — see the `proto-core` crate for those.
//!
//! # Architecture
//!
//! ```text
//! Node application (cpu / gpu / apu)
//!         |
//! proto-core (queue, clock, fault, node state machines)
//!         |
//! protocol (this crate — frame codec + opcode catalogs)
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod frame;
pub mod opcode;

pub use frame::{Packet, PacketError, MAX_PACKET_LEN, MAX_PAYLOAD_LEN};
