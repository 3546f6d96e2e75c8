//! Protocol-core: the stateful half of the TriBoy inter-MCU link.
//!
//! [`protocol`] defines the wire format (framing, opcodes) with no state.
//! This crate builds the stateful pieces on top of it: the retrying
//! command [`queue`], the [`link`] transaction traits, the [`clock`] sync
//! service, the response [`router`], the [`fault`] manager, the VSYNC
//! [`event`] surface, and the [`node`] state machines that tie all of the
//! above together into a master (CPU) or slave (GPU/APU) role.
//!
//! Node binaries (`cpu`, `gpu`, `apu`) depend on this crate and supply the
//! concrete [`link::MasterLink`]/[`link::SlaveLink`] implementations and,
//! for slaves, a [`node::CommandHandler`].

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod event;
pub mod fault;
pub mod link;
pub mod node;
pub mod queue;
pub mod router;

pub use clock::{ClockError, MasterClock, SlaveClock};
pub use event::{FrameAdvance, VsyncSurface};
pub use fault::{Destination, ErrorKind, FaultManager, LinkHealth};
pub use link::{LinkError, MasterLink, SlaveLink};
pub use node::{CommandHandler, HandlerOutcome, MasterNode, MasterState, SlaveNode, SlaveState};
pub use queue::{CommandQueue, DrainResult, QueueError, QueuedCommand};
pub use router::{route, RouteOutcome};
