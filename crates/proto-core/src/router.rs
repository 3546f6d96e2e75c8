//! Response router (spec §3, §4.5, §4.6, §9).
//!
//! The router's only job is to take an inbound response packet and tell the
//! command queue it is settled — it never reaches into a node's state
//! machine or fault manager directly. `route()` is a free function over
//! `&mut CommandQueue` and, for the GPU link, `&mut VsyncSurface`; callers
//! (`proto_core::node::MasterNode`) apply whatever side effects the
//! [`RouteOutcome`] implies.

use protocol::opcode::control;
use protocol::Packet;

use crate::fault::ErrorKind;
use crate::queue::CommandQueue;
use crate::event::VsyncSurface;


/// What the router decided to do with an inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// The response was a positive ACK for `opcode`; the queue head was
    /// completed.
    Acked {
        /// The acknowledged opcode.
        opcode: u8,
    },
    /// The response was an ERROR for `opcode`; the queue head was
    /// completed. The caller decides retry/fault policy from `kind`.
    Errored {
        /// The opcode the error concerns.
        opcode: u8,
        /// The reported error kind.
        kind: ErrorKind,
    },
    /// An in-band VSYNC packet was routed to the event surface.
    Vsync {
        /// The frame counter carried by the packet.
        frame_counter: u32,
    },
    /// A control packet arrived whose payload did not match its opcode's
    /// expected shape.
    Malformed,
    /// A packet arrived that the router has no routing rule for (e.g. an
    /// opcode outside the protocol-control band received unsolicited).
    Unexpected,
}

/// Route one inbound packet against `queue` (and, for VSYNC, `vsync`).
///
/// `vsync` is `None` on links that never see in-band VSYNC (e.g. the APU
/// link).
pub fn route<const N: usize>(
    packet: &Packet,
    now_us: u64,
    queue: &mut CommandQueue<N>,
    vsync: Option<&mut VsyncSurface>,
) -> RouteOutcome {
    match packet.opcode() {
        control::ACK => route_ack(packet, queue),
        control::ERROR => route_error(packet, queue),
        control::VSYNC => route_vsync(packet, now_us, vsync),
        _ => RouteOutcome::Unexpected,
    }
}

fn route_ack<const N: usize>(packet: &Packet, queue: &mut CommandQueue<N>) -> RouteOutcome {
    let Some(&opcode) = packet.payload().first() else {
        return RouteOutcome::Malformed;
    };
    queue.complete(opcode);
    RouteOutcome::Acked { opcode }
}

fn route_error<const N: usize>(packet: &Packet, queue: &mut CommandQueue<N>) -> RouteOutcome {
    let payload = packet.payload();
    let (Some(&opcode), Some(&kind_byte)) = (payload.first(), payload.get(1)) else {
        return RouteOutcome::Malformed;
    };
    let Some(kind) = ErrorKind::from_wire(kind_byte) else {
        return RouteOutcome::Malformed;
    };
    // Retryable kinds (busy, timeout) stay queued for the retry policy; only
    // an unrecoverable per-command error retires the entry here (§7).
    if !kind.is_retryable() {
        queue.complete(opcode);
    }
    RouteOutcome::Errored { opcode, kind }
}

fn route_vsync(packet: &Packet, now_us: u64, vsync: Option<&mut VsyncSurface>) -> RouteOutcome {
    let payload = packet.payload();
    if payload.len() != 4 {
        return RouteOutcome::Malformed;
    }
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(payload);
    let frame_counter = u32::from_be_bytes(bytes);
    if let Some(surface) = vsync {
        surface.on_inband(frame_counter, now_us);
    }
    RouteOutcome::Vsync { frame_counter }
}
