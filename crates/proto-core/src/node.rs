//! Node state machines (spec §3, §5).
//!
//! The master (CPU) and slave (GPU/APU) sides have different shapes:
//! the master cycles continuously between syncing its clocks, draining
//! queues, and servicing responses, so it is modeled as a runtime enum
//! state machine (transitions can revisit earlier states, e.g.
//! `Operational` -> `Degraded` -> `Operational`). A slave's lifecycle is
//! linear from boot to steady-state command service, so it is modeled as
//! a [`SlaveState`] enum too, but application code never rewinds it.

use heapless::Vec;
use protocol::Packet;

use crate::clock::{ClockError, MasterClock, SlaveClock};
use crate::config::{BUSY_BACKOFF_US, DEFAULT_QUEUE_CAPACITY};
use crate::fault::{Destination, ErrorKind, FaultManager, LinkHealth};
use crate::queue::{CommandQueue, DrainResult, QueueError};
use crate::router::{self, RouteOutcome};
use crate::event::{FrameAdvance, VsyncSurface};

#[cfg(test)]
mod tests {
    use super::*;
    use protocol::opcode::control;

    fn ack(opcode: u8) -> Packet {
        Packet::new(control::ACK, &[opcode, 0x00]).expect("ack always fits")
    }

    fn error(opcode: u8, kind: ErrorKind) -> Packet {
        Packet::new(control::ERROR, &[opcode, kind.to_wire()]).expect("error always fits")
    }

    #[test]
    fn master_starts_booting_and_advances_through_sync_to_operational() {
        let mut node: MasterNode = MasterNode::new(0);
        assert_eq!(node.state(), MasterState::Booting);

        node.begin_clock_sync();
        assert_eq!(node.state(), MasterState::SyncingClocks);

        node.mark_synced();
        assert_eq!(node.state(), MasterState::Operational);
    }

    #[test]
    fn enqueue_and_drain_gpu_destination() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();

        node.enqueue(Destination::Gpu, Packet::new(0x21, &[]).expect("fits"), true).expect("room");
        match node.drain(Destination::Gpu, 0) {
            DrainResult::Send(cmd) => assert_eq!(cmd.packet.opcode(), 0x21),
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn on_response_completes_queue_and_does_not_degrade_on_ack() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();
        node.enqueue(Destination::Gpu, Packet::new(0x21, &[]).expect("fits"), true).expect("room");
        let _ = node.drain(Destination::Gpu, 0);

        let outcome = node.on_response(Destination::Gpu, &ack(0x21), 0);
        assert_eq!(outcome, RouteOutcome::Acked { opcode: 0x21 });
        assert_eq!(node.state(), MasterState::Operational);
    }

    #[test]
    fn unrecoverable_error_completes_the_command_without_degrading_the_node() {
        // §7: a single invalid-command/invalid-params error is surfaced to
        // the enqueuing context as a completed-with-error event, not a whole
        // link/node degrade. Only retry-budget exhaustion or repeated
        // health-check ping failures degrade a destination.
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();
        node.enqueue(Destination::Apu, Packet::new(0x10, &[]).expect("fits"), true).expect("room");
        let _ = node.drain(Destination::Apu, 0);

        let outcome = node.on_response(Destination::Apu, &error(0x10, ErrorKind::InvalidParams), 0);

        assert_eq!(outcome, RouteOutcome::Errored { opcode: 0x10, kind: ErrorKind::InvalidParams });
        assert_eq!(node.state(), MasterState::Operational);
        assert!(node.health(Destination::Apu).is_healthy());
    }

    #[test]
    fn busy_error_defers_the_head_instead_of_completing_it() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();
        node.enqueue(Destination::Gpu, Packet::new(0x30, &[]).expect("fits"), true).expect("room");
        let _ = node.drain(Destination::Gpu, 60_000);

        let _ = node.on_response(Destination::Gpu, &error(0x30, ErrorKind::Busy), 60_000);

        // Still queued: a busy response holds the command, it does not retire it.
        match node.drain(Destination::Gpu, 60_000 + BUSY_BACKOFF_US - 1) {
            DrainResult::AwaitingResponse => {}
            other => panic!("expected the backoff to still be in effect, got {other:?}"),
        }
    }

    #[test]
    fn memory_exhausted_error_enqueues_a_priority_cleanup_command() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();
        node.enqueue(Destination::Gpu, Packet::new(0x30, &[]).expect("fits"), true).expect("room");
        node.enqueue(Destination::Gpu, Packet::new(0x31, &[]).expect("fits"), true).expect("room");
        let _ = node.drain(Destination::Gpu, 0);

        let _ = node.on_response(Destination::Gpu, &error(0x30, ErrorKind::MemoryExhausted), 0);

        match node.drain(Destination::Gpu, 0) {
            DrainResult::Send(cmd) => assert_eq!(cmd.packet.opcode(), protocol::opcode::control::RESET),
            other => panic!("expected the cleanup command to jump the queue, got {other:?}"),
        }
    }

    #[test]
    fn sync_lost_error_forces_an_immediate_beacon() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();
        node.enqueue(Destination::Apu, Packet::new(0x10, &[]).expect("fits"), true).expect("room");
        let _ = node.drain(Destination::Apu, 0);

        assert!(!node.take_forced_sync());
        let _ = node.on_response(Destination::Apu, &error(0x10, ErrorKind::SyncLost), 0);
        assert!(node.take_forced_sync());
        // Consumed: asking again before another sync-lost report is a no-op.
        assert!(!node.take_forced_sync());
    }

    #[test]
    fn command_exhaustion_degrades_the_destination_immediately() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();

        node.on_command_exhausted(Destination::Gpu, 0);

        assert_eq!(node.state(), MasterState::Degraded { destination: Destination::Gpu });
        assert!(!node.health(Destination::Gpu).is_healthy());
    }

    #[test]
    fn a_second_independent_exhaustion_escalates_to_halted() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();

        node.on_command_exhausted(Destination::Gpu, 0);
        assert_eq!(node.state(), MasterState::Degraded { destination: Destination::Gpu });

        node.on_command_exhausted(Destination::Apu, 0);
        assert_eq!(node.state(), MasterState::Halted);
    }

    #[test]
    fn repeated_ping_failures_degrade_then_a_second_link_halts() {
        let mut node: MasterNode = MasterNode::new(0);
        node.begin_clock_sync();
        node.mark_synced();

        for i in 0..crate::config::HEALTH_CHECK_FAILURE_THRESHOLD {
            node.on_ping_failure(Destination::Gpu, u64::from(i));
        }
        assert_eq!(node.state(), MasterState::Degraded { destination: Destination::Gpu });

        for i in 0..crate::config::HEALTH_CHECK_FAILURE_THRESHOLD {
            node.on_ping_failure(Destination::Apu, u64::from(i));
        }
        assert_eq!(node.state(), MasterState::Halted);
    }

    #[test]
    fn slave_boots_then_synced_then_serving() {
        let mut slave = SlaveNode::new();
        assert_eq!(slave.state(), SlaveState::Booting);

        slave.on_beacon(&MasterClock::new(0).beacon().payload().to_vec(), 0).expect("beacon applies");
        assert_eq!(slave.state(), SlaveState::Serving);
    }

    #[test]
    fn slave_handles_reset_before_any_beacon_without_panicking() {
        let mut slave = SlaveNode::new();
        // A reset command may legitimately arrive before the first beacon;
        // the slave must still be able to answer it.
        let outcome = slave.handle_inbound(protocol::opcode::control::RESET, &[], 0);
        assert!(matches!(outcome, HandlerOutcome::Ack));
    }

    struct RecordingHandler {
        reset_seen: bool,
    }

    impl CommandHandler for RecordingHandler {
        fn handle(&mut self, opcode: u8, _payload: &[u8], _now_us: u64) -> HandlerOutcome {
            if opcode == protocol::opcode::control::RESET {
                self.reset_seen = true;
            }
            HandlerOutcome::Ack
        }
    }

    #[test]
    fn reset_is_dispatched_to_the_application_handler_not_intercepted() {
        // §4.5 cancellation contract: the handler must reinitialize its own
        // state before the node sends the ACK, so RESET must reach it.
        let mut slave = SlaveNode::new();
        let mut handler = RecordingHandler { reset_seen: false };
        let response =
            slave.respond_to(&mut handler, &Packet::new(protocol::opcode::control::RESET, &[]).expect("fits"), 0);
        assert!(handler.reset_seen);
        assert_eq!(response.opcode(), protocol::opcode::control::ACK);
    }
}

/// Master-side (CPU) runtime state (spec §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MasterState {
    /// Node has just started; links are not yet initialized.
    Booting,
    /// Clock-sync beacons are being sent but no command traffic has begun.
    SyncingClocks,
    /// Normal operation: queues are drained, responses are routed.
    Operational,
    /// One destination has failed health checks or exhausted a command's
    /// retry budget. Per §7, application tick progression halts entirely
    /// while this destination recovers in the background — the other
    /// destination's queue does not keep making new frame-tied progress
    /// either, even though its own link is otherwise healthy.
    Degraded {
        /// Which destination is degraded.
        destination: Destination,
    },
    /// Both destinations have independently failed (spec §4.4 "any ->
    /// halted on unrecoverable fault"). Terminal short of a physical reset.
    Halted,
}

/// Slave-side (GPU/APU) runtime state (spec §5). Linear: a slave never
/// returns to `Booting` without a physical reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveState {
    /// Node has just started; clock is not yet synced.
    Booting,
    /// At least one clock-sync beacon has been applied; ready to serve
    /// commands.
    Serving,
}

/// The master-side command/response/clock orchestrator.
///
/// `N` is the per-destination queue capacity; defaults to
/// [`crate::config::DEFAULT_QUEUE_CAPACITY`].
pub struct MasterNode<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    state: MasterState,
    clock: MasterClock,
    gpu_queue: CommandQueue<N>,
    apu_queue: CommandQueue<N>,
    faults: FaultManager,
    vsync: VsyncSurface,
    force_beacon: bool,
}

impl<const N: usize> MasterNode<N> {
    /// Create a new master node, booting, with its clock seeded at `now_us`.
    #[must_use]
    pub const fn new(now_us: u64) -> Self {
        Self {
            state: MasterState::Booting,
            clock: MasterClock::new(now_us),
            gpu_queue: CommandQueue::new(),
            apu_queue: CommandQueue::new(),
            faults: FaultManager::new(),
            vsync: VsyncSurface::new(),
            force_beacon: false,
        }
    }

    /// Current master state.
    #[must_use]
    pub const fn state(&self) -> MasterState {
        self.state
    }

    /// Begin clock-sync beaconing (`Booting` -> `SyncingClocks`).
    pub fn begin_clock_sync(&mut self) {
        self.state = MasterState::SyncingClocks;
    }

    /// Mark the clock as synced and begin normal operation
    /// (`SyncingClocks` -> `Operational`).
    pub fn mark_synced(&mut self) {
        self.state = MasterState::Operational;
    }

    /// The master's own clock, for beacon generation and frame advance.
    pub fn clock_mut(&mut self) -> &mut MasterClock {
        &mut self.clock
    }

    /// Current health of `destination`.
    #[must_use]
    pub const fn health(&self, destination: Destination) -> LinkHealth {
        self.faults.health(destination)
    }

    fn queue_mut(&mut self, destination: Destination) -> &mut CommandQueue<N> {
        match destination {
            Destination::Gpu => &mut self.gpu_queue,
            Destination::Apu => &mut self.apu_queue,
        }
    }

    /// Queue a command for `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if that destination's ring is at
    /// capacity.
    pub fn enqueue(&mut self, destination: Destination, packet: Packet, requires_ack: bool) -> Result<(), QueueError> {
        self.queue_mut(destination).enqueue(packet, requires_ack)
    }

    /// Queue a command at the head of `destination`'s queue, ahead of
    /// anything already waiting (used by application code for its own
    /// priority commands; the memory-exhausted policy uses this
    /// internally via [`Self::on_response`]).
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if that destination's ring is at
    /// capacity.
    pub fn enqueue_priority(&mut self, destination: Destination, packet: Packet, requires_ack: bool) -> Result<(), QueueError> {
        self.queue_mut(destination).enqueue_priority(packet, requires_ack)
    }

    /// Advance `destination`'s queue head for the current tick.
    pub fn drain(&mut self, destination: Destination, now_us: u64) -> DrainResult {
        self.queue_mut(destination).drain_one(now_us)
    }

    /// Route an inbound response from `destination`, applying the §4.8
    /// per-kind error policy: busy holds the head for a short backoff,
    /// memory-exhausted jumps a cleanup command to the queue head,
    /// sync-lost requests an immediate beacon. A single unrecoverable
    /// error never degrades the destination by itself (§7) — that only
    /// happens via [`Self::on_command_exhausted`] or
    /// [`Self::on_ping_failure`].
    pub fn on_response(&mut self, destination: Destination, packet: &Packet, now_us: u64) -> RouteOutcome {
        let outcome = match destination {
            Destination::Gpu => router::route(packet, now_us, &mut self.gpu_queue, Some(&mut self.vsync)),
            Destination::Apu => router::route(packet, now_us, &mut self.apu_queue, None),
        };

        if let RouteOutcome::Errored { opcode, kind } = outcome {
            self.faults.record(destination, kind, now_us);
            match kind {
                ErrorKind::Busy => {
                    self.queue_mut(destination).defer_head(opcode, now_us, BUSY_BACKOFF_US);
                }
                ErrorKind::MemoryExhausted => {
                    let _ = self.queue_mut(destination).enqueue_priority(cleanup_command(), true);
                }
                ErrorKind::SyncLost => {
                    self.force_beacon = true;
                }
                ErrorKind::Timeout
                | ErrorKind::InvalidCommand
                | ErrorKind::InvalidParams
                | ErrorKind::CommunicationFailure
                | ErrorKind::None => {}
            }
        }

        outcome
    }

    /// Record that a queued command exhausted its retries without ever
    /// receiving a response. There is no response packet to route, so the
    /// fault manager is updated directly; this always degrades
    /// `destination` (spec scenario "retry exhaustion"), escalating to
    /// `Halted` if the other destination is already degraded.
    pub fn on_command_exhausted(&mut self, destination: Destination, now_us: u64) {
        self.faults.record_exhaustion(destination, now_us);
        self.degrade_or_halt(destination);
    }

    /// Record a failed health-check ping; may degrade (or halt)
    /// `destination` once [`crate::config::HEALTH_CHECK_FAILURE_THRESHOLD`]
    /// consecutive failures accumulate.
    pub fn on_ping_failure(&mut self, destination: Destination, now_us: u64) {
        self.faults.record_ping_failure(destination, now_us);
        if !self.faults.health(destination).is_healthy() {
            self.degrade_or_halt(destination);
        }
    }

    /// Record a successful health-check ping.
    pub fn on_ping_success(&mut self, destination: Destination, now_us: u64) {
        self.faults.record_ping_success(destination, now_us);
    }

    /// Record a master-observed link-layer failure (communication-failure,
    /// §4.8) — the link driver itself signaled a fault, not a slave ERROR
    /// response. Only logs to the recent-error ring; the caller's link
    /// reset sequence reports the eventual health-check ping outcome via
    /// [`Self::on_ping_failure`]/[`Self::on_ping_success`].
    pub fn on_link_fault(&mut self, destination: Destination, now_us: u64) {
        self.faults.record(destination, ErrorKind::CommunicationFailure, now_us);
    }

    fn degrade_or_halt(&mut self, destination: Destination) {
        let other_already_degraded =
            matches!(self.state, MasterState::Degraded { destination: other } if other == destination.other());
        self.state =
            if other_already_degraded { MasterState::Halted } else { MasterState::Degraded { destination } };
    }

    /// Clear a `Degraded` state back to `Operational` once the operator or
    /// a higher-level policy decides the destination has recovered. No-op
    /// if not currently `Operational`-eligible for this destination.
    pub fn clear_degraded(&mut self, destination: Destination) {
        if self.state == (MasterState::Degraded { destination }) {
            self.state = MasterState::Operational;
        }
    }

    /// Take the next deduplicated VSYNC frame-advance notification, if any.
    pub fn take_frame_advance(&mut self) -> Option<FrameAdvance> {
        self.vsync.take_frame_advance()
    }

    /// Report a VSYNC edge observed on the GPU's dedicated pin.
    pub fn on_vsync_edge(&mut self, at_us: u64) {
        self.vsync.on_edge(at_us);
    }

    /// Take (and clear) the forced-beacon request set by a `sync-lost`
    /// error, so the application task can send an out-of-cycle beacon
    /// instead of waiting for the next periodic sync interval.
    pub fn take_forced_sync(&mut self) -> bool {
        core::mem::replace(&mut self.force_beacon, false)
    }
}

/// The protocol-control "cleanup" command enqueued ahead of everything else
/// on a memory-exhausted error (§4.8). Neither the GPU nor the APU opcode
/// catalog defines a dedicated cleanup opcode; `RESET` already reinitializes
/// a destination's subsystem state, so it is reused here rather than adding
/// a new opcode with identical semantics.
fn cleanup_command() -> Packet {
    #[allow(clippy::missing_panics_doc, clippy::expect_used)] // infallible: empty payload always fits
    Packet::new(protocol::opcode::control::RESET, &[]).expect("empty payload always fits")
}

/// Outcome of [`SlaveNode::handle_inbound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The command succeeded; respond with a positive ACK.
    Ack,
    /// The command failed; respond with an ERROR carrying `kind`.
    Error(ErrorKind),
}

/// Application-specific command dispatch for a slave node.
///
/// `cpu`/`gpu`/`apu` provide the concrete implementation (rendering, audio
/// mixing, etc.); this crate only defines the seam.
pub trait CommandHandler {
    /// Handle one inbound command addressed to this destination.
    fn handle(&mut self, opcode: u8, payload: &[u8], now_us: u64) -> HandlerOutcome;
}

/// The slave-side (GPU/APU) node state machine.
///
/// Every inbound command gets a response (ACK or ERROR) — the wire
/// protocol has no distinct "fire and forget" marker visible to the slave,
/// so `SlaveNode` always answers.
pub struct SlaveNode {
    state: SlaveState,
    clock: SlaveClock,
}

impl SlaveNode {
    /// Create a new slave node, booting and unsynchronized.
    #[must_use]
    pub const fn new() -> Self {
        Self { state: SlaveState::Booting, clock: SlaveClock::new() }
    }

    /// Current slave state.
    #[must_use]
    pub const fn state(&self) -> SlaveState {
        self.state
    }

    /// Apply an inbound clock-sync beacon. The first successful beacon
    /// transitions `Booting` -> `Serving`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::MalformedBeacon`] if `payload` is the wrong
    /// length; state is unchanged in that case.
    pub fn on_beacon(&mut self, payload: &[u8], local_now_us: u64) -> Result<(), ClockError> {
        self.clock.on_beacon(payload, local_now_us)?;
        self.state = SlaveState::Serving;
        Ok(())
    }

    /// Express `local_now_us` in master time, if synced.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Unsynchronized`] before the first beacon.
    pub fn master_time_us(&self, local_now_us: u64) -> Result<u64, ClockError> {
        self.clock.master_time_us(local_now_us)
    }

    /// Dispatch one inbound command to `handler` and build the response
    /// packet the link layer should send back.
    pub fn respond_to<H: CommandHandler>(&mut self, handler: &mut H, packet: &Packet, now_us: u64) -> Packet {
        let outcome = self.handle_inbound_with(handler, packet.opcode(), packet.payload(), now_us);
        Self::encode_response(packet.opcode(), outcome)
    }

    /// Dispatch directly without a handler — used by nodes (or tests) that
    /// answer protocol-control commands (`RESET`, `NOP`) without delegating
    /// to application logic.
    pub fn handle_inbound(&mut self, opcode: u8, payload: &[u8], now_us: u64) -> HandlerOutcome {
        match opcode {
            protocol::opcode::control::NOP | protocol::opcode::control::RESET => HandlerOutcome::Ack,
            protocol::opcode::control::CLOCK_SYNC => self.handle_beacon(payload, now_us),
            _ => HandlerOutcome::Error(ErrorKind::InvalidCommand),
        }
    }

    /// Dispatch with an application handler. Unlike [`Self::handle_inbound`],
    /// `RESET` is *not* intercepted here: per the §4.5 cancellation
    /// contract, the handler must reinitialize its own subsystem state
    /// before this node sends the ACK, so `RESET` is forwarded to `handler`
    /// the same as any other opcode. Both `GpuCommandHandler` and
    /// `ApuCommandHandler` special-case `RESET` internally for this reason.
    fn handle_inbound_with<H: CommandHandler>(
        &mut self,
        handler: &mut H,
        opcode: u8,
        payload: &[u8],
        now_us: u64,
    ) -> HandlerOutcome {
        match opcode {
            protocol::opcode::control::NOP => HandlerOutcome::Ack,
            protocol::opcode::control::CLOCK_SYNC => self.handle_beacon(payload, now_us),
            _ => handler.handle(opcode, payload, now_us),
        }
    }

    /// Apply an inbound beacon delivered through the normal command-response
    /// path, and always ACK it — the master's `transact()` reads back a
    /// response in the same chip-select window it sent the beacon in, so the
    /// beacon is framed like any other command even though it carries no
    /// actionable parameters beyond the clock itself.
    fn handle_beacon(&mut self, payload: &[u8], now_us: u64) -> HandlerOutcome {
        match self.on_beacon(payload, now_us) {
            Ok(()) => HandlerOutcome::Ack,
            Err(_) => HandlerOutcome::Error(ErrorKind::InvalidParams),
        }
    }

    fn encode_response(opcode: u8, outcome: HandlerOutcome) -> Packet {
        let payload: Vec<u8, 2> = match outcome {
            HandlerOutcome::Ack => {
                let mut v = Vec::new();
                let _ = v.push(opcode);
                let _ = v.push(0x00);
                v
            }
            HandlerOutcome::Error(kind) => {
                let mut v = Vec::new();
                let _ = v.push(opcode);
                let _ = v.push(kind.to_wire());
                v
            }
        };
        let response_opcode = match outcome {
            HandlerOutcome::Ack => protocol::opcode::control::ACK,
            HandlerOutcome::Error(_) => protocol::opcode::control::ERROR,
        };
        // Cannot fail: 2-byte payload is far under MAX_PAYLOAD_LEN.
        #[allow(clippy::unwrap_used)]
        Packet::new(response_opcode, &payload).unwrap()
    }
}

impl Default for SlaveNode {
    fn default() -> Self {
        Self::new()
    }
}
