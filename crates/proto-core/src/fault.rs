//! Fault manager: error taxonomy, per-destination health tracking, and a
//! recent-error ring (spec §3, §4.8, §8).

use heapless::HistoryBuffer;

use crate::config::{ERROR_RING_CAPACITY, HEALTH_CHECK_FAILURE_THRESHOLD};


/// Which physical destination a fault or health record concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    /// The GPU node/link.
    Gpu,
    /// The APU node/link.
    Apu,
}

impl Destination {
    /// The other destination's link — used by [`crate::node::MasterNode`] to
    /// decide whether a second independent failure escalates past a single
    /// degraded link (spec §4.4 "any -> halted on unrecoverable fault").
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Gpu => Self::Apu,
            Self::Apu => Self::Gpu,
        }
    }
}

/// Error taxonomy reported by a slave in an `ERROR` response, or recorded by
/// the master for link-level conditions it observes itself (spec §7).
///
/// Numeric values are preserved from the wire protocol's error-code byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No error; success.
    None,
    /// Master-observed: no ACK arrived within the command timeout. Never
    /// sent over the wire by a slave.
    Timeout,
    /// Slave cannot dispatch the opcode.
    InvalidCommand,
    /// Opcode recognized but the payload was rejected.
    InvalidParams,
    /// Slave cannot accept the command right now; safe to retry shortly.
    Busy,
    /// Slave-side allocation failure.
    MemoryExhausted,
    /// Link-layer failure, master-observed.
    CommunicationFailure,
    /// Slave has not received a clock-sync beacon in the expected window.
    SyncLost,
}

impl ErrorKind {
    /// Decode a wire error-code byte. `None` for unrecognized codes.
    #[must_use]
    pub const fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Timeout),
            0x02 => Some(Self::InvalidCommand),
            0x03 => Some(Self::InvalidParams),
            0x04 => Some(Self::Busy),
            0x05 => Some(Self::MemoryExhausted),
            0x06 => Some(Self::CommunicationFailure),
            0x07 => Some(Self::SyncLost),
            _ => None,
        }
    }

    /// Encode back to the wire error-code byte.
    #[must_use]
    pub const fn to_wire(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Timeout => 0x01,
            Self::InvalidCommand => 0x02,
            Self::InvalidParams => 0x03,
            Self::Busy => 0x04,
            Self::MemoryExhausted => 0x05,
            Self::CommunicationFailure => 0x06,
            Self::SyncLost => 0x07,
        }
    }

    /// Whether the master should resend the same command (§4.8 retry policy).
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Busy | Self::Timeout)
    }

    /// Whether this error indicates the link itself, not just the command,
    /// is unhealthy.
    #[must_use]
    pub const fn is_link_level(self) -> bool {
        matches!(self, Self::CommunicationFailure)
    }
}

/// One entry in the fault manager's recent-error ring.
#[derive(Debug, Clone, Copy)]
pub struct ErrorRecord {
    /// Which destination reported the error.
    pub destination: Destination,
    /// The error's kind.
    pub kind: ErrorKind,
    /// Timestamp (µs) the error was recorded.
    pub at_us: u64,
}

/// Health state for one destination's link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkHealth {
    consecutive_ping_failures: u8,
    unrecoverable: bool,
}

impl LinkHealth {
    const fn new() -> Self {
        Self { consecutive_ping_failures: 0, unrecoverable: false }
    }

    /// `true` unless the destination has tripped the unrecoverable flag or
    /// exceeded [`crate::config::HEALTH_CHECK_FAILURE_THRESHOLD`] consecutive
    /// ping failures.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        !self.unrecoverable && self.consecutive_ping_failures < HEALTH_CHECK_FAILURE_THRESHOLD
    }
}

impl Default for LinkHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks per-destination link health and a bounded log of recent errors.
pub struct FaultManager {
    gpu_health: LinkHealth,
    apu_health: LinkHealth,
    errors: HistoryBuffer<ErrorRecord, ERROR_RING_CAPACITY>,
}

impl FaultManager {
    /// Create a fault manager with both destinations healthy and an empty log.
    #[must_use]
    pub const fn new() -> Self {
        Self { gpu_health: LinkHealth::new(), apu_health: LinkHealth::new(), errors: HistoryBuffer::new() }
    }

    fn health_mut(&mut self, destination: Destination) -> &mut LinkHealth {
        match destination {
            Destination::Gpu => &mut self.gpu_health,
            Destination::Apu => &mut self.apu_health,
        }
    }

    /// Current health for `destination`.
    #[must_use]
    pub const fn health(&self, destination: Destination) -> LinkHealth {
        match destination {
            Destination::Gpu => self.gpu_health,
            Destination::Apu => self.apu_health,
        }
    }

    /// Record an error from `destination` into the recent-error ring.
    ///
    /// This alone never changes link health: per spec §7, an unrecoverable
    /// per-command error (invalid-command/invalid-params) is surfaced to the
    /// enqueuing context as a completed-with-error event, not a link
    /// degradation. Health degrades only via [`Self::record_exhaustion`] and
    /// repeated [`Self::record_ping_failure`] calls.
    pub fn record(&mut self, destination: Destination, kind: ErrorKind, at_us: u64) {
        self.errors.write(ErrorRecord { destination, kind, at_us });
    }

    /// Record that `destination`'s command queue exhausted its retry budget
    /// without ever receiving a response. Exhausting the whole retry budget
    /// marks the link unhealthy immediately — there is no response left to
    /// retry against (spec scenario "retry exhaustion").
    pub fn record_exhaustion(&mut self, destination: Destination, at_us: u64) {
        self.errors.write(ErrorRecord { destination, kind: ErrorKind::Timeout, at_us });
        self.health_mut(destination).unrecoverable = true;
    }

    /// Record a failed health-check ping to `destination`.
    pub fn record_ping_failure(&mut self, destination: Destination, at_us: u64) {
        self.record(destination, ErrorKind::Timeout, at_us);
        let health = self.health_mut(destination);
        health.consecutive_ping_failures = health.consecutive_ping_failures.saturating_add(1);
    }

    /// Record a successful health-check ping to `destination`, resetting its
    /// consecutive-failure count.
    pub fn record_ping_success(&mut self, destination: Destination, _at_us: u64) {
        self.health_mut(destination).consecutive_ping_failures = 0;
    }

    /// Iterate recent errors across all destinations, oldest first.
    pub fn recent_errors(&self) -> impl DoubleEndedIterator<Item = &ErrorRecord> {
        self.errors.oldest_ordered()
    }
}

impl Default for FaultManager {
    fn default() -> Self {
        Self::new()
    }
}
