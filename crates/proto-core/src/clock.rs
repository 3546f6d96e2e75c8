//! Clock synchronization service (spec §4.7, §9).
//!
//! The master owns a free-running microsecond counter and a monotonic frame
//! counter. Each slave owns a signed 64-bit offset-to-master, re-established
//! by every beacon: `master_time = local_time + local_offset_us`. Between
//! beacons a slave reports timings in master time by applying the stored
//! offset; a slave that has never received a beacon refuses timing-sensitive
//! commands (§3).
//!
//! # Beacon wire width
//!
//! The original TriBoy beacon truncates the master timestamp to its low 5
//! bytes (losing the top 24 bits) to keep the packet at the spec's literal
//! 10-byte example. Per spec §9 ("either choice is acceptable so long as
//! chosen consistently on both ends"), this implementation widens the
//! timestamp field to the full 8 bytes: the 12-byte payload removes the
//! wrap-within-a-sync-interval assumption the truncated form required.

use protocol::opcode::control;
use protocol::{Packet, PacketError};


/// Errors from clock-sync beacon handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum ClockError {
    /// No beacon has ever been received; timing-sensitive queries must be refused.
    #[error("slave has not received a clock-sync beacon")]
    Unsynchronized,
    /// The beacon payload was not the expected 12 bytes.
    #[error("malformed clock-sync beacon payload")]
    MalformedBeacon,
}

/// Expected beacon payload length: 4-byte frame counter + 8-byte timestamp.
pub const BEACON_PAYLOAD_LEN: usize = 12;

/// Master-side free-running clock and frame counter (§3 `NodeClock`).
#[derive(Debug, Clone, Copy)]
pub struct MasterClock {
    epoch_us: u64,
    frame_counter: u32,
}

impl MasterClock {
    /// Create a new master clock seeded with the current free-running time.
    #[must_use]
    pub const fn new(now_us: u64) -> Self {
        Self { epoch_us: now_us, frame_counter: 0 }
    }

    /// Advance the master's notion of "now". The caller's time source is
    /// assumed monotonic; this does not itself read any timer.
    pub fn advance_to(&mut self, now_us: u64) {
        self.epoch_us = now_us;
    }

    /// Current master-local microsecond timestamp.
    #[must_use]
    pub const fn now_us(&self) -> u64 {
        self.epoch_us
    }

    /// Current frame counter.
    #[must_use]
    pub const fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    /// Set the frame counter directly (used by tests and by the node's
    /// frame-advance logic in `proto_core::event`).
    pub fn set_frame_counter(&mut self, value: u32) {
        self.frame_counter = value;
    }

    /// Increment the frame counter by one (called on VSYNC-confirmed advance).
    pub fn advance_frame(&mut self) {
        self.frame_counter = self.frame_counter.wrapping_add(1);
    }

    /// Build the clock-sync beacon packet: `[frame_counter_be32, timestamp_be64]`.
    #[must_use]
    #[allow(clippy::missing_panics_doc)] // Packet::new cannot fail: 12 bytes < MAX_PAYLOAD_LEN
    #[allow(clippy::expect_used)] // infallible by construction; see doc above
    pub fn beacon(&self) -> Packet {
        let mut payload = [0u8; BEACON_PAYLOAD_LEN];
        payload[0..4].copy_from_slice(&self.frame_counter.to_be_bytes());
        payload[4..12].copy_from_slice(&self.epoch_us.to_be_bytes());
        Packet::new(control::CLOCK_SYNC, &payload).expect("beacon payload always fits")
    }
}

/// Slave-side offset-to-master clock (§3 `NodeClock`).
#[derive(Debug, Clone, Copy, Default)]
pub struct SlaveClock {
    /// `master_time = local_time + offset_us`. `None` until the first beacon.
    offset_us: Option<i64>,
    synced_frame_counter: u32,
}

impl SlaveClock {
    /// Create a new, unsynchronized slave clock.
    #[must_use]
    pub const fn new() -> Self {
        Self { offset_us: None, synced_frame_counter: 0 }
    }

    /// `true` once at least one beacon has been applied.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        self.offset_us.is_some()
    }

    /// The frame counter carried by the most recently applied beacon.
    #[must_use]
    pub const fn synced_frame_counter(&self) -> u32 {
        self.synced_frame_counter
    }

    /// Apply an inbound beacon payload, re-establishing `offset_us`.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::MalformedBeacon`] if `payload.len() != BEACON_PAYLOAD_LEN`.
    #[allow(clippy::indexing_slicing)] // Safety: length checked against BEACON_PAYLOAD_LEN above
    #[allow(clippy::cast_possible_wrap)] // Safety: master/local clocks are microsecond counters well under i64::MAX in any realistic session
    pub fn on_beacon(&mut self, payload: &[u8], local_now_us: u64) -> Result<(), ClockError> {
        if payload.len() != BEACON_PAYLOAD_LEN {
            return Err(ClockError::MalformedBeacon);
        }
        let mut frame_bytes = [0u8; 4];
        frame_bytes.copy_from_slice(&payload[0..4]);
        let frame_counter = u32::from_be_bytes(frame_bytes);

        let mut ts_bytes = [0u8; 8];
        ts_bytes.copy_from_slice(&payload[4..12]);
        let master_time_us = u64::from_be_bytes(ts_bytes);

        self.offset_us = Some(master_time_us as i64 - local_now_us as i64);
        self.synced_frame_counter = frame_counter;
        Ok(())
    }

    /// Express `local_now_us` in master time.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::Unsynchronized`] if no beacon has ever been applied.
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)] // Safety: offset magnitude bounded by realistic clock skew, far under i64/u64 range
    pub fn master_time_us(&self, local_now_us: u64) -> Result<u64, ClockError> {
        let offset = self.offset_us.ok_or(ClockError::Unsynchronized)?;
        Ok((local_now_us as i64 + offset) as u64)
    }
}

// Retained for readers porting original-source assets that still expect the
// legacy 5-byte-truncated timestamp layout (opcode CLOCK_SYNC, 10-byte wire
// length). Not used by this implementation — see the module doc.
#[allow(dead_code)]
const LEGACY_BEACON_WIRE_LEN: u8 = 10;

impl From<PacketError> for ClockError {
    fn from(_: PacketError) -> Self {
        ClockError::MalformedBeacon
    }
}
