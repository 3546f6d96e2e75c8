//! Packet framing for the TriBoy wire protocol.
//!
//! Every payload on every link is framed identically:
//!
//! ```text
//! byte 0: opcode (8-bit)
//! byte 1: length (total packet length, inclusive of these 2 header bytes)
//! bytes 2..length-1: command-specific parameters
//! ```
//!
//! `length >= 2`; `length == 2` means no payload. There is no escape
//! sequence — the boundary between packets is defined by the link's
//! chip-select framing together with this length field (see `proto-core::link`).


/// Minimum valid total packet length (2 header bytes, no payload).
pub const MIN_PACKET_LEN: u8 = 2;
/// Maximum total packet length representable by the 8-bit length field.
pub const MAX_PACKET_LEN: usize = 255;
/// Maximum payload length: `MAX_PACKET_LEN` minus the 2 header bytes.
pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_LEN - MIN_PACKET_LEN as usize;

/// Errors raised while encoding or decoding a [`Packet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    /// `payload.len() > MAX_PAYLOAD_LEN` (253 bytes) — cannot fit in the
    /// single 8-bit length field.
    PayloadTooLong,
    /// The declared `length` byte is below [`MIN_PACKET_LEN`] (2).
    LengthTooShort,
    /// Fewer bytes were supplied than the declared `length` requires.
    BufferTooShort,
}

/// A decoded packet: opcode plus up to 253 bytes of payload.
///
/// Backed by a fixed-capacity buffer — no heap allocation on the hot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    opcode: u8,
    payload: heapless::Vec<u8, MAX_PAYLOAD_LEN>,
}

impl Packet {
    /// Build a packet from an opcode and payload slice.
    ///
    /// # Errors
    ///
    /// Returns [`PacketError::PayloadTooLong`] if `payload.len() > 253`.
    pub fn new(opcode: u8, payload: &[u8]) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLong);
        }
        let mut buf = heapless::Vec::new();
        // Cannot fail: length already checked against MAX_PAYLOAD_LEN == capacity.
        let _ = buf.extend_from_slice(payload);
        Ok(Self { opcode, payload: buf })
    }

    /// This packet's opcode.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// This packet's payload bytes (does not include the 2-byte header).
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Total on-wire length: 2 header bytes plus the payload.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // payload.len() <= MAX_PAYLOAD_LEN (253) by construction
    #[allow(clippy::arithmetic_side_effects)] // 2 + (0..=253) never overflows u8
    pub fn wire_len(&self) -> u8 {
        MIN_PACKET_LEN + self.payload.len() as u8
    }

    /// Encode this packet as `[opcode, length, ...payload]`.
    #[must_use]
    pub fn as_bytes(&self) -> heapless::Vec<u8, MAX_PACKET_LEN> {
        let mut out: heapless::Vec<u8, MAX_PACKET_LEN> = heapless::Vec::new();
        // Cannot fail: 2 + MAX_PAYLOAD_LEN == MAX_PACKET_LEN == capacity.
        let _ = out.push(self.opcode);
        let _ = out.push(self.wire_len());
        let _ = out.extend_from_slice(&self.payload);
        out
    }

    /// Parse a packet out of a byte slice that starts at the opcode byte.
    ///
    /// Only `length` bytes are consumed; trailing bytes (if any) are the
    /// caller's concern — the link layer determines where one packet ends
    /// and another begins via chip-select framing, not via this buffer.
    ///
    /// # Errors
    ///
    /// - [`PacketError::BufferTooShort`] if fewer than 2 bytes are present,
    ///   or fewer than `length` bytes total.
    /// - [`PacketError::LengthTooShort`] if the declared length is below 2.
    #[allow(clippy::indexing_slicing)] // Safety: all indices guarded by the length checks above
    #[allow(clippy::arithmetic_side_effects)] // Safety: remaining <= 253 (checked via MAX_PAYLOAD_LEN in Self::new), 2 + remaining <= 255
    pub fn parse(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < MIN_PACKET_LEN as usize {
            return Err(PacketError::BufferTooShort);
        }
        let opcode = bytes[0];
        let length = bytes[1];
        let (_, remaining) = decode_header(opcode, length)?;
        let remaining = remaining as usize;
        if bytes.len() < MIN_PACKET_LEN as usize + remaining {
            return Err(PacketError::BufferTooShort);
        }
        let payload = &bytes[2..2 + remaining];
        Self::new(opcode, payload)
    }
}

/// Decode a 2-byte packet header into `(opcode, remaining_payload_bytes)`.
///
/// `remaining_payload_bytes` is the number of bytes a reader still needs to
/// consume after these two header bytes to have the full packet.
///
/// # Errors
///
/// Returns [`PacketError::LengthTooShort`] if `length < MIN_PACKET_LEN`.
#[allow(clippy::arithmetic_side_effects)] // Safety: length >= MIN_PACKET_LEN checked above
pub fn decode_header(opcode: u8, length: u8) -> Result<(u8, u8), PacketError> {
    if length < MIN_PACKET_LEN {
        return Err(PacketError::LengthTooShort);
    }
    Ok((opcode, length - MIN_PACKET_LEN))
}
