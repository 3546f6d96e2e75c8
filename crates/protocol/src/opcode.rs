//! Opcode catalogs.
//!
//! Opcodes are partitioned into reserved bands (spec §3): system
//! (0x00-0x0F), subsystem-specific mid-bands, batch commands (0xF0-0xF7),
//! and protocol control (0xF8-0xFF). The numeric values below are preserved
//! from the original TriBoy command header (`triboy_commands.h`) for binary
//! compatibility with existing assets, except for the protocol-control band,
//! where spec.md §6 is authoritative and differs from the legacy assignment
//! (see [`control`]).
//!
//! `0x01` means `RESET_GPU` on the GPU link and `RESET_AUDIO` on the APU
//! link — the same numeric opcode with different per-destination meaning.
//! [`GpuOpcode`] and [`ApuOpcode`] are kept as distinct newtypes so this
//! ambiguity can never be resolved through a shared global enum.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_opcode_is_shared_numeric_value_different_types() {
        assert_eq!(GpuOpcode::RESET.0, ApuOpcode::RESET.0);
    }

    #[test]
    fn control_band_matches_spec_not_legacy_header() {
        // spec.md §6 is authoritative: ACK=0xFA, VSYNC=0xFB, ERROR=0xFE,
        // CLOCK_SYNC=0xF1 — NOT the legacy triboy_commands.h assignment
        // (CLOCK_SYNC=0xF8, ACK=0xFA, NAK=0xFB, ERROR=0xFE).
        assert_eq!(control::ACK, 0xFA);
        assert_eq!(control::VSYNC, 0xFB);
        assert_eq!(control::ERROR, 0xFE);
        assert_eq!(control::CLOCK_SYNC, 0xF1);
    }

    #[test]
    fn nop_and_reset_are_system_band() {
        assert_eq!(control::NOP, 0x00);
        assert_eq!(control::RESET, 0x01);
    }
}

/// Protocol-control band (0xF8-0xFF plus the system-band NOP/RESET every
/// destination shares). Numeric values are authoritative per spec.md §6.
pub mod control {
    /// No operation — health check / filler (master→slave).
    pub const NOP: u8 = 0x00;
    /// Subsystem reset (master→slave). Per-destination meaning differs;
    /// use [`super::GpuOpcode::RESET`] / [`super::ApuOpcode::RESET`] in
    /// application code rather than this raw constant.
    pub const RESET: u8 = 0x01;
    /// Bulk payload continuation (master→slave, up to 253 B).
    pub const DATA_CHUNK: u8 = 0xF0;
    /// Clock-sync time beacon (master→slave).
    pub const CLOCK_SYNC: u8 = 0xF1;
    /// Positive acknowledgment (slave→master).
    pub const ACK: u8 = 0xFA;
    /// In-band VSYNC notification (GPU→master only).
    pub const VSYNC: u8 = 0xFB;
    /// Negative acknowledgment / error report (slave→master).
    pub const ERROR: u8 = 0xFE;
}

/// A GPU-destination opcode. Distinct type from [`ApuOpcode`] so that the
/// numerically-identical `0x01` (`RESET_GPU` vs `RESET_AUDIO`) can never be
/// confused by the type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GpuOpcode(pub u8);

impl GpuOpcode {
    /// No operation.
    pub const NOP: Self = Self(0x00);
    /// Reset GPU state to defaults.
    pub const RESET: Self = Self(0x01);
    /// Configure display resolution and color depth.
    pub const SET_DISPLAY_MODE: Self = Self(0x02);
    /// Toggle VBLANK interrupt signal to CPU.
    pub const SET_VBLANK_CALLBACK: Self = Self(0x03);
    /// Notify CPU when next VBLANK occurs.
    pub const VSYNC_WAIT: Self = Self(0x04);
    /// Return GPU status flags.
    pub const GET_STATUS: Self = Self(0x05);
    /// Set single palette entry.
    pub const SET_PALETTE_ENTRY: Self = Self(0x10);
    /// Load multiple palette entries.
    pub const LOAD_PALETTE: Self = Self(0x11);
    /// Configure background layer properties.
    pub const CONFIGURE_LAYER: Self = Self(0x20);
    /// Load tile graphics data.
    pub const LOAD_TILESET: Self = Self(0x21);
    /// Load tile mapping data.
    pub const LOAD_TILEMAP: Self = Self(0x22);
    /// Set layer scroll position.
    pub const SCROLL_LAYER: Self = Self(0x23);
    /// Load sprite pattern/graphic data.
    pub const LOAD_SPRITE_PATTERN: Self = Self(0x40);
    /// Define sprite properties.
    pub const DEFINE_SPRITE: Self = Self(0x41);
    /// Update sprite position.
    pub const MOVE_SPRITE: Self = Self(0x42);
    /// Draw single pixel.
    pub const DRAW_PIXEL: Self = Self(0x80);
    /// Draw rectangle.
    pub const DRAW_RECT: Self = Self(0x82);
    /// Copy region from one layer to framebuffer.
    pub const BLIT_REGION: Self = Self(0x84);

    /// The raw numeric opcode.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// An APU-destination opcode. Distinct type from [`GpuOpcode`]; see the
/// module-level doc for why `0x01` must never be a shared enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApuOpcode(pub u8);

impl ApuOpcode {
    /// No operation.
    pub const NOP: Self = Self(0x00);
    /// Reset audio system to default state.
    pub const RESET: Self = Self(0x01);
    /// Set master volume for all audio output.
    pub const SET_MASTER_VOLUME: Self = Self(0x02);
    /// Request status packet from audio chip.
    pub const GET_STATUS: Self = Self(0x03);
    /// Configure audio output parameters.
    pub const SET_AUDIO_CONFIG: Self = Self(0x04);
    /// Synchronize timing information with CPU.
    pub const SYNC_TIMING: Self = Self(0x05);
    /// Load tracker song data into specified slot.
    pub const TRACKER_LOAD: Self = Self(0x10);
    /// Start playback of loaded tracker song.
    pub const TRACKER_PLAY: Self = Self(0x11);
    /// Stop tracker playback.
    pub const TRACKER_STOP: Self = Self(0x12);
    /// Set volume for specific channel.
    pub const CHANNEL_SET_VOLUME: Self = Self(0x30);
    /// Trigger note with velocity on channel.
    pub const CHANNEL_NOTE_ON: Self = Self(0x33);
    /// Stop currently playing note on channel.
    pub const CHANNEL_NOTE_OFF: Self = Self(0x34);
    /// Load PCM sample data into memory.
    pub const SAMPLE_LOAD: Self = Self(0x70);
    /// Play sample on specified channel.
    pub const SAMPLE_PLAY: Self = Self(0x71);

    /// The raw numeric opcode.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

/// CPU-destination opcodes (0xE0-0xE7). These are the rare commands a slave
/// would address back at the master (e.g. in a diagnostic loopback); the
/// normal slave→master vocabulary is the protocol-control band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CpuOpcode(pub u8);

impl CpuOpcode {
    /// Trigger full system reset.
    pub const SYSTEM_RESET: Self = Self(0xE0);
    /// Ping/health check request.
    pub const PING: Self = Self(0xE1);
    /// Get component firmware version.
    pub const GET_VERSION: Self = Self(0xE2);
    /// Configure system timing.
    pub const SET_CLOCK: Self = Self(0xE3);
    /// Synchronize timing between components.
    pub const SYNC: Self = Self(0xE4);

    /// The raw numeric opcode.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}
