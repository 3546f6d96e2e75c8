//! GPU command dispatch (spec §6 GPU opcode table).
//!
//! Only validates that an opcode is known and its payload is long enough
//! for the parameters it declares; it does not touch a framebuffer or
//! perform any actual drawing (out of scope — see the module doc).

use proto_core::node::{CommandHandler, HandlerOutcome};
use proto_core::ErrorKind;
use protocol::opcode::GpuOpcode;


/// Minimum payload length each opcode's parameters require, per spec §6.
const fn min_payload_len(opcode: GpuOpcode) -> Option<usize> {
    match opcode {
        GpuOpcode::SET_DISPLAY_MODE => Some(2),
        GpuOpcode::SET_VBLANK_CALLBACK => Some(1),
        GpuOpcode::SET_PALETTE_ENTRY => Some(3),
        GpuOpcode::CONFIGURE_LAYER => Some(2),
        GpuOpcode::SCROLL_LAYER => Some(3),
        GpuOpcode::MOVE_SPRITE => Some(5),
        GpuOpcode::DRAW_PIXEL => Some(5),
        GpuOpcode::DRAW_RECT => Some(9),
        _ => None,
    }
}

/// GPU-side [`CommandHandler`]. Tracks only the state needed to answer
/// protocol commands correctly.
pub struct GpuCommandHandler {
    vblank_callback_enabled: bool,
}

impl GpuCommandHandler {
    /// Create a handler in its post-reset default state.
    #[must_use]
    pub const fn new() -> Self {
        Self { vblank_callback_enabled: false }
    }

    /// Whether the GPU has been told to raise its VBLANK callback (spec §6
    /// `SET_VBLANK_CALLBACK`).
    #[must_use]
    pub const fn vblank_callback_enabled(&self) -> bool {
        self.vblank_callback_enabled
    }
}

impl Default for GpuCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for GpuCommandHandler {
    fn handle(&mut self, opcode: u8, payload: &[u8], _now_us: u64) -> HandlerOutcome {
        let gpu_opcode = GpuOpcode(opcode);

        if gpu_opcode == GpuOpcode::RESET {
            self.vblank_callback_enabled = false;
            return HandlerOutcome::Ack;
        }

        let Some(min_len) = min_payload_len(gpu_opcode) else {
            // Opcodes outside the known catalog, and parameterless ones
            // (NOP, VSYNC_WAIT, GET_STATUS, ...), fall through here; the
            // former are rejected, the latter accept any payload.
            return self.handle_parameterless_or_unknown(gpu_opcode);
        };

        if payload.len() < min_len {
            return HandlerOutcome::Error(ErrorKind::InvalidParams);
        }

        if gpu_opcode == GpuOpcode::SET_VBLANK_CALLBACK {
            // Safety: length checked above (min_len == 1).
            #[allow(clippy::indexing_slicing)]
            {
                self.vblank_callback_enabled = payload[0] != 0;
            }
        }

        HandlerOutcome::Ack
    }
}

impl GpuCommandHandler {
    fn handle_parameterless_or_unknown(&self, opcode: GpuOpcode) -> HandlerOutcome {
        match opcode {
            GpuOpcode::NOP | GpuOpcode::VSYNC_WAIT | GpuOpcode::GET_STATUS => HandlerOutcome::Ack,
            GpuOpcode::LOAD_PALETTE
            | GpuOpcode::LOAD_TILESET
            | GpuOpcode::LOAD_TILEMAP
            | GpuOpcode::LOAD_SPRITE_PATTERN
            | GpuOpcode::DEFINE_SPRITE
            | GpuOpcode::BLIT_REGION => HandlerOutcome::Ack,
            _ => HandlerOutcome::Error(ErrorKind::InvalidCommand),
        }
    }
}
