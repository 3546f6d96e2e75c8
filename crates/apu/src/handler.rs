//! APU command dispatch (spec §6 APU opcode table).
//!
//! Mirrors `gpu::handler::GpuCommandHandler`: validates that an opcode is
//! known and its payload carries enough bytes for its fixed parameters, but
//! does not touch a mixer or produce any actual sound.

use proto_core::node::{CommandHandler, HandlerOutcome};
use proto_core::ErrorKind;
use protocol::opcode::ApuOpcode;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_master_volume_with_correct_payload_acks() {
        let mut handler = ApuCommandHandler::new();
        let outcome = handler.handle(ApuOpcode::SET_MASTER_VOLUME.value(), &[0x7F], 0);
        assert_eq!(outcome, HandlerOutcome::Ack);
    }

    #[test]
    fn set_master_volume_with_short_payload_errors() {
        let mut handler = ApuCommandHandler::new();
        let outcome = handler.handle(ApuOpcode::SET_MASTER_VOLUME.value(), &[], 0);
        assert_eq!(outcome, HandlerOutcome::Error(ErrorKind::InvalidParams));
    }

    #[test]
    fn unknown_opcode_errors_invalid_command() {
        let mut handler = ApuCommandHandler::new();
        let outcome = handler.handle(0x99, &[], 0);
        assert_eq!(outcome, HandlerOutcome::Error(ErrorKind::InvalidCommand));
    }

    #[test]
    fn channel_note_on_toggles_active_channel_count() {
        let mut handler = ApuCommandHandler::new();
        assert_eq!(handler.active_channel_count(), 0);
        let outcome = handler.handle(ApuOpcode::CHANNEL_NOTE_ON.value(), &[0x00, 0x3C, 0x7F], 0);
        assert_eq!(outcome, HandlerOutcome::Ack);
        assert_eq!(handler.active_channel_count(), 1);
    }

    #[test]
    fn channel_note_off_reduces_active_channel_count() {
        let mut handler = ApuCommandHandler::new();
        handler.handle(ApuOpcode::CHANNEL_NOTE_ON.value(), &[0x00, 0x3C, 0x7F], 0);
        let outcome = handler.handle(ApuOpcode::CHANNEL_NOTE_OFF.value(), &[0x00], 0);
        assert_eq!(outcome, HandlerOutcome::Ack);
        assert_eq!(handler.active_channel_count(), 0);
    }

    #[test]
    fn reset_clears_active_channel_count() {
        let mut handler = ApuCommandHandler::new();
        handler.handle(ApuOpcode::CHANNEL_NOTE_ON.value(), &[0x00, 0x3C, 0x7F], 0);
        handler.handle(ApuOpcode::RESET.value(), &[], 0);
        assert_eq!(handler.active_channel_count(), 0);
    }

    #[test]
    fn bulk_load_opcodes_ack_with_any_payload() {
        let mut handler = ApuCommandHandler::new();
        assert_eq!(handler.handle(ApuOpcode::TRACKER_LOAD.value(), &[], 0), HandlerOutcome::Ack);
        assert_eq!(handler.handle(ApuOpcode::SAMPLE_LOAD.value(), &[], 0), HandlerOutcome::Ack);
    }
}

/// Minimum payload length each opcode's fixed parameters require, per spec
/// §6. Bulk-transfer opcodes (`TRACKER_LOAD`, `SAMPLE_LOAD`) are deliberately
/// absent — their payload arrives via `DATA_CHUNK` continuations, not a
/// fixed-width header, so they fall through to the parameterless path.
const fn min_payload_len(opcode: ApuOpcode) -> Option<usize> {
    match opcode {
        ApuOpcode::SET_MASTER_VOLUME => Some(1),
        ApuOpcode::SET_AUDIO_CONFIG => Some(2),
        ApuOpcode::TRACKER_PLAY | ApuOpcode::TRACKER_STOP => Some(1),
        ApuOpcode::CHANNEL_SET_VOLUME => Some(2),
        ApuOpcode::CHANNEL_NOTE_ON => Some(3),
        ApuOpcode::CHANNEL_NOTE_OFF => Some(1),
        ApuOpcode::SAMPLE_PLAY => Some(2),
        _ => None,
    }
}

/// APU-side [`CommandHandler`]. Tracks only the state needed to answer
/// protocol commands correctly — a count of currently-triggered channels,
/// not any actual sample/mixer state.
pub struct ApuCommandHandler {
    active_channel_count: u8,
}

impl ApuCommandHandler {
    /// Create a handler in its post-reset default state.
    #[must_use]
    pub const fn new() -> Self {
        Self { active_channel_count: 0 }
    }

    /// How many channels have received a `CHANNEL_NOTE_ON` without a
    /// matching `CHANNEL_NOTE_OFF` since the last reset.
    #[must_use]
    pub const fn active_channel_count(&self) -> u8 {
        self.active_channel_count
    }
}

impl Default for ApuCommandHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandHandler for ApuCommandHandler {
    fn handle(&mut self, opcode: u8, payload: &[u8], _now_us: u64) -> HandlerOutcome {
        let apu_opcode = ApuOpcode(opcode);

        if apu_opcode == ApuOpcode::RESET {
            self.active_channel_count = 0;
            return HandlerOutcome::Ack;
        }

        let Some(min_len) = min_payload_len(apu_opcode) else {
            return self.handle_parameterless_or_unknown(apu_opcode);
        };

        if payload.len() < min_len {
            return HandlerOutcome::Error(ErrorKind::InvalidParams);
        }

        if apu_opcode == ApuOpcode::CHANNEL_NOTE_ON {
            self.active_channel_count = self.active_channel_count.saturating_add(1);
        } else if apu_opcode == ApuOpcode::CHANNEL_NOTE_OFF {
            self.active_channel_count = self.active_channel_count.saturating_sub(1);
        }

        HandlerOutcome::Ack
    }
}

impl ApuCommandHandler {
    fn handle_parameterless_or_unknown(&self, opcode: ApuOpcode) -> HandlerOutcome {
        match opcode {
            ApuOpcode::NOP | ApuOpcode::GET_STATUS | ApuOpcode::SYNC_TIMING => HandlerOutcome::Ack,
            ApuOpcode::TRACKER_LOAD | ApuOpcode::SAMPLE_LOAD => HandlerOutcome::Ack,
            _ => HandlerOutcome::Error(ErrorKind::InvalidCommand),
        }
    }
}
