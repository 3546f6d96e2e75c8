//! Property-based tests for command queue ordering.
//! Verifies FIFO ordering holds for ANY sequence of enqueues answered
//! immediately (no retries in flight), not just the fixed examples in
//! `queue.rs`'s unit tests.

use proto_core::queue::{CommandQueue, DrainResult};
use protocol::Packet;

fn pkt(opcode: u8) -> Packet {
    Packet::new(opcode, &[]).expect("empty payload always fits")
}

proptest::proptest! {
    /// Whatever order opcodes are enqueued in, draining and completing them
    /// one at a time always yields them back in that same order.
    #[test]
    fn drain_then_complete_preserves_enqueue_order(
        opcodes in proptest::collection::vec(0u8..=255u8, 0..=16),
    ) {
        let mut q: CommandQueue<16> = CommandQueue::new();
        for &opcode in &opcodes {
            q.enqueue(pkt(opcode), true).expect("capacity matches input bound");
        }

        for &expected in &opcodes {
            match q.drain_one(0) {
                DrainResult::Send(cmd) => assert_eq!(cmd.packet.opcode(), expected),
                other => panic!("expected Send({expected:#x}), got {other:?}"),
            }
            assert!(q.complete(expected), "response for {expected:#x} must settle the head");
        }
        assert_eq!(q.len(), 0);
    }

    /// `len()` after N enqueues into a queue with capacity >= N always
    /// equals N, regardless of the opcodes chosen.
    #[test]
    fn enqueue_count_matches_len_within_capacity(
        opcodes in proptest::collection::vec(0u8..=255u8, 0..=16),
    ) {
        let mut q: CommandQueue<16> = CommandQueue::new();
        for &opcode in &opcodes {
            q.enqueue(pkt(opcode), true).expect("capacity matches input bound");
        }
        assert_eq!(q.len(), opcodes.len());
    }
}
