//! Property-based tests for packet framing.
//! Verifies the encode/decode round trip holds for ALL valid inputs, not
//! just the fixed examples in `frame.rs`'s unit tests.

use protocol::frame::{decode_header, Packet, PacketError, MAX_PAYLOAD_LEN};

proptest::proptest! {
    /// Any opcode with any payload up to the maximum fits and round-trips
    /// through `as_bytes`/`parse` unchanged.
    #[test]
    fn packet_round_trips_for_any_opcode_and_payload(
        opcode in 0u8..=255u8,
        payload in proptest::collection::vec(0u8..=255u8, 0..=MAX_PAYLOAD_LEN),
    ) {
        let pkt = Packet::new(opcode, &payload).expect("payload within MAX_PAYLOAD_LEN must fit");
        let bytes = pkt.as_bytes();
        let decoded = Packet::parse(&bytes).expect("a packet's own bytes must parse");
        assert_eq!(decoded, pkt);
    }

    /// Payloads longer than the maximum are always rejected, never panicked
    /// on, regardless of the actual length or contents.
    #[test]
    fn oversized_payload_never_panics_and_always_errors(
        extra in 1usize..=64usize,
        fill in 0u8..=255u8,
    ) {
        let payload = vec![fill; MAX_PAYLOAD_LEN + extra];
        assert_eq!(Packet::new(0x00, &payload), Err(PacketError::PayloadTooLong));
    }

    /// `decode_header` never panics for any byte pair, and reports a
    /// remaining-length that always fits within the payload capacity.
    #[test]
    fn decode_header_never_panics_and_bounds_remaining(opcode in 0u8..=255u8, length in 0u8..=255u8) {
        match decode_header(opcode, length) {
            Ok((decoded_opcode, remaining)) => {
                assert_eq!(decoded_opcode, opcode);
                assert!(usize::from(remaining) <= MAX_PAYLOAD_LEN);
            }
            Err(PacketError::LengthTooShort) => {}
            Err(other) => panic!("decode_header must only ever report LengthTooShort, got {other:?}"),
        }
    }
}
