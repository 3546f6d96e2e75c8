//! Per-destination command queue with retry/timeout (spec §3, §4.3, §4.4).
//!
//! A single bounded FIFO ring per destination link. Retries are serviced
//! only at the head: the command at the front of the queue is the only one
//! ever eligible for timeout/retry bookkeeping, which keeps per-tick work
//! O(1) instead of O(n) over the whole ring.

use heapless::Deque;
use protocol::Packet;

use crate::config::{COMMAND_TIMEOUT_US, MAX_RETRIES};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn pkt(opcode: u8) -> Packet {
        Packet::new(opcode, &[]).expect("empty payload always fits")
    }

    #[test]
    fn enqueue_then_drain_emits_in_fifo_order() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x01), true).expect("room");
        q.enqueue(pkt(0x02), true).expect("room");

        match q.drain_one(0) {
            DrainResult::Send(cmd) => assert_eq!(cmd.packet.opcode(), 0x01),
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn drain_one_is_idle_when_queue_is_empty() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        assert_eq!(q.drain_one(0), DrainResult::Idle);
    }

    #[test]
    fn complete_removes_head_and_advances_queue() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x01), true).expect("room");
        q.enqueue(pkt(0x02), true).expect("room");
        let _ = q.drain_one(0);

        assert!(q.complete(0x01));
        match q.drain_one(0) {
            DrainResult::Send(cmd) => assert_eq!(cmd.packet.opcode(), 0x02),
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn complete_with_mismatched_opcode_is_a_no_op() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x01), true).expect("room");
        let _ = q.drain_one(0);

        assert!(!q.complete(0x99));
        // still pending, not completed
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn head_is_retried_after_timeout_elapses() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x01), true).expect("room");
        let _ = q.drain_one(0);

        // Not yet timed out.
        assert_eq!(q.drain_one(COMMAND_TIMEOUT_US - 1), DrainResult::AwaitingResponse);

        match q.drain_one(COMMAND_TIMEOUT_US) {
            DrainResult::Retry(cmd) => assert_eq!(cmd.packet.opcode(), 0x01),
            other => panic!("expected Retry, got {other:?}"),
        }
    }

    #[test]
    fn command_is_reaped_after_exceeding_max_retries() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x01), true).expect("room");

        let mut now = 0u64;
        let _ = q.drain_one(now);
        for _ in 0..MAX_RETRIES {
            now += COMMAND_TIMEOUT_US;
            match q.drain_one(now) {
                DrainResult::Retry(_) => {}
                other => panic!("expected Retry, got {other:?}"),
            }
        }

        now += COMMAND_TIMEOUT_US;
        match q.drain_one(now) {
            DrainResult::Exhausted(cmd) => assert_eq!(cmd.packet.opcode(), 0x01),
            other => panic!("expected Exhausted, got {other:?}"),
        }
        // The exhausted command has been reaped; queue is now empty.
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn commands_not_requiring_ack_are_sent_once_and_immediately_complete() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x00), false).expect("room");

        match q.drain_one(0) {
            DrainResult::SendNoAck(cmd) => assert_eq!(cmd.packet.opcode(), 0x00),
            other => panic!("expected SendNoAck, got {other:?}"),
        }
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn enqueue_rejects_when_ring_is_full() {
        let mut q: CommandQueue<2> = CommandQueue::new();
        q.enqueue(pkt(0x01), true).expect("room");
        q.enqueue(pkt(0x02), true).expect("room");
        assert_eq!(q.enqueue(pkt(0x03), true), Err(QueueError::Full));
    }

    #[test]
    fn enqueue_priority_jumps_ahead_of_already_queued_commands() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x21), true).expect("room");
        q.enqueue_priority(pkt(0x01), true).expect("room");

        match q.drain_one(0) {
            DrainResult::Send(cmd) => assert_eq!(cmd.packet.opcode(), 0x01),
            other => panic!("expected the priority command first, got {other:?}"),
        }
    }

    #[test]
    fn defer_head_holds_the_head_command_past_a_short_backoff() {
        // Base time set well above COMMAND_TIMEOUT_US, matching any real
        // epoch: `defer_head` rewinds `last_sent_at_us` under the hood, which
        // only has room to do so once the clock has run past one full
        // command-timeout window.
        let base = COMMAND_TIMEOUT_US + 10_000;
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x21), true).expect("room");
        let _ = q.drain_one(base);

        q.defer_head(0x21, base, 5_000);
        assert_eq!(q.drain_one(base + 4_999), DrainResult::AwaitingResponse);
        match q.drain_one(base + 5_000) {
            DrainResult::Retry(cmd) => assert_eq!(cmd.packet.opcode(), 0x21),
            other => panic!("expected Retry once the backoff elapses, got {other:?}"),
        }
    }

    #[test]
    fn defer_head_is_a_no_op_when_opcode_does_not_match_the_head() {
        let mut q: CommandQueue<4> = CommandQueue::new();
        q.enqueue(pkt(0x21), true).expect("room");
        let _ = q.drain_one(0);

        q.defer_head(0x99, 0, 5_000);
        assert_eq!(q.drain_one(COMMAND_TIMEOUT_US - 1), DrainResult::AwaitingResponse);
    }
}

/// Errors returned by [`CommandQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum QueueError {
    /// The ring is at capacity; caller should apply backpressure.
    #[error("command queue is full")]
    Full,
}

/// A command in flight, tracked for retry/timeout purposes.
#[derive(Debug, Clone)]
pub struct QueuedCommand {
    /// The wire packet to (re)send.
    pub packet: Packet,
    /// Whether the destination is expected to answer with ACK/ERROR.
    pub requires_ack: bool,
    /// Timestamp (µs) the command was first sent, for total-budget accounting.
    pub first_sent_at_us: Option<u64>,
    /// Timestamp (µs) of the most recent send, for timeout accounting.
    pub last_sent_at_us: Option<u64>,
    /// Number of resends so far (0 on first send).
    pub retry_count: u8,
}

impl QueuedCommand {
    fn new(packet: Packet, requires_ack: bool) -> Self {
        Self { packet, requires_ack, first_sent_at_us: None, last_sent_at_us: None, retry_count: 0 }
    }
}

/// Outcome of a single [`CommandQueue::drain_one`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    /// Nothing queued.
    Idle,
    /// Head command is in flight, awaiting its response or its next timeout.
    AwaitingResponse,
    /// Head command has never been sent; caller should transmit it and
    /// expect a response.
    Send(QueuedCommand),
    /// Head command does not require acknowledgment; caller should transmit
    /// it. The command has already been removed from the queue.
    SendNoAck(QueuedCommand),
    /// Head command's timeout elapsed with no response; caller should
    /// retransmit the same packet.
    Retry(QueuedCommand),
    /// Head command exceeded [`crate::config::MAX_RETRIES`]; caller should
    /// surface a fault. The command has already been removed from the queue.
    Exhausted(QueuedCommand),
}

/// A bounded per-destination FIFO command queue.
///
/// `N` is the ring capacity — use [`crate::config::DEFAULT_QUEUE_CAPACITY`]
/// or [`crate::config::LARGE_QUEUE_CAPACITY`] unless a node has a reason to
/// size differently.
pub struct CommandQueue<const N: usize> {
    ring: Deque<QueuedCommand, N>,
}

impl<const N: usize> CommandQueue<N> {
    /// Create an empty queue.
    #[must_use]
    pub const fn new() -> Self {
        Self { ring: Deque::new() }
    }

    /// Number of commands currently queued (including the in-flight head).
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// `true` if no commands are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Append a command to the back of the queue.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the ring is at capacity `N`.
    pub fn enqueue(&mut self, packet: Packet, requires_ack: bool) -> Result<(), QueueError> {
        self.ring.push_back(QueuedCommand::new(packet, requires_ack)).map_err(|_| QueueError::Full)
    }

    /// Insert a command at the head of the queue, ahead of anything already
    /// waiting.
    ///
    /// Used for the memory-exhausted recovery policy (§4.8): a high-priority
    /// cleanup command must jump the line rather than wait behind whatever
    /// is already queued for that destination.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::Full`] if the ring is at capacity `N`.
    pub fn enqueue_priority(&mut self, packet: Packet, requires_ack: bool) -> Result<(), QueueError> {
        self.ring.push_front(QueuedCommand::new(packet, requires_ack)).map_err(|_| QueueError::Full)
    }

    /// Advance the head of the queue given the current time.
    ///
    /// Call once per master tick per destination. The caller is responsible
    /// for actually transmitting the packet in `Send`/`SendNoAck`/`Retry`
    /// results; this method only tracks bookkeeping state.
    pub fn drain_one(&mut self, now_us: u64) -> DrainResult {
        let Some(head) = self.ring.front_mut() else {
            return DrainResult::Idle;
        };

        if head.last_sent_at_us.is_none() {
            head.first_sent_at_us = Some(now_us);
            head.last_sent_at_us = Some(now_us);
            let cmd = head.clone();
            if cmd.requires_ack {
                return DrainResult::Send(cmd);
            }
            // No response expected: send once and retire immediately.
            let sent = self.ring.pop_front().unwrap_or(cmd);
            return DrainResult::SendNoAck(sent);
        }

        // Safety: checked is_none() above in the branch that returns early.
        #[allow(clippy::unwrap_used)]
        let last_sent = head.last_sent_at_us.unwrap();
        let elapsed = now_us.saturating_sub(last_sent);
        if elapsed < COMMAND_TIMEOUT_US {
            return DrainResult::AwaitingResponse;
        }

        if head.retry_count >= MAX_RETRIES {
            // Safety: front_mut() above proved the queue is non-empty.
            #[allow(clippy::unwrap_used)]
            let exhausted = self.ring.pop_front().unwrap();
            return DrainResult::Exhausted(exhausted);
        }

        head.retry_count = head.retry_count.saturating_add(1);
        head.last_sent_at_us = Some(now_us);
        DrainResult::Retry(head.clone())
    }

    /// Report that a response arrived for `opcode`. Removes the head of the
    /// queue if and only if its packet's opcode matches; returns whether a
    /// command was completed.
    ///
    /// This does not itself interpret ACK vs. ERROR — callers route the
    /// response first (`proto_core::router`) and call this once they know
    /// the command is settled.
    pub fn complete(&mut self, opcode: u8) -> bool {
        let matches = self.ring.front().is_some_and(|head| head.packet.opcode() == opcode);
        if matches {
            let _ = self.ring.pop_front();
        }
        matches
    }

    /// Hold the head command (matching `opcode`) for `backoff_us` before it
    /// becomes retry-eligible again, without completing it.
    ///
    /// Used for the busy backoff policy (§4.8): a `busy` response should not
    /// retire the entry, just delay the next send attempt. This is
    /// implemented by rewinding `last_sent_at_us` so the existing
    /// timeout/retry check in [`Self::drain_one`] fires after `backoff_us`
    /// rather than after the full [`crate::config::COMMAND_TIMEOUT_US`] —
    /// there is no separate backoff timer field on [`QueuedCommand`]. A
    /// no-op if the queue is empty or its head no longer matches `opcode`
    /// (the response arrived for a command that already moved on).
    pub fn defer_head(&mut self, opcode: u8, now_us: u64, backoff_us: u64) {
        let Some(head) = self.ring.front_mut() else {
            return;
        };
        if head.packet.opcode() != opcode {
            return;
        }
        let rewound = now_us.saturating_add(backoff_us).saturating_sub(COMMAND_TIMEOUT_US);
        head.last_sent_at_us = Some(rewound);
    }
}

impl<const N: usize> Default for CommandQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
