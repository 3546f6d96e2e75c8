//! VSYNC event surface (spec §3, §4.5 step 4, §6, §9).
//!
//! The GPU signals frame completion two ways: a dedicated edge-triggered
//! pin and, optionally, an in-band `VSYNC` (`0xFB`) packet sent unsolicited
//! on the link. Both can fire for the same frame; [`VsyncSurface`]
//! deduplicates events that land within [`crate::config::VSYNC_PULSE_MIN_US`]
//! of each other so a caller observes at most one frame-advance per frame
//! window regardless of which path (or both) reported it.

use heapless::Deque;

use crate::config::VSYNC_PULSE_MIN_US;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_then_inband_for_same_frame_dedupes_to_one_advance() {
        let mut surface = VsyncSurface::new();
        surface.on_edge(100);
        surface.on_inband(42, 100 + u64::from(VSYNC_PULSE_MIN_US));

        assert!(surface.take_frame_advance().is_some());
        assert!(surface.take_frame_advance().is_none());
    }

    #[test]
    fn inband_then_edge_for_same_frame_dedupes_to_one_advance() {
        let mut surface = VsyncSurface::new();
        surface.on_inband(7, 0);
        surface.on_edge(5);

        assert!(surface.take_frame_advance().is_some());
        assert!(surface.take_frame_advance().is_none());
    }

    #[test]
    fn distinct_frames_far_apart_each_produce_an_advance() {
        let mut surface = VsyncSurface::new();
        surface.on_inband(1, 0);
        surface.on_inband(2, 1_000);

        assert!(surface.take_frame_advance().is_some());
        assert!(surface.take_frame_advance().is_some());
        assert!(surface.take_frame_advance().is_none());
    }

    #[test]
    fn edges_far_apart_each_produce_an_advance() {
        let mut surface = VsyncSurface::new();
        surface.on_edge(0);
        surface.on_edge(1_000);

        assert!(surface.take_frame_advance().is_some());
        assert!(surface.take_frame_advance().is_some());
        assert!(surface.take_frame_advance().is_none());
    }

    #[test]
    fn last_known_frame_counter_tracks_most_recent_inband_report() {
        let mut surface = VsyncSurface::new();
        assert_eq!(surface.last_frame_counter(), None);
        surface.on_inband(9, 0);
        assert_eq!(surface.last_frame_counter(), Some(9));
    }

    #[test]
    fn attached_advance_carries_the_reported_frame_counter() {
        let mut surface = VsyncSurface::new();
        surface.on_edge(0);
        surface.on_inband(3, 1);
        let advance = surface.take_frame_advance().expect("one advance pending");
        assert_eq!(advance.frame_counter, Some(3));
    }
}

/// A single pending frame-advance notification, deduplicated across the
/// edge and in-band paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAdvance {
    /// Frame counter reported by the in-band path, if any.
    pub frame_counter: Option<u32>,
    /// Timestamp (µs) the event was first observed.
    pub at_us: u64,
}

/// Bounded queue depth for pending, not-yet-taken frame advances.
const PENDING_CAPACITY: usize = 4;

/// Deduplicating VSYNC event surface.
pub struct VsyncSurface {
    pending: Deque<FrameAdvance, PENDING_CAPACITY>,
    last_frame_counter: Option<u32>,
    last_event_at_us: Option<u64>,
    /// `true` while the most recently pushed entry is an edge-only window
    /// (`frame_counter == None`) still eligible to receive an in-band
    /// attachment.
    window_open: bool,
}

impl VsyncSurface {
    /// Create an empty event surface with nothing pending.
    #[must_use]
    pub const fn new() -> Self {
        Self { pending: Deque::new(), last_frame_counter: None, last_event_at_us: None, window_open: false }
    }

    /// The frame counter from the most recent in-band `VSYNC` packet, if any
    /// has ever been received.
    #[must_use]
    pub const fn last_frame_counter(&self) -> Option<u32> {
        self.last_frame_counter
    }

    fn within_debounce(&self, at_us: u64) -> bool {
        self.last_event_at_us.is_some_and(|last| at_us.saturating_sub(last) < u64::from(VSYNC_PULSE_MIN_US))
    }

    /// Report a VSYNC edge observed on the dedicated pin at `at_us`.
    pub fn on_edge(&mut self, at_us: u64) {
        if self.within_debounce(at_us) {
            self.last_event_at_us = Some(at_us);
            return;
        }
        self.last_event_at_us = Some(at_us);
        // Queue is bounded; a burst beyond capacity drops the oldest-pending
        // notification rather than blocking the interrupt path.
        if self.pending.is_full() {
            let _ = self.pending.pop_front();
        }
        let _ = self.pending.push_back(FrameAdvance { frame_counter: None, at_us });
        self.window_open = true;
    }

    /// Report an in-band `VSYNC` packet carrying `frame_counter`, observed
    /// at `at_us`.
    pub fn on_inband(&mut self, frame_counter: u32, at_us: u64) {
        self.last_frame_counter = Some(frame_counter);

        if self.window_open {
            if let Some(back) = self.pending.back_mut() {
                back.frame_counter = Some(frame_counter);
            }
            self.window_open = false;
            self.last_event_at_us = Some(at_us);
            return;
        }

        if self.within_debounce(at_us) {
            self.last_event_at_us = Some(at_us);
            return;
        }

        self.last_event_at_us = Some(at_us);
        if self.pending.is_full() {
            let _ = self.pending.pop_front();
        }
        let _ = self.pending.push_back(FrameAdvance { frame_counter: Some(frame_counter), at_us });
    }

    /// Take the next pending frame-advance notification, if any, oldest first.
    pub fn take_frame_advance(&mut self) -> Option<FrameAdvance> {
        let advance = self.pending.pop_front()?;
        if self.pending.is_empty() {
            self.window_open = false;
        }
        Some(advance)
    }
}

impl Default for VsyncSurface {
    fn default() -> Self {
        Self::new()
    }
}
