//! GPU-local tunables not shared with the other nodes.

/// Interval between simulated/actual display retraces — a 60 Hz refresh
/// (spec §4.5 step 4 "on each simulated/actual display retrace").
pub const RETRACE_INTERVAL_US: u64 = 16_667;
