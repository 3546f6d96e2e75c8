//! Protocol tunables.
//!
//! All timing/retry constants from spec §3, §4.3, §4.4, §4.7, §4.8 live
//! here as named constants, following the teacher's `platform::config`
//! pattern of centralising values that would otherwise be scattered magic
//! numbers.

/// Deadline for a `requires_ack = true` command before it is retried (§4.3).
pub const COMMAND_TIMEOUT_US: u64 = 50_000;

/// Maximum resends for an acknowledged command before it is retired with an
/// error (§4.3, §8 "retry budget").
pub const MAX_RETRIES: u8 = 3;

/// Worst-case time budget for a single command:
/// `(MAX_RETRIES + 1) * COMMAND_TIMEOUT_US` (§5).
#[allow(clippy::arithmetic_side_effects)] // (3 + 1) * 50_000 is a compile-time constant, far from u64::MAX
pub const COMMAND_BUDGET_US: u64 = (MAX_RETRIES as u64 + 1) * COMMAND_TIMEOUT_US;

/// Default ring capacity for a per-destination command queue (§3).
pub const DEFAULT_QUEUE_CAPACITY: usize = 128;

/// Larger-RAM variant queue capacity (§3).
pub const LARGE_QUEUE_CAPACITY: usize = 256;

/// Default interval between clock-sync beacons (§4.7).
pub const SYNC_INTERVAL_US: u64 = 1_000_000;

/// Maximum outbound commands drained per queue per master tick (§4.4 step 2).
pub const DRAIN_BATCH_CEILING: usize = 10;

/// Minimum backoff after a `busy` response before the next drain attempt
/// on that queue (§4.8).
pub const BUSY_BACKOFF_US: u64 = 5_000;

/// Consecutive health-check ping failures before a slave is marked
/// unhealthy and the master transitions to degraded (§4.8).
pub const HEALTH_CHECK_FAILURE_THRESHOLD: u8 = 3;

/// Bounded timeout for a slave's `emit()` waiting on chip-select (§4.2).
pub const EMIT_TIMEOUT_US: u64 = 10_000;

/// Minimum VSYNC low-pulse width (§4.5 step 4, §6).
pub const VSYNC_PULSE_MIN_US: u32 = 10;

/// Capacity of the master-side recent-error ring (§3 `ErrorRecord`).
pub const ERROR_RING_CAPACITY: usize = 32;

/// Minimum pause after deinitializing a link before reinitializing it, part
/// of the communication-failure recovery sequence (§4.8).
pub const LINK_RESET_PAUSE_US: u64 = 10_000;

/// Minimum low-pulse width for a slave's physical reset line, part of the
/// communication-failure recovery sequence (§4.8).
pub const LINK_RESET_PULSE_US: u64 = 10;

/// Minimum wait after pulsing a slave's reset line before the first
/// post-reset health-check ping, part of the communication-failure
/// recovery sequence (§4.8).
pub const LINK_RESET_BOOT_WAIT_US: u64 = 50_000;
