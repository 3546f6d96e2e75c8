//! CPU-node tunables layered on top of [`proto_core::config`].

/// Ping interval for each slave's health check, when no command traffic is
/// otherwise keeping the link exercised.
pub const HEALTH_PING_INTERVAL_US: u64 = 250_000;

/// Application-task tick interval (bounds latency of queue drains and VSYNC
/// polling when no link interrupt has woken the task).
pub const APPLICATION_TICK_US: u64 = 1_000;
