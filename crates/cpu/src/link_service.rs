//! The link-service loop: drains one destination's command queue and
//! performs the link transaction, routing whatever comes back.
//!
//! One instance of this loop runs per destination (GPU, APU); both share
//! the same [`proto_core::MasterNode`] behind a mutex so the application
//! task can enqueue commands concurrently. Each tick drains up to
//! [`proto_core::config::DRAIN_BATCH_CEILING`] ready commands before
//! yielding, and enqueues its own `NOP` health-check ping whenever the link
//! has gone quiet for [`crate::config::HEALTH_PING_INTERVAL_US`] (spec §4.8
//! "health-check ping").

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};
use proto_core::config::{DRAIN_BATCH_CEILING, EMIT_TIMEOUT_US};
use proto_core::link::{self, MasterLink};
use proto_core::node::MasterNode;
use proto_core::queue::DrainResult;
use proto_core::Destination;
use protocol::opcode::control;
use protocol::Packet;

use crate::config::HEALTH_PING_INTERVAL_US;

/// Run the link-service loop for `destination` forever.
///
/// Call this from a dedicated embassy task per destination. `link` performs
/// the actual chip-select/data-ready transaction; `node` is shared with the
/// application task via a mutex. `now_us` is the node's monotonic
/// microsecond clock source — hardware builds pass
/// `|| embassy_time::Instant::now().as_micros()`; the `sim` crate passes
/// its own virtual clock accessor.
pub async fn run<const N: usize, M, L, F>(
    node: &Mutex<M, MasterNode<N>>,
    destination: Destination,
    mut link: L,
    now_us: F,
) -> !
where
    M: RawMutex,
    L: MasterLink,
    F: Fn() -> u64,
{
    let mut last_activity_us = now_us();
    let mut ping_in_flight = false;

    loop {
        for _ in 0..DRAIN_BATCH_CEILING {
            let drain = {
                let mut node = node.lock().await;
                node.drain(destination, now_us())
            };

            match drain {
                DrainResult::Idle | DrainResult::AwaitingResponse => break,
                DrainResult::Send(cmd) | DrainResult::Retry(cmd) => {
                    last_activity_us = now_us();
                    let is_ping = ping_in_flight && cmd.packet.opcode() == control::NOP;
                    match link::transact(&mut link, &cmd.packet, EMIT_TIMEOUT_US).await {
                        Ok(response) => {
                            let mut node = node.lock().await;
                            if is_ping {
                                ping_in_flight = false;
                                node.on_ping_success(destination, now_us());
                            }
                            let _ = node.on_response(destination, &response, now_us());
                        }
                        Err(_) => {
                            // Distinct from an ordinary unanswered command: the
                            // fault manager also hears that the link itself
                            // faulted, not just that this one command timed
                            // out. `drain_one`'s own timeout/retry bookkeeping
                            // still applies to the command on the next tick.
                            let mut node = node.lock().await;
                            node.on_link_fault(destination, now_us());
                            if is_ping {
                                ping_in_flight = false;
                                node.on_ping_failure(destination, now_us());
                            }
                            if !node.health(destination).is_healthy() {
                                drop(node);
                                // Communication-failure recovery (§4.8): deinit,
                                // pause, reinit, pulse the slave's reset line,
                                // wait for it to boot. `MasterLink::reset`
                                // implements the timing; a fresh ping on the
                                // next tick reports whether it worked.
                                let _ = link.reset().await;
                            }
                        }
                    }
                }
                DrainResult::SendNoAck(cmd) => {
                    last_activity_us = now_us();
                    let _ = link::transact(&mut link, &cmd.packet, EMIT_TIMEOUT_US).await;
                }
                DrainResult::Exhausted(_) => {
                    last_activity_us = now_us();
                    let mut node = node.lock().await;
                    node.on_command_exhausted(destination, now_us());
                }
            }
        }

        if !ping_in_flight && now_us().saturating_sub(last_activity_us) >= HEALTH_PING_INTERVAL_US {
            #[allow(clippy::expect_used)] // infallible: empty payload always fits
            let ping = Packet::new(control::NOP, &[]).expect("empty payload always fits");
            let queued = {
                let mut node = node.lock().await;
                node.enqueue(destination, ping, true)
            };
            if queued.is_ok() {
                ping_in_flight = true;
                last_activity_us = now_us();
            }
        }

        Timer::after(Duration::from_micros(crate::config::APPLICATION_TICK_US)).await;
    }
}
