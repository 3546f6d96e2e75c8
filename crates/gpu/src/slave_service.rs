//! The slave-service loop: services inbound commands and drives the
//! display-retrace path (spec §3, §4.5, §4.9).
//!
//! Unlike the APU, the GPU has a second event source besides the link: its
//! own display retrace. Each tick races an inbound command against the
//! retrace interval; whichever completes first is handled, then the loop
//! goes back to racing. A retrace always pulses the dedicated VSYNC pin,
//! and additionally emits the in-band `VSYNC` packet when the master has
//! opted in via `SET_VBLANK_CALLBACK`.

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Timer};
use proto_core::link::SlaveLink;
use proto_core::node::{CommandHandler, SlaveNode};
use protocol::{opcode::control, Packet};

use crate::config::RETRACE_INTERVAL_US;

/// The dedicated VSYNC output pin: active-low pulse of at least
/// [`proto_core::config::VSYNC_PULSE_MIN_US`] on every display retrace.
pub trait VsyncPin {
    /// Pulse the pin low then high for one retrace.
    fn pulse(&mut self) -> impl core::future::Future<Output = ()>;
}

/// A [`CommandHandler`] that can report whether in-band VSYNC delivery has
/// been enabled (spec §4.9 "opt-in in-band mechanism").
pub trait VblankAware: CommandHandler {
    /// Whether `SET_VBLANK_CALLBACK` most recently enabled in-band VSYNC.
    fn vblank_callback_enabled(&self) -> bool;
}

impl VblankAware for crate::GpuCommandHandler {
    fn vblank_callback_enabled(&self) -> bool {
        Self::vblank_callback_enabled(self)
    }
}

/// Run the slave-service loop forever.
///
/// `now_us` supplies the node's monotonic microsecond clock, the same way
/// `cpu::link_service::run` takes one.
pub async fn run<L, H, V, F>(mut link: L, mut node: SlaveNode, mut handler: H, mut vsync: V, now_us: F) -> !
where
    L: SlaveLink,
    H: VblankAware,
    V: VsyncPin,
    F: Fn() -> u64,
{
    loop {
        let retrace = Timer::after(Duration::from_micros(RETRACE_INTERVAL_US));
        match select(link.receive(), retrace).await {
            Either::First(Ok(packet)) => {
                let response = node.respond_to(&mut handler, &packet, now_us());
                let _ = link.emit(&response).await;
            }
            Either::First(Err(_)) => {}
            Either::Second(()) => {
                vsync.pulse().await;
                if handler.vblank_callback_enabled() {
                    #[allow(clippy::expect_used)] // infallible: 2-byte payload always fits
                    let notice = Packet::new(control::VSYNC, &[0x00, 0x00]).expect("vsync payload always fits");
                    let _ = link.emit(&notice).await;
                }
            }
        }
    }
}
