//! The slave-service loop: waits for an inbound command, dispatches it,
//! and writes back the response (spec §3, §4.5). Identical in shape to
//! `gpu::slave_service::run` — the APU has no equivalent of VBLANK to
//! special-case.

use proto_core::link::SlaveLink;
use proto_core::node::{CommandHandler, SlaveNode};

/// Run the slave-service loop forever.
pub async fn run<L, H, F>(mut link: L, mut node: SlaveNode, mut handler: H, now_us: F) -> !
where
    L: SlaveLink,
    H: CommandHandler,
    F: Fn() -> u64,
{
    loop {
        let Ok(packet) = link.receive().await else {
            continue;
        };

        let response = node.respond_to(&mut handler, &packet, now_us());
        let _ = link.emit(&response).await;
    }
}
