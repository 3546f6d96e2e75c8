//! A std/tokio duplex transport connecting one simulated master end to one
//! simulated slave end, for cross-node integration scenarios. Structurally
//! the same idea as `proto_core::link::mock` (two inboxes, one per
//! direction) but backed by `tokio::sync::Mutex` + `VecDeque` rather than a
//! `no_std` `RefCell` + `heapless::Deque`, since `sim` never targets a
//! microcontroller.

use std::collections::VecDeque;
use std::sync::Arc;

use proto_core::link::{LinkError, MasterLink, SlaveLink};
use protocol::Packet;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Infallible;

#[derive(Default)]
struct Inbox {
    packets: VecDeque<Packet>,
}

struct Shared {
    to_slave: Mutex<Inbox>,
    to_master: Mutex<Inbox>,
}

/// The master-facing end of a simulated link.
pub struct MasterEnd {
    shared: Arc<Shared>,
}

/// The slave-facing end of a simulated link.
pub struct SlaveEnd {
    shared: Arc<Shared>,
}

/// A connected pair of simulated link ends.
pub struct DuplexLink;

impl DuplexLink {
    /// Build a connected `(master, slave)` pair.
    #[must_use]
    pub fn pair() -> (MasterEnd, SlaveEnd) {
        let shared = Arc::new(Shared { to_slave: Mutex::new(Inbox::default()), to_master: Mutex::new(Inbox::default()) });
        (MasterEnd { shared: shared.clone() }, SlaveEnd { shared })
    }
}

impl MasterLink for MasterEnd {
    type Error = Infallible;

    async fn send(&mut self, packet: &Packet) -> Result<(), LinkError<Self::Error>> {
        tracing::trace!(opcode = packet.opcode(), "master send");
        self.shared.to_slave.lock().await.packets.push_back(packet.clone());
        Ok(())
    }

    async fn poll_ready(&mut self, _timeout_us: u64) -> Result<bool, LinkError<Self::Error>> {
        // The sim transport has no real clock to time out against; the
        // paired slave task is always driven to completion in the same
        // `tokio::join!`, so waiting without a deadline never hangs a test.
        loop {
            if !self.shared.to_master.lock().await.packets.is_empty() {
                return Ok(true);
            }
            tokio::task::yield_now().await;
        }
    }

    async fn receive(&mut self) -> Result<Packet, LinkError<Self::Error>> {
        loop {
            if let Some(response) = self.shared.to_master.lock().await.packets.pop_front() {
                tracing::trace!(opcode = response.opcode(), "master receive");
                return Ok(response);
            }
            tokio::task::yield_now().await;
        }
    }

    async fn reset(&mut self) -> Result<(), LinkError<Self::Error>> {
        self.shared.to_slave.lock().await.packets.clear();
        self.shared.to_master.lock().await.packets.clear();
        Ok(())
    }
}

impl SlaveLink for SlaveEnd {
    type Error = Infallible;

    async fn receive(&mut self) -> Result<Packet, LinkError<Self::Error>> {
        loop {
            if let Some(packet) = self.shared.to_slave.lock().await.packets.pop_front() {
                return Ok(packet);
            }
            tokio::task::yield_now().await;
        }
    }

    async fn emit(&mut self, packet: &Packet) -> Result<(), LinkError<Self::Error>> {
        self.shared.to_master.lock().await.packets.push_back(packet.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proto_core::config::EMIT_TIMEOUT_US;
    use proto_core::link::transact;

    #[tokio::test]
    async fn request_reaches_slave_and_response_reaches_master() {
        let (mut master, mut slave) = DuplexLink::pair();
        let request = Packet::new(0x01, &[]).expect("empty payload fits");

        let master_fut = transact(&mut master, &request, EMIT_TIMEOUT_US);
        let slave_fut = async {
            let received = slave.receive().await.expect("receive");
            assert_eq!(received.opcode(), 0x01);
            let ack = Packet::new(protocol::opcode::control::ACK, &[0x01, 0x00]).expect("ack fits");
            slave.emit(&ack).await.expect("emit");
        };

        let (master_result, ()) = tokio::join!(master_fut, slave_fut);
        assert_eq!(master_result.expect("transact succeeds").opcode(), protocol::opcode::control::ACK);
    }
}
