//! Link driver: framing a [`Packet`] over the three-signal bus and back
//! (spec §3, §4.2).
//!
//! The physical link is chip-select-qualified SPI plus a second,
//! independent data-ready line: the master asserts chip-select and writes
//! a command, the slave raises data-ready once its response bytes are
//! queued, and the master reads the response and deasserts chip-select.
//! GPU links carry a third, dedicated VSYNC pin entirely outside this
//! trait — see `gpu::slave_service`.
//!
//! Two roles, two traits, split along that signal boundary rather than
//! bundled into one blind request/response call: `MasterLink::send` only
//! ever drives chip-select and the write half, `poll_ready` only ever
//! samples data-ready, and `receive` only ever reads back. This lets a
//! caller (`cpu::link_service`) time out on data-ready without tearing
//! down the whole transaction, and lets the mock/sim backings implement
//! each signal with whatever primitive fits (a pin read on hardware, a
//! non-empty check on an in-process queue). Both traits are expressed with
//! return-position `impl Future`, not native `async fn` in a trait, to
//! keep object-safety available to callers that need it.

use protocol::{Packet, PacketError};

/// Errors from a link transaction, generic over the underlying peripheral's
/// own error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
pub enum LinkError<E: core::fmt::Debug> {
    /// The SPI peripheral reported an error.
    #[error("peripheral error")]
    Peripheral(E),
    /// A read or write did not complete within the link's deadline.
    #[error("link operation timed out")]
    Timeout,
    /// Bytes were exchanged but did not form a valid packet.
    #[error("malformed packet on the wire")]
    Framing(PacketError),
}

impl<E: core::fmt::Debug> From<PacketError> for LinkError<E> {
    fn from(err: PacketError) -> Self {
        LinkError::Framing(err)
    }
}

/// Master-side link: one per slave destination (GPU, APU).
pub trait MasterLink {
    /// The underlying peripheral's error type.
    type Error: core::fmt::Debug;

    /// Assert chip-select and write `packet` onto the bus. Does not wait
    /// for a response; pair with [`Self::poll_ready`] and [`Self::receive`].
    fn send(&mut self, packet: &Packet) -> impl core::future::Future<Output = Result<(), LinkError<Self::Error>>>;

    /// Sample the data-ready line, returning once it is asserted or
    /// `timeout_us` has elapsed without it. `Ok(false)` means the deadline
    /// passed with no response queued.
    fn poll_ready(&mut self, timeout_us: u64) -> impl core::future::Future<Output = Result<bool, LinkError<Self::Error>>>;

    /// Read back the destination's response packet and deassert
    /// chip-select. Only meaningful after [`Self::poll_ready`] returns
    /// `Ok(true)`.
    fn receive(&mut self) -> impl core::future::Future<Output = Result<Packet, LinkError<Self::Error>>>;

    /// Deinitialize and reinitialize the link, pulsing the slave's reset
    /// line, as the first step of communication-failure recovery (§4.8).
    /// Implementations must hold the link deinitialized for at least
    /// [`crate::config::LINK_RESET_PAUSE_US`] and wait at least
    /// [`crate::config::LINK_RESET_BOOT_WAIT_US`] after reinitializing
    /// before returning, so the caller's first post-reset ping lands after
    /// the slave has had time to reboot.
    fn reset(&mut self) -> impl core::future::Future<Output = Result<(), LinkError<Self::Error>>>;
}

/// Drive one full master-side request/response exchange: send, wait on
/// data-ready up to `timeout_us`, then read the response.
///
/// This is the composition every `MasterLink` caller wants; it is a free
/// function rather than a default trait method so the three-step shape
/// stays visible at the call site in `cpu::link_service`.
///
/// # Errors
///
/// Propagates [`LinkError`] from any of the three steps, plus
/// [`LinkError::Timeout`] if `poll_ready` never sees data-ready assert.
pub async fn transact<L: MasterLink>(
    link: &mut L,
    packet: &Packet,
    timeout_us: u64,
) -> Result<Packet, LinkError<L::Error>> {
    link.send(packet).await?;
    if !link.poll_ready(timeout_us).await? {
        return Err(LinkError::Timeout);
    }
    link.receive().await
}

/// Slave-side link: exactly one per node (GPU, APU each have one).
pub trait SlaveLink {
    /// The underlying peripheral's error type.
    type Error: core::fmt::Debug;

    /// Block until the master asserts chip-select and sends a complete
    /// packet.
    fn receive(&mut self) -> impl core::future::Future<Output = Result<Packet, LinkError<Self::Error>>>;

    /// Raise data-ready and write `packet`. Used uniformly for command
    /// responses (ACK/ERROR, spec §4.5) and for the GPU's unsolicited
    /// in-band VSYNC notification (spec §4.9) — both are just a packet the
    /// slave pushes onto the same signal path.
    fn emit(&mut self, packet: &Packet) -> impl core::future::Future<Output = Result<(), LinkError<Self::Error>>>;
}

/// In-memory link pair for host-side tests and the desktop simulator.
///
/// Each side writes into the other's inbound queue; `MockLink::paired()`
/// builds a connected master/slave pair. Chip-select/data-ready have no
/// separate physical meaning here: `send`/`emit` push onto the queue,
/// `poll_ready`/`receive` observe it.
pub mod mock {
    use heapless::Deque;
    use protocol::Packet;

    use super::{LinkError, MasterLink, SlaveLink};

    const MOCK_QUEUE_DEPTH: usize = 8;

    /// Shared error type for [`MockMasterLink`]/[`MockSlaveLink`] — the mock
    /// peripheral itself cannot fail, only the protocol framing can.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Infallible;

    /// One direction of a mock link: a bounded inbox the peer writes into.
    #[derive(Default)]
    struct Inbox {
        packets: Deque<Packet, MOCK_QUEUE_DEPTH>,
    }

    /// Master end of an in-process link.
    pub struct MockMasterLink<'a> {
        to_slave: &'a core::cell::RefCell<Inbox>,
        to_master: &'a core::cell::RefCell<Inbox>,
    }

    /// Slave end of an in-process link.
    pub struct MockSlaveLink<'a> {
        to_slave: &'a core::cell::RefCell<Inbox>,
        to_master: &'a core::cell::RefCell<Inbox>,
    }

    /// Backing storage for a connected mock link pair. Keeping this
    /// separate from the master/slave handles lets both borrow it for the
    /// lifetime of a test without a `static`.
    #[derive(Default)]
    pub struct MockLinkStorage {
        to_slave: core::cell::RefCell<Inbox>,
        to_master: core::cell::RefCell<Inbox>,
    }

    impl MockLinkStorage {
        /// Create empty backing storage for a mock link pair.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Build a connected master/slave pair borrowing this storage.
        #[must_use]
        pub fn split(&self) -> (MockMasterLink<'_>, MockSlaveLink<'_>) {
            (
                MockMasterLink { to_slave: &self.to_slave, to_master: &self.to_master },
                MockSlaveLink { to_slave: &self.to_slave, to_master: &self.to_master },
            )
        }
    }

    impl MasterLink for MockMasterLink<'_> {
        type Error = Infallible;

        async fn send(&mut self, packet: &Packet) -> Result<(), LinkError<Self::Error>> {
            self.to_slave.borrow_mut().packets.push_back(packet.clone()).map_err(|_| LinkError::Timeout)
        }

        async fn poll_ready(&mut self, _timeout_us: u64) -> Result<bool, LinkError<Self::Error>> {
            // Host-side mock: the paired slave is expected to be driven
            // synchronously by the same test/executor before this future is
            // polled again, so there is no real deadline to honor.
            loop {
                if !self.to_master.borrow().packets.is_empty() {
                    return Ok(true);
                }
                embassy_futures::yield_now().await;
            }
        }

        async fn receive(&mut self) -> Result<Packet, LinkError<Self::Error>> {
            loop {
                if let Some(response) = self.to_master.borrow_mut().packets.pop_front() {
                    return Ok(response);
                }
                embassy_futures::yield_now().await;
            }
        }

        async fn reset(&mut self) -> Result<(), LinkError<Self::Error>> {
            while self.to_slave.borrow_mut().packets.pop_front().is_some() {}
            while self.to_master.borrow_mut().packets.pop_front().is_some() {}
            Ok(())
        }
    }

    impl SlaveLink for MockSlaveLink<'_> {
        type Error = Infallible;

        async fn receive(&mut self) -> Result<Packet, LinkError<Self::Error>> {
            loop {
                if let Some(packet) = self.to_slave.borrow_mut().packets.pop_front() {
                    return Ok(packet);
                }
                embassy_futures::yield_now().await;
            }
        }

        async fn emit(&mut self, packet: &Packet) -> Result<(), LinkError<Self::Error>> {
            self.to_master
                .borrow_mut()
                .packets
                .push_back(packet.clone())
                .map_err(|_| LinkError::Timeout)?;
            Ok(())
        }
    }

}
