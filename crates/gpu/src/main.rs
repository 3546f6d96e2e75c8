//! GPU node entry point. See `cpu::main` for the general hardware/sim
//! feature-gating approach; this mirrors it on the slave side.

#![cfg_attr(feature = "hardware", no_std)]
#![cfg_attr(feature = "hardware", no_main)]

#[cfg(feature = "hardware")]
mod hardware_main {
    use embassy_executor::Spawner;
    use embassy_rp::gpio::{Input, Level, Output, Pull};
    use embassy_rp::spi::{Config as SpiConfig, Spi};
    use gpu::GpuCommandHandler;
    use panic_probe as _;
    use proto_core::node::SlaveNode;

    #[embassy_executor::task]
    async fn service_task(
        link: crate::hardware::SpiSlaveLink<'static, embassy_rp::peripherals::SPI0>,
        vsync: crate::hardware::RpVsyncPin,
    ) {
        gpu::slave_service::run(link, SlaveNode::new(), GpuCommandHandler::new(), vsync, || {
            embassy_time::Instant::now().as_micros()
        })
        .await
    }

    #[embassy_executor::main]
    pub async fn main(spawner: Spawner) {
        defmt::info!("triboy gpu: booting");
        let p = embassy_rp::init(Default::default());

        let cs = Input::new(p.PIN_5, Pull::Up);
        let data_ready = Output::new(p.PIN_7, Level::Low);
        let spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_4, SpiConfig::default());
        let vsync = Output::new(p.PIN_9, Level::High);

        spawner
            .spawn(service_task(
                crate::hardware::SpiSlaveLink::new(spi, cs, data_ready),
                crate::hardware::RpVsyncPin::new(vsync),
            ))
            .ok();
    }
}

#[cfg(feature = "hardware")]
mod hardware {
    //! RP2040 `SlaveLink` wiring — mirrors `cpu::hardware::SpiMasterLink`
    //! but waits for the chip-select input rather than driving it, and
    //! additionally drives the dedicated VSYNC output pin.

    use embassy_rp::gpio::{Input, Output};
    use embassy_rp::spi::{Blocking, Instance, Spi};
    use embassy_time::{Duration, Timer};
    use proto_core::config::VSYNC_PULSE_MIN_US;
    use protocol::Packet;

    /// A GPU link backed by a blocking RP2040 SPI peripheral, the
    /// master-driven chip-select input, and this node's data-ready output.
    pub struct SpiSlaveLink<'d, T: Instance> {
        spi: Spi<'d, T, Blocking>,
        cs: Input<'d>,
        data_ready: Output<'d>,
    }

    impl<'d, T: Instance> SpiSlaveLink<'d, T> {
        /// Wrap an initialized SPI peripheral, chip-select input, and
        /// data-ready output.
        pub fn new(spi: Spi<'d, T, Blocking>, cs: Input<'d>, data_ready: Output<'d>) -> Self {
            Self { spi, cs, data_ready }
        }
    }

    impl<T: Instance> proto_core::link::SlaveLink for SpiSlaveLink<'_, T> {
        type Error = embassy_rp::spi::Error;

        async fn receive(&mut self) -> Result<Packet, proto_core::link::LinkError<Self::Error>> {
            use proto_core::link::LinkError;

            self.cs.wait_for_low().await;
            let mut header = [0u8; 2];
            self.spi.blocking_read(&mut header).map_err(LinkError::Peripheral)?;
            let (_, remaining) =
                protocol::frame::decode_header(header[0], header[1]).map_err(LinkError::Framing)?;
            let mut rest = [0u8; protocol::MAX_PAYLOAD_LEN];
            let rest_slice = rest
                .get_mut(..usize::from(remaining))
                .ok_or(LinkError::Framing(protocol::PacketError::BufferTooShort))?;
            self.spi.blocking_read(rest_slice).map_err(LinkError::Peripheral)?;

            let mut full = heapless::Vec::<u8, { protocol::MAX_PACKET_LEN }>::new();
            let _ = full.extend_from_slice(&header);
            let _ = full.extend_from_slice(rest_slice);
            Packet::parse(&full).map_err(LinkError::Framing)
        }

        async fn emit(&mut self, packet: &Packet) -> Result<(), proto_core::link::LinkError<Self::Error>> {
            use proto_core::link::LinkError;
            let bytes = packet.as_bytes();
            self.data_ready.set_high();
            let result = self.spi.blocking_write(&bytes).map_err(LinkError::Peripheral);
            self.data_ready.set_low();
            result
        }
    }

    /// The GPU's dedicated VSYNC output pin.
    pub struct RpVsyncPin {
        pin: Output<'static>,
    }

    impl RpVsyncPin {
        /// Wrap an initialized, idle-high output pin.
        pub fn new(pin: Output<'static>) -> Self {
            Self { pin }
        }
    }

    impl crate::slave_service::VsyncPin for RpVsyncPin {
        async fn pulse(&mut self) {
            self.pin.set_low();
            Timer::after(Duration::from_micros(u64::from(VSYNC_PULSE_MIN_US))).await;
            self.pin.set_high();
        }
    }
}

#[cfg(feature = "sim")]
fn main() {
    tracing_subscriber::fmt::init();
    tracing::info!("triboy gpu: sim-feature binary has no standalone entry point; see the `sim` crate's scenario tests");
}

#[cfg(not(any(feature = "hardware", feature = "sim")))]
fn main() {
    eprintln!("build with --features hardware or --features sim");
}
