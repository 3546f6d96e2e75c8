//! CPU node entry point.
//!
//! Hardware builds (`--features hardware`) target RP2040 via `embassy-rp`
//! and spawn one link-service task per destination plus the application
//! task. The `sim` feature builds a host binary that performs the same
//! startup sequence against in-process mock links — useful for manual
//! exploration; automated end-to-end scenarios live in the `sim` crate's
//! own test suite instead.

#![cfg_attr(feature = "hardware", no_std)]
#![cfg_attr(feature = "hardware", no_main)]

#[cfg(feature = "hardware")]
mod hardware_main {
    use cpu::{MasterNode, SYNC_INTERVAL_US};
    use embassy_executor::Spawner;
    use embassy_futures::select::{select, Either};
    use embassy_rp::gpio::{Input, Level, Output, Pull};
    use embassy_rp::spi::{Config as SpiConfig, Spi};
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_sync::mutex::Mutex;
    use embassy_time::{Duration, Timer};
    use panic_probe as _;
    use proto_core::Destination;
    use static_cell::StaticCell;

    static NODE: StaticCell<Mutex<CriticalSectionRawMutex, MasterNode>> = StaticCell::new();

    #[embassy_executor::task]
    async fn gpu_link_task(
        node: &'static Mutex<CriticalSectionRawMutex, MasterNode>,
        link: crate::hardware::SpiMasterLink<'static, embassy_rp::peripherals::SPI0>,
    ) {
        cpu::link_service::run(node, Destination::Gpu, link, || {
            embassy_time::Instant::now().as_micros()
        })
        .await
    }

    #[embassy_executor::task]
    async fn apu_link_task(
        node: &'static Mutex<CriticalSectionRawMutex, MasterNode>,
        link: crate::hardware::SpiMasterLink<'static, embassy_rp::peripherals::SPI1>,
    ) {
        cpu::link_service::run(node, Destination::Apu, link, || {
            embassy_time::Instant::now().as_micros()
        })
        .await
    }

    /// Enqueues the clock-sync beacon on its periodic interval (or
    /// immediately, on a `sync-lost` report), and folds confirmed VSYNC
    /// frame advances into the master's own frame counter. The GPU's
    /// dedicated VSYNC pin and its in-band packet both ultimately funnel
    /// through `MasterNode::take_frame_advance` — this task never
    /// increments the frame counter on a bare timer.
    #[embassy_executor::task]
    async fn application_task(
        node: &'static Mutex<CriticalSectionRawMutex, MasterNode>,
        mut vsync_pin: Input<'static>,
    ) {
        {
            let mut node = node.lock().await;
            node.begin_clock_sync();
            node.mark_synced();
        }

        let mut last_beacon_us = embassy_time::Instant::now().as_micros();
        loop {
            match select(vsync_pin.wait_for_rising_edge(), Timer::after(Duration::from_micros(cpu::config::APPLICATION_TICK_US))).await {
                Either::First(()) => {
                    let mut node = node.lock().await;
                    node.on_vsync_edge(embassy_time::Instant::now().as_micros());
                }
                Either::Second(()) => {}
            }

            let now_us = embassy_time::Instant::now().as_micros();
            let mut node = node.lock().await;

            if node.take_frame_advance().is_some() {
                node.clock_mut().advance_frame();
            }

            let sync_due = now_us.saturating_sub(last_beacon_us) >= SYNC_INTERVAL_US;
            if sync_due || node.take_forced_sync() {
                node.clock_mut().advance_to(now_us);
                let beacon = node.clock_mut().beacon();
                let _ = node.enqueue_priority(Destination::Gpu, beacon.clone(), true);
                let _ = node.enqueue_priority(Destination::Apu, beacon, true);
                last_beacon_us = now_us;
            }
        }
    }

    #[embassy_executor::main]
    pub async fn main(spawner: Spawner) {
        defmt::info!("triboy cpu: booting");
        let p = embassy_rp::init(Default::default());

        let node = NODE.init(Mutex::new(MasterNode::new(0)));

        let gpu_cs = Output::new(p.PIN_5, Level::High);
        let gpu_data_ready = Input::new(p.PIN_7, Pull::Down);
        let gpu_reset = Output::new(p.PIN_8, Level::High);
        let gpu_spi = Spi::new_blocking(p.SPI0, p.PIN_2, p.PIN_3, p.PIN_4, SpiConfig::default());

        let apu_cs = Output::new(p.PIN_6, Level::High);
        let apu_data_ready = Input::new(p.PIN_13, Pull::Down);
        let apu_reset = Output::new(p.PIN_14, Level::High);
        let apu_spi = Spi::new_blocking(p.SPI1, p.PIN_10, p.PIN_11, p.PIN_12, SpiConfig::default());

        let vsync_pin = Input::new(p.PIN_9, Pull::Down);

        spawner
            .spawn(gpu_link_task(
                node,
                crate::hardware::SpiMasterLink::new(gpu_spi, gpu_cs, gpu_data_ready, gpu_reset),
            ))
            .ok();
        spawner
            .spawn(apu_link_task(
                node,
                crate::hardware::SpiMasterLink::new(apu_spi, apu_cs, apu_data_ready, apu_reset),
            ))
            .ok();
        spawner.spawn(application_task(node, vsync_pin)).ok();
    }
}

#[cfg(feature = "hardware")]
mod hardware {
    //! RP2040 `MasterLink` wiring: chip-select-qualified blocking SPI plus
    //! a separate data-ready input and slave-reset output, framed per
    //! `protocol::frame` (spec §4.2).
    //!
    //! Kept minimal — board bring-up beyond what the protocol needs (pin
    //! muxing details, clock tree) is out of scope here; see the RP2040
    //! datasheet for the concrete pin assignments this assumes.

    use embassy_rp::gpio::{Input, Output};
    use embassy_rp::spi::{Blocking, Instance, Spi};
    use embassy_time::{Duration, Instant, Timer};
    use proto_core::config::{LINK_RESET_BOOT_WAIT_US, LINK_RESET_PAUSE_US, LINK_RESET_PULSE_US};
    use proto_core::link::LinkError;
    use protocol::{Packet, PacketError};

    /// A GPU/APU link backed by a blocking RP2040 SPI peripheral, a
    /// manually toggled chip-select pin, a data-ready input the slave
    /// drives, and a reset output this node drives.
    pub struct SpiMasterLink<'d, T: Instance> {
        spi: Spi<'d, T, Blocking>,
        cs: Output<'d>,
        data_ready: Input<'d>,
        reset: Output<'d>,
    }

    impl<'d, T: Instance> SpiMasterLink<'d, T> {
        /// Wrap an initialized SPI peripheral, chip-select, data-ready, and
        /// reset pins.
        pub fn new(spi: Spi<'d, T, Blocking>, cs: Output<'d>, data_ready: Input<'d>, reset: Output<'d>) -> Self {
            Self { spi, cs, data_ready, reset }
        }
    }

    impl<T: Instance> proto_core::link::MasterLink for SpiMasterLink<'_, T> {
        type Error = embassy_rp::spi::Error;

        async fn send(&mut self, packet: &Packet) -> Result<(), LinkError<Self::Error>> {
            self.cs.set_low();
            let request = packet.as_bytes();
            self.spi.blocking_write(&request).map_err(LinkError::Peripheral)
        }

        async fn poll_ready(&mut self, timeout_us: u64) -> Result<bool, LinkError<Self::Error>> {
            let deadline = Instant::now() + Duration::from_micros(timeout_us);
            loop {
                if self.data_ready.is_high() {
                    return Ok(true);
                }
                if Instant::now() >= deadline {
                    return Ok(false);
                }
                Timer::after(Duration::from_micros(10)).await;
            }
        }

        async fn receive(&mut self) -> Result<Packet, LinkError<Self::Error>> {
            let mut header = [0u8; 2];
            let read_result = self.spi.blocking_read(&mut header);
            self.cs.set_high();

            read_result.map_err(LinkError::Peripheral)?;
            let (_, remaining) = protocol::frame::decode_header(header[0], header[1]).map_err(LinkError::Framing)?;
            let mut full = heapless::Vec::<u8, { protocol::MAX_PACKET_LEN }>::new();
            let _ = full.extend_from_slice(&header);
            let mut rest = [0u8; protocol::MAX_PAYLOAD_LEN];
            let rest_slice = rest.get_mut(..usize::from(remaining)).ok_or(LinkError::Framing(PacketError::BufferTooShort))?;
            self.cs.set_low();
            let read_rest = self.spi.blocking_read(rest_slice);
            self.cs.set_high();
            read_rest.map_err(LinkError::Peripheral)?;
            let _ = full.extend_from_slice(rest_slice);

            Packet::parse(&full).map_err(LinkError::Framing)
        }

        async fn reset(&mut self) -> Result<(), LinkError<Self::Error>> {
            self.cs.set_high();
            Timer::after(Duration::from_micros(LINK_RESET_PAUSE_US)).await;
            self.reset.set_low();
            Timer::after(Duration::from_micros(LINK_RESET_PULSE_US)).await;
            self.reset.set_high();
            Timer::after(Duration::from_micros(LINK_RESET_BOOT_WAIT_US)).await;
            Ok(())
        }
    }
}

#[cfg(feature = "sim")]
fn main() {
    tracing_subscriber::fmt::init();
    tracing::info!("triboy cpu: sim-feature binary has no standalone entry point; see the `sim` crate's scenario tests");
}

#[cfg(not(any(feature = "hardware", feature = "sim")))]
fn main() {
    eprintln!("build with --features hardware or --features sim");
}
