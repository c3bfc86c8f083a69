//! TCD1304 line scanner
//!
//! The master clock free-runs on a timer output. A 100 kHz tick schedules the
//! shift pulse and the integration clear gate, a 200 kHz tick samples the
//! sensor output into the scan line and a 1 ms service task answers host
//! `GET`/`SET` requests over USB.
//!
//! On the host this prints the frame sizes for every resolution.
#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(not(target_os = "none"))]
fn main() {
    use line_protocol::{BitDepth, Resolution};
    use linescan::design_parameters::{PIXEL_COUNT, SIGNAL_PIXELS};

    println!(
        "{PIXEL_COUNT} outputs per readout, {SIGNAL_PIXELS} signal pixels"
    );
    println!("level {:>6} {:>6} {:>6} {:>6}", 0, 1, 2, 3);
    for horizontal in 0..=12 {
        print!("{horizontal:>5}");
        for vertical in 0..4 {
            let resolution = Resolution {
                horizontal,
                vertical,
            };
            print!(" {:>6}", resolution.frame_len(PIXEL_COUNT));
        }
        println!();
    }
    for depth in [
        BitDepth::Bits6,
        BitDepth::Bits8,
        BitDepth::Bits10,
        BitDepth::Bits12,
    ] {
        println!(
            "{:?}: {} bit, {} byte(s) per sample",
            depth,
            depth.bits(),
            depth.bytes_per_sample()
        );
    }
}

#[cfg(target_os = "none")]
mod statics {
    use linescan::{
        acquisition::SampleBuffer,
        configuration::{ConversionDepth, TimingCell},
        design_parameters::PIXEL_COUNT,
    };

    /// The scan line, written by the sampling interrupt.
    pub static BUFFER: SampleBuffer<PIXEL_COUNT> = SampleBuffer::new();
    pub static TIMING: TimingCell = TimingCell::new();
    pub static DEPTH: ConversionDepth = ConversionDepth::new();
}

#[cfg(target_os = "none")]
#[rtic::app(device = linescan::hardware::hal::stm32, peripherals = true, dispatchers=[DCMI, JPEG])]
mod app {
    use fugit::ExtU32;
    use rtic_monotonics::Monotonic;

    use linescan::{
        configuration::{AcquisitionConfig, ConversionDepth},
        design_parameters::{PIXEL_COUNT, WRITE_BUFFER_SIZE},
        hardware::{
            self, hal, ClearGate, DataLed, SensorAdc, ShiftTimer, StatusLed,
            Systick, UsbBus,
        },
        pulse::PulseScheduler,
        scanner::Scanner,
        session::Session,
        usb::UsbTransport,
    };

    use super::statics::{BUFFER, DEPTH, TIMING};

    type Link = UsbTransport<'static, UsbBus, StatusLed>;
    type LineScanner = Scanner<
        'static,
        Link,
        &'static ConversionDepth,
        DataLed,
        PIXEL_COUNT,
    >;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        tick_timer: hal::timer::Timer<hal::stm32::TIM3>,
        sample_timer: hal::timer::Timer<hal::stm32::TIM5>,
        scheduler: PulseScheduler<ClearGate, ShiftTimer>,
        adc: SensorAdc,
        scanner: LineScanner,
    }

    #[init]
    fn init(c: init::Context) -> (Shared, Local) {
        let mut devices = hardware::setup(c.core, c.device, &DEPTH);

        let config = AcquisitionConfig::new(&TIMING, &DEPTH);

        let session = Session::new(devices.status_led).unwrap();
        let tx = cortex_m::singleton!(
            : [u8; WRITE_BUFFER_SIZE] = [0; WRITE_BUFFER_SIZE]
        )
        .unwrap();
        let link = UsbTransport::new(
            devices.usb_device,
            devices.usb_serial,
            session,
            &mut tx[..],
        );
        let scanner = Scanner::new(link, config, &BUFFER, devices.data_led);

        let scheduler =
            PulseScheduler::new(devices.clear_gate, devices.shift).unwrap();

        devices.sample_timer.resume();
        devices.tick_timer.resume();

        service::spawn().unwrap();

        log::info!(
            "Acquiring {} pixels every {} ticks",
            PIXEL_COUNT,
            TIMING.load().integration_time()
        );

        (
            Shared {},
            Local {
                tick_timer: devices.tick_timer,
                sample_timer: devices.sample_timer,
                scheduler,
                adc: devices.adc,
                scanner,
            },
        )
    }

    /// Drive SH and ICG.
    #[task(binds = TIM3, priority = 2, local=[tick_timer, scheduler])]
    fn tick(c: tick::Context) {
        c.local.tick_timer.clear_irq();
        c.local.scheduler.tick(TIMING.load(), &BUFFER).unwrap();
    }

    /// Sample the sensor output.
    #[task(binds = TIM5, priority = 3, local=[sample_timer, adc])]
    fn sample(c: sample::Context) {
        c.local.sample_timer.clear_irq();
        if let Some(code) = c.local.adc.sample() {
            BUFFER.record(code);
        }
    }

    #[task(priority = 1, local=[scanner])]
    async fn service(c: service::Context) {
        let scanner = c.local.scanner;
        loop {
            if let Err(e) = scanner.transport_mut().process() {
                log::warn!("USB: {e}");
            }

            scanner.service().unwrap();

            Systick::delay(1.millis()).await;
        }
    }
}
