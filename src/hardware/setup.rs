//! Front-end hardware configuration
//!
//! Pin assignment:
//! * PD12 (TIM4_CH1): master clock
//! * PC6 (TIM8_CH1): shift pulse (SH)
//! * PG8: integration clear gate (ICG)
//! * PB0 (ADC12_INP9): sensor output (OS)
//! * PE1: STAT LED, PE0: DATA LED
//! * PA11/PA12: USB
use core::sync::atomic::{AtomicBool, Ordering};

use embedded_hal_02::{blocking::delay::DelayUs, PwmPin};
use embedded_hal_compat::ForwardCompat;
use stm32h7xx_hal::{self as hal, prelude::*};

use super::{
    ClearGate, DataLed, SensorAdc, ShiftTimer, StatusLed, Systick, UsbBus,
};
use crate::configuration::ConversionDepth;
use crate::design_parameters::{
    PIXEL_CLOCK, SAMPLE_RATE, SHIFT_PULSE_RATE, TICK_RATE,
    USB_READ_STORE_SIZE, USB_WRITE_STORE_SIZE,
};
use crate::usb::Serial;

/// Busy-wait delay counting core cycles, used while bringing up the ADC.
struct CycleDelay {
    cycles_per_us: u32,
}

impl DelayUs<u8> for CycleDelay {
    fn delay_us(&mut self, us: u8) {
        cortex_m::asm::delay(self.cycles_per_us * us as u32)
    }
}

/// The front-end peripherals, configured and running where noted.
pub struct LinescanDevices {
    /// Pulse scheduler tick, interrupt enabled.
    pub tick_timer: hal::timer::Timer<hal::stm32::TIM3>,
    /// Sampling tick, interrupt enabled.
    pub sample_timer: hal::timer::Timer<hal::stm32::TIM5>,
    pub adc: SensorAdc,
    pub shift: ShiftTimer,
    pub clear_gate: ClearGate,
    pub status_led: StatusLed,
    pub data_led: DataLed,
    pub usb_device: usb_device::device::UsbDevice<'static, UsbBus>,
    pub usb_serial: Serial<'static, UsbBus>,
}

/// Configure the front-end hardware.
///
/// The master clock starts running here. The timers are left paused.
///
/// # Args
/// * `core` - The cortex-m core peripherals.
/// * `device` - The microcontroller peripherals.
/// * `depth` - The conversion depth requested by the acquisition configuration.
pub fn setup(
    mut core: hal::stm32::CorePeripherals,
    device: hal::stm32::Peripherals,
    depth: &'static ConversionDepth,
) -> LinescanDevices {
    // Set up RTT logging
    {
        // Enable debug during WFE/WFI-induced sleep
        device.DBGMCU.cr.modify(|_, w| w.dbgsleep_d1().set_bit());

        // A log call preempting another one is dropped.
        let channels = rtt_target::rtt_init_default!();
        // Note(unsafe): The closure we pass does not establish a critical section
        // as demanded but it does ensure synchronization and implements a lock.
        unsafe {
            rtt_target::set_print_channel_cs(
                channels.up.0,
                &((|arg, f| {
                    static LOCKED: AtomicBool = AtomicBool::new(false);
                    if LOCKED.compare_exchange_weak(
                        false,
                        true,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    ) == Ok(false)
                    {
                        f(arg);
                        LOCKED.store(false, Ordering::Release);
                    }
                }) as rtt_target::CriticalSectionFunc),
            );
        }

        static LOGGER: rtt_logger::RTTLogger =
            rtt_logger::RTTLogger::new(log::LevelFilter::Info);
        log::set_logger(&LOGGER)
            .map(|()| log::set_max_level(log::LevelFilter::Trace))
            .unwrap();
        log::info!("Starting");
    }

    let pwr = device.PWR.constrain();
    let vos = pwr.freeze();

    // Clear reset flags.
    device.RCC.rsr.write(|w| w.rmvf().set_bit());

    // The ADC runs from per_ck.
    device.RCC.d3ccipr.modify(|_, w| w.adcsel().per());

    let rcc = device.RCC.constrain();
    let mut ccdr = rcc
        .use_hse(8.MHz())
        .sysclk(400.MHz())
        .hclk(200.MHz())
        .per_ck(64.MHz())
        .freeze(vos, &device.SYSCFG);

    // Set up USB clocks.
    ccdr.clocks.hsi48_ck().unwrap();
    ccdr.peripheral
        .kernel_usb_clk_mux(stm32h7xx_hal::rcc::rec::UsbClkSel::Hsi48);

    Systick::start(core.SYST, ccdr.clocks.sysclk().to_Hz());

    core.SCB.enable_icache();

    let mut delay = CycleDelay {
        cycles_per_us: ccdr.clocks.c_ck().to_Hz() / 1_000_000,
    };

    let gpioa = device.GPIOA.split(ccdr.peripheral.GPIOA);
    let gpiob = device.GPIOB.split(ccdr.peripheral.GPIOB);
    let gpioc = device.GPIOC.split(ccdr.peripheral.GPIOC);
    let gpiod = device.GPIOD.split(ccdr.peripheral.GPIOD);
    let gpioe = device.GPIOE.split(ccdr.peripheral.GPIOE);
    let gpiog = device.GPIOG.split(ccdr.peripheral.GPIOG);

    let status_led = gpioe.pe1.into_push_pull_output().erase().forward();
    let data_led = gpioe.pe0.into_push_pull_output().erase().forward();
    let clear_gate = gpiog.pg8.into_push_pull_output().erase().forward();

    // The master clock free-runs from here on.
    {
        let mut clock = device.TIM4.pwm(
            gpiod.pd12.into_alternate::<2>(),
            PIXEL_CLOCK,
            ccdr.peripheral.TIM4,
            &ccdr.clocks,
        );
        clock.set_duty(clock.get_max_duty() / 2);
        clock.enable();
    }

    let shift = {
        let timer = device.TIM8.timer(
            SHIFT_PULSE_RATE,
            ccdr.peripheral.TIM8,
            &ccdr.clocks,
        );
        ShiftTimer::new(timer, gpioc.pc6.into_alternate::<3>())
    };

    let adc = {
        let (mut adc1, _adc2) = hal::adc::adc12(
            device.ADC1,
            device.ADC2,
            stm32h7xx_hal::time::Hertz::MHz(25),
            &mut delay,
            ccdr.peripheral.ADC12,
            &ccdr.clocks,
        );
        adc1.set_sample_time(hal::adc::AdcSampleTime::T_8);
        adc1.set_resolution(hal::adc::Resolution::TwelveBit);
        adc1.calibrate();

        SensorAdc::new(adc1.enable(), gpiob.pb0.into_analog(), depth)
    };

    let tick_timer = {
        let mut timer =
            device
                .TIM3
                .timer(TICK_RATE, ccdr.peripheral.TIM3, &ccdr.clocks);
        timer.pause();
        timer.listen(hal::timer::Event::TimeOut);
        timer
    };

    let sample_timer = {
        let mut timer =
            device
                .TIM5
                .timer(SAMPLE_RATE, ccdr.peripheral.TIM5, &ccdr.clocks);
        timer.pause();
        timer.listen(hal::timer::Event::TimeOut);
        timer
    };

    let (usb_device, usb_serial) = {
        let _usb_id = gpioa.pa10.into_alternate::<10>();
        let usb_n = gpioa.pa11.into_alternate();
        let usb_p = gpioa.pa12.into_alternate();
        let usb = stm32h7xx_hal::usb_hs::USB2::new(
            device.OTG2_HS_GLOBAL,
            device.OTG2_HS_DEVICE,
            device.OTG2_HS_PWRCLK,
            usb_n,
            usb_p,
            ccdr.peripheral.USB2OTG,
            &ccdr.clocks,
        );

        let endpoint_memory =
            cortex_m::singleton!(: [u32; 1024] = [0; 1024]).unwrap();
        let usb_bus = cortex_m::singleton!(: usb_device::bus::UsbBusAllocator<UsbBus> =
            stm32h7xx_hal::usb_hs::UsbBus::new(usb, &mut endpoint_memory[..]))
        .unwrap();

        let read_store = cortex_m::singleton!(
            : [u8; USB_READ_STORE_SIZE] = [0; USB_READ_STORE_SIZE]
        )
        .unwrap();
        let write_store = cortex_m::singleton!(
            : [u8; USB_WRITE_STORE_SIZE] = [0; USB_WRITE_STORE_SIZE]
        )
        .unwrap();
        let serial = usbd_serial::SerialPort::new_with_store(
            usb_bus,
            &mut read_store[..],
            &mut write_store[..],
        );

        let usb_device = usb_device::device::UsbDeviceBuilder::new(
            usb_bus,
            usb_device::device::UsbVidPid(0x1209, 0x0001),
        )
        .strings(&[usb_device::device::StringDescriptors::default()
            .manufacturer("linescan")
            .product("TCD1304 line scanner")
            .serial_number(env!("CARGO_PKG_VERSION"))])
        .unwrap()
        .device_class(usbd_serial::USB_CLASS_CDC)
        .build();

        (usb_device, serial)
    };

    log::info!("Setup complete");

    LinescanDevices {
        tick_timer,
        sample_timer,
        adc,
        shift,
        clear_gate,
        status_led,
        data_led,
        usb_device,
        usb_serial,
    }
}
