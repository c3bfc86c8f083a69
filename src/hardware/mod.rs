//! STM32H743 board support for the CCD front-end
pub use stm32h7xx_hal as hal;

use embedded_hal_compat::{markers::ForwardOutputPin, Forward};

mod sensor_adc;
pub mod setup;
mod shift_timer;

pub use sensor_adc::SensorAdc;
pub use setup::{setup, LinescanDevices};
pub use shift_timer::ShiftTimer;

rtic_monotonics::systick_monotonic!(Systick, 1_000);

pub type UsbBus = hal::usb_hs::UsbBus<hal::usb_hs::USB2>;

/// A push-pull GPIO output usable through the embedded-hal 1.0 traits.
pub type OutputLine =
    Forward<hal::gpio::ErasedPin<hal::gpio::Output>, ForwardOutputPin>;

/// The integration clear gate (ICG).
pub type ClearGate = OutputLine;

/// Indicators: STAT lit while the USB session is configured, DATA toggled per frame.
pub type StatusLed = OutputLine;
pub type DataLed = OutputLine;

#[inline(never)]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    use core::{
        fmt::Write,
        sync::atomic::{AtomicBool, Ordering},
    };
    use cortex_m::asm;
    use rtt_target::{ChannelMode, UpChannel};

    cortex_m::interrupt::disable();

    // Recursion protection
    static PANICKED: AtomicBool = AtomicBool::new(false);
    while PANICKED.load(Ordering::Relaxed) {
        asm::bkpt();
    }
    PANICKED.store(true, Ordering::Relaxed);

    // Light both indicators: STAT on PE1, DATA on PE0
    let gpioe = unsafe { &*hal::stm32::GPIOE::ptr() };
    gpioe.odr.modify(|_, w| w.odr0().high().odr1().high());

    if let Some(mut channel) = unsafe { UpChannel::conjure(0) } {
        channel.set_mode(ChannelMode::BlockIfFull);
        writeln!(channel, "{info}").ok();
    }

    asm::udf();
}

#[cortex_m_rt::exception]
unsafe fn HardFault(ef: &cortex_m_rt::ExceptionFrame) -> ! {
    panic!("HardFault at {:#?}", ef);
}

#[cortex_m_rt::exception]
unsafe fn DefaultHandler(irqn: i16) {
    panic!("Unhandled exception (IRQn = {})", irqn);
}
