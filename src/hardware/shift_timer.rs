//! Shift pulse (SH) output on TIM8 channel 1.
//!
//! The timer runs in one-pulse mode with the channel in PWM mode 2: once enabled, the output
//! stays low for the first half of a period, goes high for the second half and the counter stops
//! on the update event with the output back low.
use super::hal;
use crate::pulse::ShiftPulse;

pub struct ShiftTimer {
    _timer: hal::timer::Timer<hal::stm32::TIM8>,
}

impl ShiftTimer {
    /// Configure the pulse output.
    ///
    /// # Args
    /// * `timer` - TIM8 configured for the pulse period.
    /// * `_pin` - The TIM8 channel 1 output pin.
    pub fn new(
        mut timer: hal::timer::Timer<hal::stm32::TIM8>,
        _pin: hal::gpio::gpioc::PC6<hal::gpio::Alternate<3>>,
    ) -> Self {
        timer.pause();
        timer.reset_counter();

        // Note(unsafe): The timer is owned here and only this type touches its registers.
        let regs = unsafe { &*hal::stm32::TIM8::ptr() };
        let arr = regs.arr.read().bits();
        regs.ccr[0].write(|w| w.ccr().bits((arr / 2) as u16));
        regs.ccmr1_output()
            .modify(|_, w| unsafe { w.cc1s().bits(0).oc1m().bits(0b111) });
        regs.ccer.modify(|_, w| w.cc1e().set_bit());
        regs.bdtr.modify(|_, w| w.moe().set_bit());
        regs.cr1.modify(|_, w| w.opm().set_bit());

        Self { _timer: timer }
    }
}

impl ShiftPulse for ShiftTimer {
    fn fire(&mut self) {
        // Note(unsafe): Only the counter enable is written. One-pulse mode clears it again.
        let regs = unsafe { &*hal::stm32::TIM8::ptr() };
        regs.cr1.modify(|_, w| w.cen().set_bit());
    }
}
