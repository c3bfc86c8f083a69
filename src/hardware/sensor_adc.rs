//! Sensor output sampling on ADC1.
use embedded_hal_02::adc::OneShot;
use line_protocol::BitDepth;

use super::hal;
use crate::configuration::ConversionDepth;

/// The CCD output (OS) on PB0, ADC12_INP9.
pub type SensorInput = hal::gpio::gpiob::PB0<hal::gpio::Analog>;

/// Samples the sensor output at the resolution requested for frames.
///
/// Codes are aligned to 12 bits irrespective of the conversion resolution.
pub struct SensorAdc {
    adc: hal::adc::Adc<hal::stm32::ADC1, hal::adc::Enabled>,
    pin: SensorInput,
    requested: &'static ConversionDepth,
    depth: BitDepth,
    shift: u8,
}

impl SensorAdc {
    pub fn new(
        adc: hal::adc::Adc<hal::stm32::ADC1, hal::adc::Enabled>,
        pin: SensorInput,
        requested: &'static ConversionDepth,
    ) -> Self {
        let mut adc = Self {
            adc,
            pin,
            requested,
            depth: BitDepth::Bits12,
            shift: 0,
        };
        adc.apply_depth(requested.load());
        adc
    }

    fn apply_depth(&mut self, depth: BitDepth) {
        log::debug!("Sampling for {} bit frames", depth.bits());
        let (resolution, shift) = match depth {
            BitDepth::Bits6 | BitDepth::Bits8 => {
                (hal::adc::Resolution::EightBit, 4)
            }
            BitDepth::Bits10 => (hal::adc::Resolution::TenBit, 2),
            BitDepth::Bits12 => (hal::adc::Resolution::TwelveBit, 0),
        };
        self.adc.set_resolution(resolution);
        self.depth = depth;
        self.shift = shift;
    }

    /// Convert one sample.
    pub fn sample(&mut self) -> Option<u16> {
        let depth = self.requested.load();
        if depth != self.depth {
            self.apply_depth(depth);
        }

        let code: u32 = nb::block!(self.adc.read(&mut self.pin)).ok()?;
        Some((code << self.shift) as u16)
    }
}
