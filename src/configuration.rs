//! Runtime acquisition configuration
//!
//! The configuration is only ever changed by a `SET` request from the main loop. The pulse
//! scheduler reads the timing from interrupt context through a [TimingCell], so the integration
//! time and the clear period it is derived from always change together.
use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use line_protocol::{BitDepth, Resolution, Setup};

use crate::design_parameters::{
    CLEAR_PERIOD_MIN_US, DEFAULT_INTEGRATION_TIME, TICK_PERIOD_US,
};

/// The number of shift pulses between two clear pulses for a given integration time.
///
/// The result keeps successive clear pulses at least [CLEAR_PERIOD_MIN_US] apart so a complete
/// readout fits in between. An integration time of 0 is treated as 1 tick.
pub const fn clear_period(integration_time: u16) -> u16 {
    let ticks = if integration_time == 0 {
        1
    } else {
        integration_time as u32
    };
    (CLEAR_PERIOD_MIN_US / (ticks * TICK_PERIOD_US) + 1) as u16
}

/// Integration time and the matching clear period, both in pulse scheduler units.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Timing {
    integration_time: u16,
    clear_period: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Self::from_ticks(DEFAULT_INTEGRATION_TIME)
    }
}

impl Timing {
    /// Derive the timing for an integration time in ticks.
    ///
    /// An integration time of 0 would fire a shift pulse on every tick without ever satisfying the
    /// clear period and is clamped to 1.
    pub fn new(integration_time: u16) -> Self {
        if integration_time == 0 {
            log::warn!("Integration time 0 clamped to 1 tick");
        }
        Self::from_ticks(integration_time)
    }

    const fn from_ticks(integration_time: u16) -> Self {
        let integration_time = if integration_time == 0 {
            1
        } else {
            integration_time
        };
        Self {
            integration_time,
            clear_period: clear_period(integration_time),
        }
    }

    /// Ticks between shift pulses.
    pub fn integration_time(&self) -> u16 {
        self.integration_time
    }

    /// Shift pulses between clear pulses.
    pub fn clear_period(&self) -> u16 {
        self.clear_period
    }

    const fn pack(self) -> u32 {
        ((self.integration_time as u32) << 16) | self.clear_period as u32
    }

    const fn unpack(word: u32) -> Self {
        Self {
            integration_time: (word >> 16) as u16,
            clear_period: word as u16,
        }
    }
}

/// Timing published to the pulse scheduler.
pub struct TimingCell(AtomicU32);

impl Default for TimingCell {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingCell {
    /// Construct the cell holding the power-up timing.
    pub const fn new() -> Self {
        Self(AtomicU32::new(
            Timing::from_ticks(DEFAULT_INTEGRATION_TIME).pack(),
        ))
    }

    pub fn load(&self) -> Timing {
        Timing::unpack(self.0.load(Ordering::Acquire))
    }

    pub fn store(&self, timing: Timing) {
        self.0.store(timing.pack(), Ordering::Release);
    }
}

/// The sampling side of the signal chain.
pub trait AnalogFrontEnd {
    /// Prepare conversions for frames of the given bit depth.
    fn set_bit_depth(&mut self, depth: BitDepth);
}

/// The bit depth requested from the sampling interrupt.
pub struct ConversionDepth(AtomicU8);

impl Default for ConversionDepth {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionDepth {
    pub const fn new() -> Self {
        Self(AtomicU8::new(BitDepth::Bits8 as u8))
    }

    pub fn load(&self) -> BitDepth {
        BitDepth::try_from(self.0.load(Ordering::Relaxed)).unwrap_or_default()
    }
}

impl AnalogFrontEnd for &ConversionDepth {
    fn set_bit_depth(&mut self, depth: BitDepth) {
        self.0.store(depth.into(), Ordering::Relaxed);
    }
}

/// Acquisition parameters owned by the main loop.
pub struct AcquisitionConfig<'a, A> {
    timing: &'a TimingCell,
    resolution: Resolution,
    afe: A,
}

impl<'a, A: AnalogFrontEnd> AcquisitionConfig<'a, A> {
    /// Construct the power-up configuration and publish its timing.
    pub fn new(timing: &'a TimingCell, afe: A) -> Self {
        let mut config = Self {
            timing,
            resolution: Resolution::default(),
            afe,
        };
        config.timing.store(Timing::default());
        config.set_resolution(Resolution::default());
        config
    }

    /// The integration time in ticks.
    pub fn integration_time(&self) -> u16 {
        self.timing.load().integration_time()
    }

    /// The clear gate period in integration periods.
    pub fn clear_period(&self) -> u16 {
        self.timing.load().clear_period()
    }

    /// Decimation and bit depth levels for the next frame.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// The analog front-end programmed by [AcquisitionConfig::set_resolution].
    pub fn afe(&self) -> &A {
        &self.afe
    }

    /// Change the integration time. Takes effect on the next pulse scheduler tick.
    pub fn set_integration_time(&mut self, integration_time: u16) {
        self.timing.store(Timing::new(integration_time));
    }

    /// Change decimation and bit depth. Takes effect with the next frame.
    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
        match resolution.bit_depth() {
            Some(depth) => self.afe.set_bit_depth(depth),
            None => log::warn!(
                "Unsupported vertical level {}, frames will be empty",
                resolution.vertical
            ),
        }
    }

    /// Apply a setup received with `SET`.
    pub fn apply(&mut self, setup: Setup) {
        self.set_resolution(setup.resolution);
        self.set_integration_time(setup.integration_time);
        log::info!(
            "Integration time {} ticks, clear period {}, levels {}/{}",
            self.integration_time(),
            self.clear_period(),
            setup.resolution.horizontal,
            setup.resolution.vertical,
        );
    }
}
