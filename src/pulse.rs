//! Sensor pulse generation
//!
//! The scheduler runs from a fixed rate tick (see [crate::design_parameters::TICK_RATE]). Every
//! `integration_time` ticks it fires a shift (SH) pulse, which ends one integration period and
//! starts the next. Every `clear_period` shift pulses it additionally pulls the integration
//! clear gate (ICG) low for one tick. Releasing ICG starts the readout of the line integrated
//! until then, so the sample buffer is restarted at that point.
use embedded_hal_1::digital::OutputPin;

use crate::{acquisition::SampleBuffer, configuration::Timing};

/// A single shift pulse output, e.g. a timer channel in one-pulse mode.
pub trait ShiftPulse {
    /// Emit one pulse. The pulse shape is up to the output.
    fn fire(&mut self);
}

pub struct PulseScheduler<ICG, SH> {
    icg: ICG,
    sh: SH,
    icg_low: bool,
    integration_count: u16,
    clear_count: u16,
}

impl<ICG, SH> PulseScheduler<ICG, SH>
where
    ICG: OutputPin,
    SH: ShiftPulse,
{
    /// Construct the scheduler.
    ///
    /// ICG is pulled low right away, so the first tick starts a readout.
    pub fn new(mut icg: ICG, sh: SH) -> Result<Self, ICG::Error> {
        icg.set_low()?;
        Ok(Self {
            icg,
            sh,
            icg_low: true,
            integration_count: 0,
            clear_count: 0,
        })
    }

    /// Advance by one tick.
    ///
    /// # Args
    /// * `timing` - The current timing. It may change between any two ticks and is compared
    ///   against the running counters, so a shortened integration time fires on the next tick.
    /// * `buffer` - The sample buffer restarted when a readout begins.
    pub fn tick<const N: usize>(
        &mut self,
        timing: Timing,
        buffer: &SampleBuffer<N>,
    ) -> Result<(), ICG::Error> {
        self.integration_count = self.integration_count.saturating_add(1);

        if self.clear_count == 0 && self.icg_low {
            self.icg.set_high()?;
            self.icg_low = false;
            buffer.restart();
        }

        if self.integration_count >= timing.integration_time() {
            self.integration_count = 0;
            self.clear_count = self.clear_count.saturating_add(1);
            self.sh.fire();

            if self.clear_count >= timing.clear_period() {
                self.clear_count = 0;
                self.icg.set_low()?;
                self.icg_low = true;
            }
        }

        Ok(())
    }
}
