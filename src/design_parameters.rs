//! Compile-time timing and geometry of the CCD front-end.
use fugit::HertzU32 as Hertz;

/// The number of outputs shifted out per readout: 32 leading dummy outputs, the signal pixels and
/// 14 trailing dummy outputs.
pub const PIXEL_COUNT: usize = 3694;

/// The number of light sensitive pixels.
pub const SIGNAL_PIXELS: usize = 3648;

/// The master clock driving the sensor shift register.
pub const PIXEL_CLOCK: Hertz = Hertz::kHz(800);

/// One output is shifted out every 4 master clock periods.
pub const SAMPLE_RATE: Hertz = Hertz::kHz(200);

/// The pulse scheduler tick rate.
pub const TICK_RATE: Hertz = Hertz::kHz(100);

/// The pulse scheduler tick period in microseconds. Integration times are given in ticks.
pub const TICK_PERIOD_US: u32 = 10;

/// The minimum spacing of two clear (ICG) pulses in microseconds. A full readout of
/// [PIXEL_COUNT] outputs at [SAMPLE_RATE] has to fit in between.
pub const CLEAR_PERIOD_MIN_US: u32 = 18470;

/// The integration time at power-up, in ticks.
pub const DEFAULT_INTEGRATION_TIME: u16 = 1;

/// The shift pulse (SH) output timer rate. The pulse is high for the first half of a period.
pub const SHIFT_PULSE_RATE: Hertz = Hertz::kHz(250);

/// The size of the largest frame: every output at two bytes per sample.
pub const WRITE_BUFFER_SIZE: usize = 2 * PIXEL_COUNT;

/// USB serial port buffer sizes.
pub const USB_READ_STORE_SIZE: usize = 128;
pub const USB_WRITE_STORE_SIZE: usize = 1024;

/// Line parameters the host software opens the serial port with.
pub const LINE_CODING_BAUD: u32 = 256_000;
pub const LINE_CODING_DATA_BITS: u8 = 8;

/// Dummy outputs shifted out ahead of and after the signal pixels.
pub const LEADING_DUMMY_OUTPUTS: usize = 32;
pub const TRAILING_DUMMY_OUTPUTS: usize = 14;
