//! Scan line framing
//!
//! # Wire format
//! A frame is the decimated scan line, one or two bytes per kept sample, without any header.
//! Samples are right-justified 12-bit ADC codes.
//!
//! | Level | Bits | Bytes per sample                  |
//! |-------|------|-----------------------------------|
//! | 0     | 6    | `code >> 6`                       |
//! | 1     | 8    | `code >> 4`                       |
//! | 2     | 10   | `code >> 10`, `code >> 2`         |
//! | 3     | 12   | `code >> 8`, `code`               |
//!
//! Each byte is the truncation of the shifted code to its low 8 bits. The host reassembles the
//! 10- and 12-bit samples as `(first << 8) | second`.
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The number of payload bytes following a `SET` request.
pub const SETUP_DATA_SIZE: usize = 4;

/// Output sample width selected by the vertical resolution level.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, TryFromPrimitive, IntoPrimitive,
)]
#[repr(u8)]
pub enum BitDepth {
    Bits6 = 0,
    #[default]
    Bits8 = 1,
    Bits10 = 2,
    Bits12 = 3,
}

impl BitDepth {
    /// The number of significant bits per output sample.
    pub const fn bits(self) -> u8 {
        match self {
            BitDepth::Bits6 => 6,
            BitDepth::Bits8 => 8,
            BitDepth::Bits10 => 10,
            BitDepth::Bits12 => 12,
        }
    }

    /// The number of bytes each sample occupies on the wire.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            BitDepth::Bits6 | BitDepth::Bits8 => 1,
            BitDepth::Bits10 | BitDepth::Bits12 => 2,
        }
    }
}

/// Decimation and bit depth levels, as received from the host.
///
/// Levels are stored unvalidated. A horizontal level that decimates the line down to nothing or
/// a vertical level without a [BitDepth] both produce an empty frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// Keep every `2^horizontal`-th raw sample.
    pub horizontal: u8,
    /// Bit depth level, see [BitDepth].
    pub vertical: u8,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            horizontal: 0,
            vertical: BitDepth::default().into(),
        }
    }
}

impl Resolution {
    /// The output bit depth, if the vertical level is supported.
    pub fn bit_depth(&self) -> Option<BitDepth> {
        BitDepth::try_from(self.vertical).ok()
    }

    /// The number of samples kept out of `raw_count` raw samples.
    pub fn output_samples(&self, raw_count: usize) -> usize {
        raw_count
            .checked_shr(self.horizontal as u32)
            .unwrap_or_default()
    }

    /// The length in bytes of a frame encoded from `raw_count` raw samples.
    pub fn frame_len(&self, raw_count: usize) -> usize {
        self.bit_depth().map_or(0, |depth| {
            self.output_samples(raw_count) * depth.bytes_per_sample()
        })
    }
}

/// Framing errors.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("frame needs {needed} bytes, output holds {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Encode a scan line into `out`.
///
/// # Args
/// * `samples` - The raw scan line.
/// * `resolution` - Decimation and bit depth levels. These are passed by value so that the frame
///   is always encoded with one consistent pair.
/// * `out` - The output buffer.
///
/// # Returns
/// The number of bytes written to `out`.
pub fn encode(
    samples: &[u16],
    resolution: Resolution,
    out: &mut [u8],
) -> Result<usize, Error> {
    let len = resolution.frame_len(samples.len());
    if len > out.len() {
        return Err(Error::BufferTooSmall {
            needed: len,
            available: out.len(),
        });
    }

    let Some(depth) = resolution.bit_depth() else {
        return Ok(0);
    };

    let step = resolution.horizontal as u32;
    let kept = (0..resolution.output_samples(samples.len()))
        .map(|i| samples[i << step]);

    match depth {
        BitDepth::Bits6 => {
            for (byte, code) in out.iter_mut().zip(kept) {
                *byte = (code >> 6) as u8;
            }
        }
        BitDepth::Bits8 => {
            for (byte, code) in out.iter_mut().zip(kept) {
                *byte = (code >> 4) as u8;
            }
        }
        BitDepth::Bits10 => {
            for (pair, code) in out.chunks_exact_mut(2).zip(kept) {
                pair[0] = (code >> 10) as u8;
                pair[1] = (code >> 2) as u8;
            }
        }
        BitDepth::Bits12 => {
            for (pair, code) in out.chunks_exact_mut(2).zip(kept) {
                pair[0] = (code >> 8) as u8;
                pair[1] = code as u8;
            }
        }
    }

    Ok(len)
}

/// Acquisition parameters carried by a `SET` request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Setup {
    /// Integration time in 10 µs ticks.
    pub integration_time: u16,
    pub resolution: Resolution,
}

impl Setup {
    /// Decode a `SET` payload: `[integration_time_hi, integration_time_lo, horizontal, vertical]`.
    ///
    /// No range checks are performed on any field.
    pub fn decode(payload: &[u8; SETUP_DATA_SIZE]) -> Self {
        Self {
            integration_time: u16::from_be_bytes([payload[0], payload[1]]),
            resolution: Resolution {
                horizontal: payload[2],
                vertical: payload[3],
            },
        }
    }

    /// Pack the setup the way the host does.
    pub fn to_bytes(&self) -> [u8; SETUP_DATA_SIZE] {
        let [hi, lo] = self.integration_time.to_be_bytes();
        [hi, lo, self.resolution.horizontal, self.resolution.vertical]
    }
}
