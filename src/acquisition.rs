//! Scan line acquisition
//!
//! The sample interrupt appends ADC codes to a [SampleBuffer] while the pulse scheduler restarts
//! it at the beginning of every readout. The main loop copies the line out with
//! [SampleBuffer::snapshot] and encodes the copy, so the interrupts never wait on a transfer.
use core::sync::atomic::{fence, AtomicU16, AtomicU32, AtomicUsize, Ordering};

/// A readout restart raced the snapshot.
#[derive(Copy, Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("readout restarted during snapshot")]
pub struct TornSnapshot;

/// Fixed capacity scan line storage shared between interrupt and thread context.
pub struct SampleBuffer<const N: usize> {
    samples: [AtomicU16; N],
    cursor: AtomicUsize,
    generation: AtomicU32,
}

impl<const N: usize> Default for SampleBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleBuffer<N> {
    pub const fn new() -> Self {
        Self {
            samples: [const { AtomicU16::new(0) }; N],
            cursor: AtomicUsize::new(0),
            generation: AtomicU32::new(0),
        }
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// The number of samples recorded since the last restart.
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// The number of restarts so far.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store the next conversion result.
    ///
    /// Once the line is full the cursor saturates and further codes are dropped until the next
    /// [SampleBuffer::restart].
    ///
    /// # Returns
    /// Whether the code was stored.
    pub fn record(&self, code: u16) -> bool {
        match self.cursor.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |index| (index < N).then_some(index + 1),
        ) {
            Ok(index) => {
                self.samples[index].store(code, Ordering::Relaxed);
                true
            }
            Err(_) => false,
        }
    }

    /// Start a new line. Previously recorded codes stay in place until overwritten.
    pub fn restart(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cursor.store(0, Ordering::Release);
    }

    /// Copy the line into `line`.
    ///
    /// The copy may mix the codes of the current and the previous readout wherever the current
    /// one has not reached yet, as on the sensor itself.
    ///
    /// # Returns
    /// The generation of the copied line, or [TornSnapshot] if the line was restarted while
    /// copying.
    pub fn snapshot(&self, line: &mut [u16; N]) -> Result<u32, TornSnapshot> {
        let generation = self.generation.load(Ordering::Acquire);
        for (dst, src) in line.iter_mut().zip(self.samples.iter()) {
            *dst = src.load(Ordering::Relaxed);
        }
        fence(Ordering::Acquire);
        if self.generation.load(Ordering::Relaxed) != generation {
            return Err(TornSnapshot);
        }
        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::sync::atomic::AtomicBool;
    use std::{
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn saturates() {
        let buffer = SampleBuffer::<8>::new();
        for code in 0..20u16 {
            assert_eq!(buffer.record(code), code < 8);
        }
        assert_eq!(buffer.cursor(), 8);

        let mut line = [0; 8];
        assert_eq!(buffer.snapshot(&mut line), Ok(0));
        assert_eq!(line, [0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn restart_overwrites_from_the_start() {
        let buffer = SampleBuffer::<4>::new();
        for code in [10, 11, 12, 13] {
            buffer.record(code);
        }
        buffer.restart();
        assert_eq!(buffer.cursor(), 0);
        assert_eq!(buffer.generation(), 1);

        buffer.record(20);
        buffer.record(21);
        let mut line = [0; 4];
        assert_eq!(buffer.snapshot(&mut line), Ok(1));
        assert_eq!(line, [20, 21, 12, 13]);
    }

    #[test]
    fn restart_during_snapshot_is_detected() {
        let buffer = SampleBuffer::<3694>::new();
        let stop = AtomicBool::new(false);
        let mut line = [0; 3694];
        let mut torn = 0;
        thread::scope(|s| {
            s.spawn(|| {
                while !stop.load(Ordering::Relaxed) {
                    buffer.restart();
                }
            });
            let deadline = Instant::now() + Duration::from_secs(30);
            while torn == 0 && Instant::now() < deadline {
                if buffer.snapshot(&mut line) == Err(TornSnapshot) {
                    torn += 1;
                }
            }
            stop.store(true, Ordering::Relaxed);
        });
        assert!(torn > 0);

        // Undisturbed, the next copy succeeds.
        let generation = buffer.generation();
        assert_eq!(buffer.snapshot(&mut line), Ok(generation));
    }

    #[test]
    fn empty() {
        let buffer = SampleBuffer::<3>::default();
        assert_eq!(buffer.capacity(), 3);
        let mut line = [7; 3];
        assert_eq!(buffer.snapshot(&mut line), Ok(0));
        assert_eq!(line, [0; 3]);
    }
}
