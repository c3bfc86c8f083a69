use core::{
    cell::Cell,
    convert::Infallible,
    sync::atomic::{AtomicBool, Ordering},
};
use std::{
    collections::VecDeque,
    thread,
    time::{Duration, Instant},
};

use embedded_hal_1::digital::{ErrorType, OutputPin};
use line_protocol::{BitDepth, State, Transport};
use linescan::{
    acquisition::SampleBuffer,
    configuration::{AcquisitionConfig, ConversionDepth, TimingCell},
    design_parameters::{PIXEL_COUNT, WRITE_BUFFER_SIZE},
    scanner::Scanner,
};

/// Every queued request is received at once. Writes complete on the
/// following poll.
struct Host {
    requests: VecDeque<Vec<u8>>,
    reading: bool,
    writing: bool,
    buffer: Vec<u8>,
    responses: Vec<Vec<u8>>,
}

impl Host {
    fn new(requests: &[&str]) -> Self {
        Self {
            requests: requests.iter().map(|r| r.as_bytes().to_vec()).collect(),
            reading: false,
            writing: false,
            buffer: vec![0; WRITE_BUFFER_SIZE],
            responses: Vec::new(),
        }
    }
}

impl Transport for Host {
    type Error = Infallible;

    fn open(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn start_read(&mut self) -> Result<(), Infallible> {
        self.reading = true;
        Ok(())
    }

    fn read_complete(&mut self, request: &mut [u8]) -> Option<usize> {
        if !self.reading {
            return None;
        }
        let data = self.requests.pop_front()?;
        self.reading = false;
        request[..data.len()].copy_from_slice(&data);
        Some(data.len())
    }

    fn write_buffer(&mut self) -> &mut [u8] {
        &mut self.buffer
    }

    fn start_write(&mut self, len: usize) -> Result<(), Infallible> {
        self.writing = true;
        self.responses.push(self.buffer[..len].to_vec());
        Ok(())
    }

    fn write_complete(&mut self) -> bool {
        core::mem::take(&mut self.writing)
    }
}

#[derive(Default)]
struct Led {
    on: Cell<bool>,
    toggles: Cell<usize>,
}

impl Led {
    fn set(&self, on: bool) {
        if self.on.replace(on) != on {
            self.toggles.set(self.toggles.get() + 1);
        }
    }
}

impl ErrorType for &Led {
    type Error = Infallible;
}

impl OutputPin for &Led {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.set(true);
        Ok(())
    }
}

type TestScanner<'a> =
    Scanner<'a, Host, &'a ConversionDepth, &'a Led, PIXEL_COUNT>;

fn fill(buffer: &SampleBuffer<PIXEL_COUNT>) {
    buffer.restart();
    for i in 0..PIXEL_COUNT {
        buffer.record((i as u16 * 7) & 0xfff);
    }
}

fn code(i: usize) -> u16 {
    (i as u16 * 7) & 0xfff
}

/// Service until the protocol has answered every queued request.
fn serve(scanner: &mut TestScanner<'_>, responses: usize) {
    for _ in 0..100 {
        let state = scanner.service().unwrap();
        if state == State::WaitForReadComplete
            && scanner.protocol().transport().responses.len() == responses
        {
            return;
        }
    }
    panic!("no response");
}

#[test]
fn get_returns_the_current_line() {
    let buffer = SampleBuffer::new();
    let timing = TimingCell::new();
    let depth = ConversionDepth::new();
    fill(&buffer);

    let led = Led::default();
    let config = AcquisitionConfig::new(&timing, &depth);
    let mut scanner = Scanner::new(
        Host::new(&["GET", "GET"]),
        config,
        &buffer,
        &led,
    );
    serve(&mut scanner, 1);

    let frame = scanner.protocol().transport().responses[0].clone();
    assert_eq!(frame.len(), PIXEL_COUNT);
    for (i, byte) in frame.iter().enumerate() {
        assert_eq!(*byte, (code(i) >> 4) as u8);
    }

    serve(&mut scanner, 2);
    assert_eq!(scanner.protocol().transport().responses[1], frame);
}

#[test]
fn data_led_toggles_per_frame() {
    let buffer = SampleBuffer::new();
    let timing = TimingCell::new();
    let depth = ConversionDepth::new();
    let led = Led::default();
    let config = AcquisitionConfig::new(&timing, &depth);
    let mut scanner = Scanner::new(
        Host::new(&[
            "GET",
            "FOO",
            "SET\x00\x01\x00\x01",
            "GET",
            "GET",
        ]),
        config,
        &buffer,
        &led,
    );
    let expected = [(1, true, 1), (2, true, 1), (3, false, 2), (4, true, 3)];
    for (responses, on, toggles) in expected {
        serve(&mut scanner, responses);
        assert_eq!(led.on.get(), on);
        assert_eq!(led.toggles.get(), toggles);
    }
    assert!(scanner.protocol().transport().requests.is_empty());
}

#[test]
fn set_is_echoed_then_applied() {
    let buffer = SampleBuffer::new();
    let timing = TimingCell::new();
    let depth = ConversionDepth::new();
    fill(&buffer);

    let led = Led::default();
    let config = AcquisitionConfig::new(&timing, &depth);
    let mut scanner = Scanner::new(
        Host::new(&["SET\x00\x0a\x01\x03", "GET"]),
        config,
        &buffer,
        &led,
    );
    serve(&mut scanner, 1);
    assert_eq!(
        scanner.protocol().transport().responses[0],
        [0x00, 0x0a, 0x01, 0x03]
    );
    assert_eq!(timing.load().integration_time(), 10);
    assert_eq!(timing.load().clear_period(), 185);
    assert_eq!(depth.load(), BitDepth::Bits12);

    serve(&mut scanner, 2);
    let frame = &scanner.protocol().transport().responses[1];
    assert_eq!(frame.len(), (PIXEL_COUNT >> 1) * 2);
    for (i, pair) in frame.chunks_exact(2).enumerate() {
        let code = code(i << 1);
        assert_eq!(pair, [(code >> 8) as u8, code as u8]);
    }
}

#[test]
fn unsupported_depth_gives_empty_frame() {
    let buffer = SampleBuffer::new();
    let timing = TimingCell::new();
    let depth = ConversionDepth::new();
    fill(&buffer);

    let led = Led::default();
    let config = AcquisitionConfig::new(&timing, &depth);
    let mut scanner = Scanner::new(
        Host::new(&["SET\x00\x00\x00\x04", "GET"]),
        config,
        &buffer,
        &led,
    );
    serve(&mut scanner, 1);
    serve(&mut scanner, 2);

    let transport = scanner.protocol().transport();
    assert!(transport.responses[1].is_empty());
    assert_eq!(scanner.config().integration_time(), 1);
    assert_eq!(scanner.config().resolution().vertical, 4);
    assert_eq!(depth.load(), BitDepth::Bits8);
}

#[test]
fn frame_is_retried_after_readout_restart() {
    let buffer = SampleBuffer::new();
    let timing = TimingCell::new();
    let depth = ConversionDepth::new();
    fill(&buffer);

    let led = Led::default();
    let config = AcquisitionConfig::new(&timing, &depth);
    let requests = vec!["GET"; 100_000];
    let mut scanner =
        Scanner::new(Host::new(&requests), config, &buffer, &led);
    let stop = AtomicBool::new(false);

    // (state, responses before, responses after) of the service call
    // that met a torn copy.
    let mut retried = None;
    thread::scope(|s| {
        s.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                buffer.restart();
            }
        });
        let deadline = Instant::now() + Duration::from_secs(30);
        while retried.is_none() && Instant::now() < deadline {
            let sent = scanner.protocol().transport().responses.len();
            let state = scanner.service().unwrap();
            // The frame is provided within the same call unless the copy was torn.
            if scanner.protocol().frame_requested() {
                let after = scanner.protocol().transport().responses.len();
                retried = Some((state, sent, after));
            }
        }
        stop.store(true, Ordering::Relaxed);
    });
    let (state, before, after) = retried.unwrap();
    assert_eq!(state, State::ScheduleWrite);
    assert_eq!(before, after);

    let sent = scanner.protocol().transport().responses.len();
    let toggles = led.toggles.get();
    serve(&mut scanner, sent + 1);
    assert_eq!(
        scanner.protocol().transport().responses[sent].len(),
        PIXEL_COUNT
    );
    assert_eq!(led.toggles.get(), toggles + 1);
}
